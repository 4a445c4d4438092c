//! Internal representation of query clauses.
//!
//! [`Bindings`] is shared by every builder; the clause structs are not part of
//! the public API.

use crate::{dialect::Dialect, query::filter::SortDirection, value::Value};

/// Collects bound parameters while a statement is rendered for one dialect.
#[derive(Debug)]
pub struct Bindings {
    dialect: Dialect,
    params: Vec<Value>,
}

impl Bindings {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    /// Records `value` and returns the placeholder that refers to it.
    pub fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    /// Quotes a column or table name.
    pub fn ident(&self, name: &str) -> String {
        self.dialect.quote(name)
    }

    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}

/// An ORDER BY clause.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OrderClause {
    pub column: &'static str,
    pub direction: SortDirection,
}

impl OrderClause {
    pub fn to_sql(self, out: &Bindings) -> String {
        format!("{} {}", out.ident(self.column), self.direction.keyword())
    }
}
