use crate::{dialect::Dialect, query::clause::Bindings, registry::EntityMapping, value::Value};

/// An INSERT of one full record: identity first, then every column.
pub struct InsertQuery<'m> {
    mapping: &'m EntityMapping,
    values: Vec<Value>,
}

impl<'m> InsertQuery<'m> {
    pub fn into(mapping: &'m EntityMapping) -> Self {
        Self {
            mapping,
            values: Vec::new(),
        }
    }

    /// Sets the record, in [`EntityMapping::column_names`] order.
    pub fn values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }

    pub fn build_sql(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut out = Bindings::new(dialect);

        let columns: Vec<String> = self.mapping.column_names().map(|c| out.ident(c)).collect();
        let placeholders: Vec<String> = self.values.iter().map(|v| out.bind(v.clone())).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            out.ident(self.mapping.table()),
            columns.join(", "),
            placeholders.join(", ")
        );

        (sql, out.into_params())
    }
}
