//! Core traits that power the query builder and the repository.
//!
//! These traits define the contract for:
//! - Persisted record types (`Entity`)
//! - Building SQL expressions (`Expression`)

use uuid::Uuid;

use crate::{
    error::Result,
    expr::ops::EqOp,
    query::clause::Bindings,
    registry::ColumnDef,
    value::{Row, Value},
};

/// Name of the identity column every entity table carries.
pub const ID_COLUMN: &str = "id";

/// A trait for types that can be converted into SQL expressions.
///
/// When `to_sql` is called, it binds parameters through `out` and returns the
/// SQL fragment with dialect-specific placeholders.
///
/// # Example
///
/// ```rust
/// use tessera_db::{dialect::Dialect, expr::Col, query::clause::Bindings, Expression as _};
///
/// let col = Col::<String>::new("name");
/// let expr = col.eq("User");
/// let mut out = Bindings::new(Dialect::PostgreSql);
/// let sql = expr.to_sql(&mut out); // sql = "\"name\" = $1"
/// assert_eq!(sql, "\"name\" = $1");
/// ```
pub trait Expression {
    fn to_sql(&self, out: &mut Bindings) -> String;

    /// Creates a SQL `=` condition. Comparing against a null value renders
    /// `IS NULL`.
    fn eq<T: Into<Value>>(self, value: T) -> EqOp<Self>
    where
        Self: Sized,
    {
        EqOp::new(self, value.into())
    }
}

/// A persisted record type.
///
/// Every entity has exactly one identity, a UUID assigned when the value is
/// created and never changed afterwards, plus a fixed list of columns. The
/// usual way to implement this is [`define_entity!`](crate::define_entity).
pub trait Entity: Sized + Send + 'static {
    /// Table name; must be a plain identifier.
    const TABLE: &'static str;

    /// Non-identity columns, in the order [`Entity::values`] produces them.
    const COLUMNS: &'static [ColumnDef];

    fn id(&self) -> Uuid;

    /// Column values in [`Entity::COLUMNS`] order.
    ///
    /// Fails with [`DbError::Validation`](crate::DbError::Validation) if a
    /// field cannot be converted for storage.
    fn values(&self) -> Result<Vec<Value>>;

    fn from_row(row: &Row) -> Result<Self>;

    /// Two values with the same identity are the same logical record, whatever
    /// their other fields say.
    fn is_same_record(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
