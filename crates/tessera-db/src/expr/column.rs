//! Represents a typed database column.
//!
//! `Col<T>` ties a column name to a Rust type `T`, so filters and sort keys
//! can name fields without stringly-typed lookups. It implements
//! [`Expression`], so it can be used directly in filters.

use std::marker::PhantomData;

use crate::{query::clause::Bindings, traits::Expression};

/// A typed reference to a database column.
///
/// The type parameter `T` is the Rust type of the entity field behind the
/// column. [`define_entity!`](crate::define_entity) generates one constant per
/// field.
///
/// # Example
///
/// ```rust
/// use tessera_db::expr::Col;
/// const NAME: Col<String> = Col::new("name");
/// ```
pub struct Col<T> {
    pub name: &'static str,
    _type: PhantomData<T>,
}

impl<T> Col<T> {
    /// Creates a new column reference.
    ///
    /// # Parameters
    ///
    /// - `name`: the actual column name in the database (e.g., `"user_name"`)
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }
}

// Manual impls: deriving would require `T: Clone`/`T: Copy`.
impl<T> Clone for Col<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Col<T> {}

impl<T> std::fmt::Debug for Col<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Col").field(&self.name).finish()
    }
}

impl<T> Expression for Col<T> {
    fn to_sql(&self, out: &mut Bindings) -> String {
        out.ident(self.name)
    }
}

/// Anything that names an entity field: a typed column or a plain string.
pub trait FieldName {
    fn field_name(&self) -> &str;
}

impl<T> FieldName for Col<T> {
    fn field_name(&self) -> &str {
        self.name
    }
}

impl FieldName for &str {
    fn field_name(&self) -> &str {
        self
    }
}

impl FieldName for String {
    fn field_name(&self) -> &str {
        self.as_str()
    }
}
