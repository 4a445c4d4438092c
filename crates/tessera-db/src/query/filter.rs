//! Caller-built query shapes: equality filters, sort orders and pages.
//!
//! These name fields by string or typed column; the names are checked against
//! the entity mapping when a query is built, never interpolated as given.

use std::collections::BTreeMap;

use crate::{
    error::{DbError, Result},
    expr::{Col, FieldName},
    value::{SqlType, Value},
};

/// Field-equals-value constraints combined with AND. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldFilter {
    fields: BTreeMap<String, Value>,
    rejected: Option<String>,
}

impl FieldFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint by field name. A later constraint on the same field
    /// replaces the earlier one.
    pub fn with(mut self, field: impl FieldName, value: impl Into<Value>) -> Self {
        self.fields
            .insert(field.field_name().to_string(), value.into());
        self
    }

    /// Adds a constraint on a typed column.
    ///
    /// A value that cannot be encoded is remembered and makes the filter
    /// fail validation when a query is built from it.
    pub fn eq<T: SqlType>(mut self, col: Col<T>, value: T) -> Self {
        match value.to_value() {
            Ok(value) => self.with(col, value),
            Err(message) => {
                self.rejected.get_or_insert_with(|| {
                    format!("Cannot encode filter value for '{}': {message}", col.name)
                });
                self
            }
        }
    }

    /// The first constraint that could not be encoded, if any.
    pub fn rejected(&self) -> Option<&str> {
        self.rejected.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FieldFilter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            rejected: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Ordered sort keys; the first entry is the primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<(String, SortDirection)>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(self, field: impl FieldName) -> Self {
        self.then(field, SortDirection::Asc)
    }

    pub fn desc(self, field: impl FieldName) -> Self {
        self.then(field, SortDirection::Desc)
    }

    pub fn then(mut self, field: impl FieldName, direction: SortDirection) -> Self {
        self.keys.push((field.field_name().to_string(), direction));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.keys.iter().map(|(k, d)| (k.as_str(), *d))
    }
}

/// An engine-applied `(offset, limit)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    offset: i64,
    limit: i64,
}

impl Page {
    /// # Errors
    ///
    /// Returns [`DbError::Validation`] if `offset` is negative or `limit` is
    /// not positive.
    pub fn new(offset: i64, limit: i64) -> Result<Self> {
        if offset < 0 {
            return Err(DbError::Validation(format!(
                "offset must be >= 0, got {offset}"
            )));
        }
        if limit <= 0 {
            return Err(DbError::Validation(format!(
                "limit must be > 0, got {limit}"
            )));
        }
        Ok(Self { offset, limit })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }
}
