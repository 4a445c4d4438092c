//! Scalar values exchanged with drivers, and their mapping to Rust field types.

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::{DbError, Result};

/// A scalar bound into, or read out of, a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Text(v.hyphenated().to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Storage class of a column, used to pick dialect-specific type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Uuid,
    Text,
    Integer,
    Real,
    Bool,
}

/// A Rust type that can live in a single column.
pub trait SqlType: Sized {
    const KIND: ColumnKind;
    const NULLABLE: bool = false;

    /// Converts the field for storage. The error string is wrapped into
    /// [`DbError::Validation`] together with the field name.
    fn to_value(&self) -> std::result::Result<Value, String>;

    /// Converts a stored value back. The error string is wrapped into
    /// [`DbError::Decode`] together with the column name.
    fn from_value(value: Value) -> std::result::Result<Self, String>;
}

fn mismatch(expected: &str, found: &Value) -> String {
    format!("expected {expected}, found {found:?}")
}

impl SqlType for String {
    const KIND: ColumnKind = ColumnKind::Text;

    fn to_value(&self) -> std::result::Result<Value, String> {
        Ok(Value::Text(self.clone()))
    }

    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl SqlType for i64 {
    const KIND: ColumnKind = ColumnKind::Integer;

    fn to_value(&self) -> std::result::Result<Value, String> {
        Ok(Value::Integer(*self))
    }

    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Integer(v) => Ok(v),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl SqlType for i32 {
    const KIND: ColumnKind = ColumnKind::Integer;

    fn to_value(&self) -> std::result::Result<Value, String> {
        Ok(Value::Integer((*self).into()))
    }

    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Integer(v) => i32::try_from(v).map_err(|e| e.to_string()),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl SqlType for f64 {
    const KIND: ColumnKind = ColumnKind::Real;

    fn to_value(&self) -> std::result::Result<Value, String> {
        Ok(Value::Real(*self))
    }

    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Real(v) => Ok(v),
            // Engines may hand back whole floats as integers.
            Value::Integer(v) => Ok(v as f64),
            other => Err(mismatch("real", &other)),
        }
    }
}

impl SqlType for bool {
    const KIND: ColumnKind = ColumnKind::Bool;

    fn to_value(&self) -> std::result::Result<Value, String> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl SqlType for Uuid {
    const KIND: ColumnKind = ColumnKind::Uuid;

    fn to_value(&self) -> std::result::Result<Value, String> {
        Ok(Value::from(*self))
    }

    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Text(s) => Uuid::parse_str(&s).map_err(|e| e.to_string()),
            other => Err(mismatch("uuid text", &other)),
        }
    }
}

impl<T: SqlType> SqlType for Option<T> {
    const KIND: ColumnKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> std::result::Result<Value, String> {
        self.as_ref().map_or(Ok(Value::Null), SqlType::to_value)
    }

    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// A structured value stored as JSON text, e.g. a list of role names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Serialize + DeserializeOwned> SqlType for Json<T> {
    const KIND: ColumnKind = ColumnKind::Text;

    fn to_value(&self) -> std::result::Result<Value, String> {
        serde_json::to_string(&self.0)
            .map(Value::Text)
            .map_err(|e| e.to_string())
    }

    fn from_value(value: Value) -> std::result::Result<Self, String> {
        match value {
            Value::Text(s) => serde_json::from_str(&s).map(Json).map_err(|e| e.to_string()),
            other => Err(mismatch("json text", &other)),
        }
    }
}

/// One fully materialized result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `index`, if any.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Reads a column by name and converts it to `T`.
    ///
    /// Column lookup ignores ASCII case: some engines upper-case unquoted
    /// names in result metadata.
    pub fn get<T: SqlType>(&self, column: &str) -> Result<T> {
        let index = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| DbError::Decode {
                column: column.to_string(),
                message: "column missing from result set".to_string(),
            })?;

        T::from_value(self.values[index].clone()).map_err(|message| DbError::Decode {
            column: column.to_string(),
            message,
        })
    }
}
