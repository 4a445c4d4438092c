//! Engine detection and dialect-specific SQL rendering.

use std::fmt;

use crate::{
    error::{DbError, Result},
    value::ColumnKind,
};

/// Query-generation variant for a supported engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    PostgreSql,
    MySql,
    H2,
}

/// Known engines in match order. The first name found in the URL wins.
const ENGINES: [(&str, Dialect); 3] = [
    ("postgresql", Dialect::PostgreSql),
    ("mysql", Dialect::MySql),
    ("h2", Dialect::H2),
];

/// Maps a connection URL to `(driver name, dialect)`.
///
/// # Errors
///
/// Returns [`DbError::Configuration`] when no supported engine name occurs in
/// the URL. Nothing is contacted before this check.
pub fn resolve(url: &str) -> Result<(&'static str, Dialect)> {
    ENGINES
        .iter()
        .find(|(name, _)| url.contains(name))
        .map(|(_, dialect)| (dialect.driver(), *dialect))
        .ok_or_else(|| DbError::Configuration(format!("Unknown database type in URL: {url}")))
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::PostgreSql => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::H2 => "h2",
        }
    }

    /// Name under which the driver for this dialect is registered.
    pub fn driver(self) -> &'static str {
        match self {
            Dialect::PostgreSql => "postgres",
            Dialect::MySql => "mysql",
            Dialect::H2 => "h2",
        }
    }

    /// Quotes an identifier. Callers only pass validated identifiers.
    pub fn quote(self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{ident}`"),
            Dialect::PostgreSql | Dialect::H2 => format!("\"{ident}\""),
        }
    }

    /// Bind placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::PostgreSql => format!("${index}"),
            Dialect::MySql | Dialect::H2 => "?".to_string(),
        }
    }

    pub fn column_type(self, kind: ColumnKind) -> &'static str {
        match (self, kind) {
            (_, ColumnKind::Uuid) => "VARCHAR(36)",
            (Dialect::H2, ColumnKind::Text) => "VARCHAR",
            (_, ColumnKind::Text) => "TEXT",
            (_, ColumnKind::Integer) => "BIGINT",
            (Dialect::MySql, ColumnKind::Real) => "DOUBLE",
            (_, ColumnKind::Real) => "DOUBLE PRECISION",
            (_, ColumnKind::Bool) => "BOOLEAN",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
