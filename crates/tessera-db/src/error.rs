//! Error types for tessera-db.

use miette::Diagnostic;
use thiserror::Error;

/// Boxed error raised by caller-supplied transactional work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Database error type for tessera-db operations.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Database configuration error: {0}")]
    #[diagnostic(
        code(tessera_db::configuration),
        help("Check the connection URL and the registered entity types")
    )]
    Configuration(String),

    #[error("Invalid request: {0}")]
    #[diagnostic(
        code(tessera_db::validation),
        help("The call was rejected before reaching the database")
    )]
    Validation(String),

    #[error("{context}: {source}")]
    #[diagnostic(
        code(tessera_db::transaction),
        help("The transaction was rolled back; no partial changes were kept")
    )]
    Transaction {
        context: &'static str,
        #[source]
        source: Box<DbError>,
    },

    #[error("Database connection failed: {0}")]
    #[diagnostic(
        code(tessera_db::connection),
        help("Check that the database is reachable and the credentials are valid")
    )]
    Connection(String),

    #[error("Database query failed: {0}")]
    #[diagnostic(code(tessera_db::query))]
    Query(String),

    #[error("Failed to decode column '{column}': {message}")]
    #[diagnostic(
        code(tessera_db::decode),
        help("The stored value does not match the entity field type")
    )]
    Decode { column: String, message: String },

    #[error("{0}")]
    #[diagnostic(code(tessera_db::custom))]
    Custom(#[source] BoxError),
}

impl DbError {
    /// Wraps a caller-defined failure so it can abort transactional work.
    pub fn custom(err: impl Into<BoxError>) -> Self {
        DbError::Custom(err.into())
    }

    pub(crate) fn transaction(context: &'static str, source: DbError) -> Self {
        DbError::Transaction {
            context,
            source: Box::new(source),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(message)) => DbError::Query(message),
            other => DbError::Query(other.to_string()),
        }
    }
}

/// Result type alias for tessera-db operations.
pub type Result<T> = std::result::Result<T, DbError>;
