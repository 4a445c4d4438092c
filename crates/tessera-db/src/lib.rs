//! Generic entity persistence.
//!
//! Entity types are declared with [`define_entity!`], registered once in an
//! [`EntityRegistry`], and stored through a [`Database`] handle that resolves
//! its engine from the connection URL. Every call runs on its own session;
//! writes run in a transaction that is rolled back on any failure.

mod connection;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod expr;
pub mod macros;
mod migration;
pub mod query;
pub mod registry;
pub mod repository;
pub mod session;
pub mod traits;
pub mod value;

#[cfg(test)]
mod test_support;

pub use tessera_config::ConnectionSettings;
pub use uuid;

pub use error::{DbError, Result};
pub use query::{FieldFilter, Page, SortDirection, SortSpec};
pub use registry::{ColumnDef, EntityRegistry};
pub use repository::Database;
pub use session::Session;
pub use traits::{Entity, Expression, ID_COLUMN};
pub use value::{Json, Row, SqlType, Value};
