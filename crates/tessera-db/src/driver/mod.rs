//! Driver abstraction.
//!
//! A [`Driver`] turns [`ConnectionSettings`] into a long-lived, thread-safe
//! [`ConnectionSource`]; the source hands out one exclusive [`Connection`]
//! per session. Drivers are looked up by name in an explicit
//! [`DriverRegistry`] filled at startup.

pub mod embedded;

use std::{collections::HashMap, fmt, sync::Arc};

use tessera_config::ConnectionSettings;

use crate::{
    error::Result,
    value::{Row, Value},
};

pub use embedded::EmbeddedDriver;

/// One session's exclusive handle to the engine.
pub trait Connection {
    /// Runs a statement and returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Runs a query and materializes every row before returning.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Column names of `table`, empty if the table does not exist.
    fn table_columns(&mut self, table: &str) -> Result<Vec<String>>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

/// Thread-safe factory of connections, shared by every session.
pub trait ConnectionSource: Send + Sync {
    fn acquire(&self) -> Result<Box<dyn Connection + '_>>;
}

pub trait Driver: Send + Sync {
    /// Opens a source for the engine behind `settings.url()`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`](crate::DbError::Configuration) for a
    /// URL the driver cannot interpret, or
    /// [`DbError::Connection`](crate::DbError::Connection) if the engine is
    /// unreachable.
    fn connect(&self, settings: &ConnectionSettings) -> Result<Box<dyn ConnectionSource>>;
}

/// Driver factories by name.
#[derive(Clone)]
pub struct DriverRegistry {
    drivers: HashMap<&'static str, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// A registry holding the built-in embedded driver under `h2`.
    pub fn with_defaults() -> Self {
        Self::new().register("h2", EmbeddedDriver)
    }

    /// Registers `driver` under `name`, replacing any previous one.
    pub fn register(mut self, name: &'static str, driver: impl Driver + 'static) -> Self {
        self.drivers.insert(name, Arc::new(driver));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.drivers.keys().collect();
        names.sort();
        f.debug_struct("DriverRegistry")
            .field("drivers", &names)
            .finish()
    }
}
