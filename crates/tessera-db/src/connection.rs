//! Connection management.
//!
//! [`SessionFactory`] is built once from the connection settings: the URL is
//! resolved to a driver and dialect, the driver opens its connection source,
//! and every registered table is reconciled before the factory is handed out.

use tessera_config::ConnectionSettings;
use tracing::info;

use crate::{
    dialect::{self, Dialect},
    driver::{ConnectionSource, DriverRegistry},
    error::{DbError, Result},
    migration::reconcile_schema,
    registry::EntityRegistry,
    session::Session,
};

/// Long-lived, thread-safe producer of sessions.
pub(crate) struct SessionFactory {
    source: Box<dyn ConnectionSource>,
    dialect: Dialect,
    registry: EntityRegistry,
    debug: bool,
}

impl SessionFactory {
    /// Resolves, connects and reconciles the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] if the URL names no supported engine
    /// or no driver is registered for it. Both checks happen before any
    /// connection attempt.
    pub fn initialize(
        settings: &ConnectionSettings,
        registry: EntityRegistry,
        drivers: &DriverRegistry,
    ) -> Result<Self> {
        let (driver_name, dialect) = dialect::resolve(settings.url())?;
        let driver = drivers.get(driver_name).ok_or_else(|| {
            DbError::Configuration(format!(
                "No driver registered for '{driver_name}' ({dialect} dialect)"
            ))
        })?;

        info!("Connecting to {dialect} database using driver '{driver_name}'");
        let source = driver.connect(settings)?;

        let factory = Self {
            source,
            dialect,
            registry,
            debug: settings.debug(),
        };
        factory.with_session(reconcile_schema)?;

        info!(
            "Database ready: {} entity types registered",
            factory.registry.len()
        );
        Ok(factory)
    }

    pub fn open_session(&self) -> Result<Session<'_>> {
        let conn = self.source.acquire()?;
        Ok(Session::new(conn, self.dialect, &self.registry, self.debug))
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}
