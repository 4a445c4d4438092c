//! Connection settings handed to the persistence layer at startup.

use std::fmt;

/// Everything needed to reach the relational store.
///
/// Settings are immutable once built: the connection manager reads them a
/// single time during initialization and keeps only what it derived.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    url: String,
    user: String,
    password: String,
    debug: bool,
}

impl ConnectionSettings {
    pub fn new(
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
            debug: false,
        }
    }

    /// Enables or disables statement-level logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("debug", &self.debug)
            .finish()
    }
}
