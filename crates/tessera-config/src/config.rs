use std::{fs, path::Path};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    error::{ConfigError, Result},
    settings::ConnectionSettings,
};

pub const ENV_DATABASE_URL: &str = "TESSERA_DATABASE_URL";
pub const ENV_DATABASE_USER: &str = "TESSERA_DATABASE_USER";
pub const ENV_DATABASE_PASSWORD: &str = "TESSERA_DATABASE_PASSWORD";
pub const ENV_DEBUG: &str = "TESSERA_DEBUG";

/// The `config.toml` document.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Relational store connection. When absent, or when `url`/`user` are
    /// missing, the application runs without a database.
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL. The engine is picked by substring match
    /// (`postgresql`, `mysql`, `h2`).
    pub url: Option<String>,

    pub user: Option<String>,

    /// Forwarded verbatim to the driver.
    /// Default: ""
    pub password: Option<String>,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LogConfig {
    /// Logs every executed statement when true.
    /// Default: false
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Parses a configuration document and applies environment overrides.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.resolve()?;
        Ok(config)
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading config: '{}'", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Applies `TESSERA_*` environment overrides and validates values.
    pub fn resolve(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
            self.database.url = Some(url);
        }
        if let Ok(user) = std::env::var(ENV_DATABASE_USER) {
            self.database.user = Some(user);
        }
        if let Ok(password) = std::env::var(ENV_DATABASE_PASSWORD) {
            self.database.password = Some(password);
        }
        if let Ok(debug) = std::env::var(ENV_DEBUG) {
            self.log.debug = parse_flag(ENV_DEBUG, &debug)?;
        }

        if self.database.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "database.url must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Builds connection settings when both `database.url` and
    /// `database.user` are configured.
    pub fn connection_settings(&self) -> Option<ConnectionSettings> {
        match (&self.database.url, &self.database.user) {
            (Some(url), Some(user)) => Some(
                ConnectionSettings::new(
                    url,
                    user,
                    self.database.password.clone().unwrap_or_default(),
                )
                .with_debug(self.log.debug),
            ),
            (None, None) => None,
            _ => {
                warn!("Incomplete database configuration: both 'database.url' and 'database.user' are required");
                None
            }
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}
