pub mod config;
pub mod error;
pub mod settings;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use error::{ConfigError, Result};
pub use settings::ConnectionSettings;
