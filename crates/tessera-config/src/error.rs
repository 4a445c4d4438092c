use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(tessera_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    #[diagnostic(
        code(tessera_config::io),
        help("Check that the configuration file exists and is readable")
    )]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration value: {0}")]
    #[diagnostic(
        code(tessera_config::invalid_value),
        help("Fix the value in config.toml or in the overriding environment variable")
    )]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
