//! Configuration for a judger node.
//!
//! Loaded once at startup from a TOML file and passed by value into the
//! connection managers and backends. Nothing here is mutated afterwards.

pub mod defaults;
pub mod settings;

use std::path::Path;

use thiserror::Error;

pub use settings::{AccountSettings, BackendKind, DispatcherSettings, JudgeSettings, Settings};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Parsed, but a field holds an unusable value.
    #[error("invalid configuration: {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Read, parse and validate a config file.
pub fn load_config(path: &Path) -> ConfigResult<Settings> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate config text.
pub fn parse_config(contents: &str) -> ConfigResult<Settings> {
    let settings: Settings = toml::from_str(contents)?;
    settings.validate()?;
    Ok(settings)
}
