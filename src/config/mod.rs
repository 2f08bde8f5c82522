//! Configuration management for the Redmine client.
//!
//! This module handles loading connection settings from the environment or
//! a TOML file, and the resolve-once `SettingsStore`.

mod settings;
mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use settings::{
    Settings, ENV_API_KEY, ENV_BASE_URI, ENV_FORMAT, ENV_PASSWORD, ENV_USERNAME,
};
pub use store::{SettingsStore, ENV_SETTINGS_FILE};

/// Errors that can occur while resolving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings were read before anything configured them.
    #[error("Settings have not been configured")]
    NotConfigured,

    /// Settings were configured a second time.
    #[error("Settings have already been configured")]
    AlreadyConfigured,

    /// The platform configuration directory could not be determined.
    #[error("could not determine configuration directory")]
    NoConfigDir,

    /// Failed to read the settings file.
    #[error("failed to read settings file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the settings file.
    #[error("failed to parse settings file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A setting has an invalid value.
    #[error("invalid settings: {0}")]
    ValidationError(String),

    /// The wire format name is not supported.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Default settings file location: `<config dir>/redmine-client/settings.toml`.
pub fn default_settings_path() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("redmine-client").join("settings.toml"))
}
