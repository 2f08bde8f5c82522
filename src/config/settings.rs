//! Connection settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};
use crate::api::WireFormat;

pub const ENV_BASE_URI: &str = "REDMINE_BASE_URI";
pub const ENV_USERNAME: &str = "REDMINE_USERNAME";
pub const ENV_PASSWORD: &str = "REDMINE_PASSWORD";
pub const ENV_API_KEY: &str = "REDMINE_API_KEY";
pub const ENV_FORMAT: &str = "REDMINE_FORMAT";

/// Connection settings for one Redmine instance.
///
/// Either Basic credentials, an API key, both, or neither (anonymous access)
/// may be configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// The Redmine instance URL, e.g. "https://redmine.example.org".
    pub base_uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Sent as the `key` query parameter; takes precedence on the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub format: WireFormat,
}

impl Settings {
    /// Settings for anonymous XML access to `base_uri`.
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Read settings from `REDMINE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` if `REDMINE_BASE_URI` is unset,
    /// or `ConfigError::InvalidFormat` for an unknown `REDMINE_FORMAT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let base_uri = non_empty(ENV_BASE_URI).ok_or(ConfigError::NotConfigured)?;
        let format = match non_empty(ENV_FORMAT) {
            Some(name) => name.parse().map_err(ConfigError::InvalidFormat)?,
            None => WireFormat::default(),
        };

        Ok(Self {
            base_uri,
            username: non_empty(ENV_USERNAME),
            password: non_empty(ENV_PASSWORD),
            api_key: non_empty(ENV_API_KEY),
            format,
        })
    }

    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate these settings.
    ///
    /// Checks that:
    /// - The base URI is non-empty and has an http(s) scheme
    /// - A password is not given without a username
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ValidationError` with details if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.base_uri.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "base_uri cannot be empty".to_string(),
            ));
        }

        if !self.base_uri.starts_with("https://") && !self.base_uri.starts_with("http://") {
            return Err(ConfigError::ValidationError(format!(
                "base_uri '{}' must start with http:// or https://",
                self.base_uri
            )));
        }

        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::ValidationError(
                "password is set but username is missing".to_string(),
            ));
        }

        Ok(())
    }
}
