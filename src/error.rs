//! Centralized error types for the Redmine client.
//!
//! Configuration and API errors stay separate at their layers; this type
//! joins them for callers that go through `Redmine::new` or
//! `Redmine::from_store`, and adds user-facing messages.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;

/// The crate-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// API-related errors.
    #[error("{0}")]
    Api(#[from] ApiError),
}

impl Error {
    /// Get a user-friendly message for display.
    pub fn user_message(&self) -> String {
        match self {
            Error::Config(e) => match e {
                ConfigError::NotConfigured => {
                    "Redmine settings are missing. Configure them or create a settings file."
                        .to_string()
                }
                ConfigError::AlreadyConfigured => {
                    "Redmine settings were already set for this session.".to_string()
                }
                ConfigError::NoConfigDir => {
                    "Could not find configuration directory. Please check your system settings."
                        .to_string()
                }
                ConfigError::ReadError { path, .. } => {
                    format!("Could not read settings file {}.", path.display())
                }
                ConfigError::ParseError(_) => {
                    "Settings file is invalid. Please check the file format.".to_string()
                }
                ConfigError::ValidationError(msg) => format!("Configuration error: {}", msg),
                ConfigError::InvalidFormat(msg) => format!("Configuration error: {}", msg),
            },
            Error::Api(e) => match e {
                ApiError::Unauthorized => {
                    "Authentication failed. Please check your credentials or API key.".to_string()
                }
                ApiError::Forbidden => {
                    "Access denied. You don't have permission to access this resource.".to_string()
                }
                ApiError::NotFound(resource) => format!("'{}' was not found.", resource),
                ApiError::Network(_) => {
                    "Connection failed. Please check your network and the Redmine URL.".to_string()
                }
                ApiError::Deleted(resource) => {
                    format!("{} was deleted and cannot be changed.", resource)
                }
                ApiError::Decode(_) | ApiError::InvalidResponse(_) => {
                    "Unexpected response from Redmine. Please try again.".to_string()
                }
                other => other.to_string(),
            },
        }
    }

    /// Check if this error is recoverable.
    ///
    /// Recoverable errors can be retried by the caller; the client never
    /// retries on its own.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Api(ApiError::RateLimited)
                | Error::Api(ApiError::ServerError(_))
                | Error::Api(ApiError::Network(_))
                | Error::Api(ApiError::NotFound(_))
                | Error::Api(ApiError::Conflict(_))
        )
    }

    /// Get a suggested action for the user.
    pub fn suggested_action(&self) -> Option<&'static str> {
        match self {
            Error::Config(ConfigError::NotConfigured) => {
                Some("Set REDMINE_SETTINGS_FILE or create ~/.config/redmine-client/settings.toml.")
            }
            Error::Api(ApiError::Unauthorized) => {
                Some("Check the API key under 'My account' in Redmine.")
            }
            Error::Api(ApiError::Network(_)) => Some("Check your network and the base_uri setting."),
            _ => None,
        }
    }
}

/// Result type for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;
