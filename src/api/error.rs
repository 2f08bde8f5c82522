//! API error types for the Redmine client.

use thiserror::Error;

/// Errors that can occur when talking to a Redmine server or handling
/// the resources it returns.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed - invalid credentials or API key.
    #[error("Authentication failed: check your username, password or API key")]
    Unauthorized,

    /// Permission denied - user lacks access to the resource.
    #[error("Permission denied: you don't have access to this resource")]
    Forbidden,

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The server rejected the write because of conflicting state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited by the server.
    #[error("Rate limited: please wait before retrying")]
    RateLimited,

    /// Redmine server error.
    #[error("Redmine server error: {0}")]
    ServerError(String),

    /// Any other non-success status, including validation failures (422).
    #[error("Unexpected HTTP {status}: {context}")]
    UnexpectedStatus { status: u16, context: String },

    /// Network or HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body is not well-formed XML or JSON.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The response decoded fine but does not have the expected shape.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// An outgoing payload could not be encoded.
    #[error("Failed to encode request: {0}")]
    Serialization(String),

    /// The resource was deleted and can no longer be modified or saved.
    #[error("{0} has been deleted")]
    Deleted(String),

    /// The resource has never been saved, so it has no server identity.
    #[error("{0} has not been saved yet")]
    NotPersisted(String),

    /// A relation declared as required is missing from the record.
    #[error("Required relation '{relation}' is missing on {resource}")]
    MissingRelation {
        relation: &'static str,
        resource: String,
    },
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create an error from an HTTP status code.
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound(context.to_string()),
            409 => ApiError::Conflict(context.to_string()),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(format!("HTTP {}: {}", status, context)),
            _ => ApiError::UnexpectedStatus {
                status,
                context: context.to_string(),
            },
        }
    }

    /// Whether the error is a terminal-state violation on a resource handle.
    pub fn is_terminal_state(&self) -> bool {
        matches!(self, ApiError::Deleted(_))
    }
}
