//! Authentication handling for the Redmine API.
//!
//! Redmine accepts either HTTP Basic Auth (username + password) or an API
//! key passed as the `key` query parameter. Both can be configured at once;
//! the key then wins on the server side and the Basic credentials are only
//! carried along with a placeholder password.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Password sent alongside a username when an API key is configured.
pub const UNUSED_PASSWORD: &str = "unused";

/// Authentication credentials for Redmine.
#[derive(Clone)]
pub struct Auth {
    /// The username for Basic Auth, if any.
    username: Option<String>,
    /// The complete "Basic ..." header value, if Basic Auth is in use.
    auth_header: Option<String>,
    /// The API key sent as the `key` query parameter.
    api_key: Option<String>,
}

impl Auth {
    /// Build credentials from the optional settings values.
    ///
    /// The raw password is encoded immediately and not stored.
    pub fn new(username: Option<&str>, password: Option<&str>, api_key: Option<&str>) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty()).map(str::to_string);
        let username = username.filter(|u| !u.is_empty()).map(str::to_string);

        let auth_header = username.as_deref().map(|user| {
            let password = if api_key.is_some() {
                UNUSED_PASSWORD
            } else {
                password.unwrap_or_default()
            };
            build_auth_header(user, password)
        });

        Self {
            username,
            auth_header,
            api_key,
        }
    }

    /// Credentials that attach nothing to requests.
    pub fn anonymous() -> Self {
        Self::new(None, None, None)
    }

    /// Get the authorization header value for HTTP requests, if any.
    pub fn header_value(&self) -> Option<&str> {
        self.auth_header.as_deref()
    }

    /// Get the API key, if configured.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Get the username, if configured.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("username", &self.username)
            .field("basic", &self.auth_header.is_some())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Build the Basic Auth header value.
///
/// Encodes "username:password" in Base64 and prepends "Basic ".
fn build_auth_header(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = BASE64.encode(credentials.as_bytes());
    format!("Basic {}", encoded)
}
