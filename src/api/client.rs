//! Redmine API client implementation.
//!
//! `Redmine` is the session entry point: it owns one `Connection` (base URI,
//! credentials, wire format, transport and person registry) and hands out
//! per-resource managers that share it.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, instrument, warn};

use super::auth::Auth;
use super::error::{ApiError, Result};
use super::format::{FormatAdapter, ResourceNames, WireFormat};
use super::response::{PersonRegistry, Response};
use super::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, Transport};
use super::value::Record;
use crate::config::{Settings, SettingsStore};
use crate::resource::{IssueKind, Manager, ProjectKind};

/// Everything needed to talk to one Redmine instance.
pub struct Connection {
    /// The base URL for the Redmine instance, without trailing slash.
    base_url: String,
    /// Authentication credentials.
    auth: Auth,
    /// The active wire format.
    format: Box<dyn FormatAdapter>,
    /// Executes requests.
    transport: Box<dyn Transport>,
    /// People seen in any response of this session.
    people: Rc<PersonRegistry>,
}

impl Connection {
    pub fn new(settings: &Settings, transport: Box<dyn Transport>) -> Self {
        Self {
            base_url: normalize_base_url(&settings.base_uri),
            auth: Auth::new(
                settings.username.as_deref(),
                settings.password.as_deref(),
                settings.api_key.as_deref(),
            ),
            format: settings.format.adapter(),
            transport,
            people: Rc::new(PersonRegistry::new()),
        }
    }

    /// Use a caller-supplied person registry instead of a fresh one.
    pub fn with_people(mut self, people: Rc<PersonRegistry>) -> Self {
        self.people = people;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn format(&self) -> &dyn FormatAdapter {
        self.format.as_ref()
    }

    pub fn people(&self) -> &Rc<PersonRegistry> {
        &self.people
    }

    /// Build the request for `path`.
    ///
    /// The URI is `base + path + "." + extension`. The API key, when set,
    /// is added as the `key` query parameter; Basic credentials go into the
    /// `Authorization` header; payloads get the format's content type.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(String, String)],
        body: Option<String>,
    ) -> HttpRequest {
        let mut url = format!("{}{}.{}", self.base_url, path, self.format.extension());

        let mut query: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(key) = self.auth.api_key() {
            query.push(("key", key));
        }
        if !query.is_empty() {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&encoded.join("&"));
        }

        let mut headers = Vec::new();
        if let Some(value) = self.auth.header_value() {
            headers.push(("Authorization".to_string(), value.to_string()));
        }
        if method.is_mutating() {
            headers.push((
                "Content-Type".to_string(),
                self.format.content_type().to_string(),
            ));
        }

        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }

    /// Send one request and return the raw status and body.
    #[instrument(skip(self, params, body), fields(method = method.as_str(), path = %path))]
    pub fn send(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(String, String)],
        body: Option<String>,
    ) -> Result<HttpResponse> {
        let request = self.build_request(method, path, params, body);
        debug!(url = %redact_key(&request.url), "Sending request");

        let response = self.transport.execute(&request)?;
        debug!(status = response.status, "Request completed");
        Ok(response)
    }

    /// Encode `fields` as a payload for one `object`.
    pub fn encode(&self, object: &str, fields: &Record) -> Result<String> {
        self.format.serialize(object, fields)
    }

    /// Decode a response into records when its status carries any.
    pub fn decode(
        &self,
        names: ResourceNames,
        method: HttpMethod,
        response: &HttpResponse,
    ) -> Result<Option<Vec<Response>>> {
        self.format
            .decode_response(names, method, response, &self.people)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("format", &self.format.extension())
            .finish()
    }
}

/// A Redmine session.
///
/// Single-threaded: managers and resources share the connection through
/// `Rc` and issue one blocking round trip per operation.
#[derive(Debug, Clone)]
pub struct Redmine {
    connection: Rc<Connection>,
}

impl Redmine {
    /// Create a client talking HTTP to the configured server.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the HTTP client
    /// cannot be built.
    #[instrument(skip(settings), fields(base_uri = %settings.base_uri, format = %settings.format))]
    pub fn new(settings: &Settings) -> crate::Result<Self> {
        settings.validate()?;
        let transport = HttpTransport::new()?;
        info!("Creating Redmine client");
        Ok(Self::with_transport(settings, transport))
    }

    /// Create a client from a settings store, resolving it if needed.
    pub fn from_store(store: &SettingsStore) -> crate::Result<Self> {
        let settings = store.get()?;
        Self::new(settings)
    }

    /// Create a client with an explicit transport. Settings are used as
    /// given; call `Settings::validate` first if they come from users.
    pub fn with_transport(settings: &Settings, transport: impl Transport + 'static) -> Self {
        Self::from_connection(Connection::new(settings, Box::new(transport)))
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection: Rc::new(connection),
        }
    }

    pub fn issues(&self) -> Manager<IssueKind> {
        Manager::new(self.connection.clone())
    }

    pub fn projects(&self) -> Manager<ProjectKind> {
        Manager::new(self.connection.clone())
    }

    /// The people seen so far in this session.
    pub fn people(&self) -> &Rc<PersonRegistry> {
        self.connection.people()
    }

    pub fn connection(&self) -> &Rc<Connection> {
        &self.connection
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        self.connection.base_url()
    }
}

/// Normalize the base URL by removing trailing slashes.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim_end_matches('/');

    // Warn if not HTTPS (but don't enforce for localhost/testing)
    if !url.starts_with("https://") && !url.contains("localhost") && !url.contains("127.0.0.1") {
        warn!("URL does not use HTTPS: {}. This is insecure for production use.", url);
    }

    url.to_string()
}

/// Hide the API key in URLs that end up in logs.
fn redact_key(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let query: Vec<&str> = query
        .split('&')
        .map(|pair| if pair.starts_with("key=") { "key=<redacted>" } else { pair })
        .collect();
    format!("{}?{}", base, query.join("&"))
}
