//! Redmine API client and types.
//!
//! This module provides the interface for communicating with the Redmine
//! REST API: transport, wire formats and decoded records.

mod auth;
mod client;
pub mod error;
pub mod format;
mod response;
mod transport;
mod value;

pub use auth::{Auth, UNUSED_PASSWORD};
pub use client::{Connection, Redmine};
pub use error::{ApiError, Result};
pub use format::{FormatAdapter, JsonFormat, ResourceNames, WireFormat, XmlFormat};
pub use response::{Comment, Person, PersonRegistry, Response};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, Transport};
pub use value::{Record, Value};
