//! redmine-client - a blocking client for the Redmine REST API.
//!
//! Issues and projects are exposed as resource handles. Reads go to the
//! decoded server record, writes are buffered until `save`:
//!
//! ```no_run
//! use redmine_client::{Redmine, Settings};
//!
//! # fn main() -> redmine_client::Result<()> {
//! let settings = Settings::new("https://redmine.example.org").with_api_key("1234abcd");
//! let redmine = Redmine::new(&settings)?;
//!
//! let mut issue = redmine.issues().get(14)?;
//! if let Some(parent) = issue.parent()? {
//!     println!("{} is a subtask of {}", issue, parent);
//! }
//! issue.set("subject", "Updated from Rust")?;
//! issue.save()?;
//! # Ok(())
//! # }
//! ```
//!
//! Both wire formats are supported (`WireFormat::Xml`, the default, and
//! `WireFormat::Json`). Every operation is one blocking HTTP round trip;
//! nothing is retried or cached apart from the per-session person registry.

pub mod api;
pub mod config;
mod error;
pub mod logging;
pub mod resource;

pub use api::{
    ApiError, Comment, HttpTransport, Person, PersonRegistry, Record, Redmine, Transport, Value,
    WireFormat,
};
pub use config::{ConfigError, Settings, SettingsStore};
pub use error::{Error, Result};
pub use resource::{Issue, Manager, Project, Relation, Resource, ResourceKind, ResourceState};
