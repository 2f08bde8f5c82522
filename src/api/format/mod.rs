//! Wire formats supported by the Redmine REST API.
//!
//! Each format implements `FormatAdapter`: it encodes outgoing field maps
//! and decodes response bodies into `Response` values. Date and datetime
//! fields are decoded by name through the shared codecs below.

mod json;
mod xml;

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

pub use json::JsonFormat;
pub use xml::{XmlFormat, TEXT_FIELD};

use super::error::{ApiError, Result};
use super::response::{PersonRegistry, Response};
use super::transport::{HttpMethod, HttpResponse};
use super::value::{Record, Value};

/// Fields decoded as calendar dates.
pub const DATE_FIELDS: &[&str] = &["due_date", "start_date"];

/// Fields decoded as timezone-aware timestamps.
pub const DATETIME_FIELDS: &[&str] = &["created_on", "updated_on"];

/// Date format used in JSON payloads.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Datetime format used in JSON payloads.
pub const DATETIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S %z";

const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Element and key names for one resource type, e.g. `issue` / `issues`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceNames {
    pub singular: &'static str,
    pub plural: &'static str,
}

/// Encoder/decoder pair for one wire format.
pub trait FormatAdapter: fmt::Debug {
    /// Suffix appended to every request path, without the dot.
    fn extension(&self) -> &'static str;

    /// Content type sent with request payloads.
    fn content_type(&self) -> &'static str;

    /// Encode `fields` as the payload of a create or update of `object`.
    fn serialize(&self, object: &str, fields: &Record) -> Result<String>;

    /// Decode a body holding one record or a collection of records.
    fn deserialize(
        &self,
        names: ResourceNames,
        body: &str,
        people: &Rc<PersonRegistry>,
    ) -> Result<Vec<Response>>;

    /// Decode a response if its status carries records.
    ///
    /// Only 200, and 201 for creates, are decoded; anything else yields
    /// `None` and the caller inspects the status itself. An empty body
    /// decodes to no records.
    fn decode_response(
        &self,
        names: ResourceNames,
        method: HttpMethod,
        response: &HttpResponse,
        people: &Rc<PersonRegistry>,
    ) -> Result<Option<Vec<Response>>> {
        let decodable = match method {
            HttpMethod::Get => response.status == 200,
            HttpMethod::Post => matches!(response.status, 200 | 201),
            HttpMethod::Put | HttpMethod::Delete => false,
        };
        if !decodable {
            return Ok(None);
        }
        if response.body.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        self.deserialize(names, &response.body, people).map(Some)
    }
}

/// Which wire format a session talks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Xml,
    Json,
}

impl WireFormat {
    pub fn adapter(self) -> Box<dyn FormatAdapter> {
        match self {
            WireFormat::Xml => Box::new(XmlFormat),
            WireFormat::Json => Box::new(JsonFormat),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            WireFormat::Xml => "xml",
            WireFormat::Json => "json",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(WireFormat::Xml),
            "json" => Ok(WireFormat::Json),
            other => Err(format!("unknown wire format '{}'", other)),
        }
    }
}

pub(crate) fn is_date_field(name: &str) -> bool {
    DATE_FIELDS.contains(&name)
}

pub(crate) fn is_datetime_field(name: &str) -> bool {
    DATETIME_FIELDS.contains(&name)
}

/// Parse a date in `YYYY/MM/DD` or ISO `YYYY-MM-DD` form.
pub fn parse_date(field: &str, text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(text, ISO_DATE_FORMAT))
        .map_err(|e| ApiError::Decode(format!("field '{}': invalid date '{}': {}", field, text, e)))
}

/// Parse a datetime in `YYYY/MM/DD HH:MM:SS ±HHMM` or RFC 3339 form.
pub fn parse_datetime(field: &str, text: &str) -> Result<DateTime<FixedOffset>> {
    let text = text.trim();
    DateTime::parse_from_str(text, DATETIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .map_err(|e| {
            ApiError::Decode(format!(
                "field '{}': invalid datetime '{}': {}",
                field, text, e
            ))
        })
}

/// Decode a textual field, applying the date codecs where the name calls
/// for them. Empty text in a date field means "not set".
pub(crate) fn decode_text_field(field: &str, text: &str) -> Result<Value> {
    if is_date_field(field) {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return parse_date(field, text).map(Value::Date);
    }
    if is_datetime_field(field) {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return parse_datetime(field, text).map(Value::DateTime);
    }
    Ok(Value::Text(text.to_string()))
}
