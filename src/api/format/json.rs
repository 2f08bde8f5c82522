//! JSON flavour of the Redmine API.

use std::rc::Rc;

use serde_json::{Map, Value as Json};
use tracing::debug;

use super::{
    decode_text_field, FormatAdapter, ResourceNames, DATETIME_FORMAT, DATE_FORMAT,
};
use crate::api::error::{ApiError, Result};
use crate::api::response::{PersonRegistry, Response};
use crate::api::value::{Record, Value};

/// Encodes payloads as `{"<object>": {...}}` and decodes JSON bodies.
///
/// Numbers are decoded with their full textual precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl FormatAdapter for JsonFormat {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn serialize(&self, object: &str, fields: &Record) -> Result<String> {
        let mut envelope = Map::new();
        envelope.insert(object.to_string(), record_to_json(fields));
        serde_json::to_string(&Json::Object(envelope))
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }

    fn deserialize(
        &self,
        names: ResourceNames,
        body: &str,
        people: &Rc<PersonRegistry>,
    ) -> Result<Vec<Response>> {
        let parsed: Json =
            serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        let Json::Object(top) = parsed else {
            return Err(ApiError::Decode(
                "expected a JSON object at the top level".to_string(),
            ));
        };

        let records = if let Some(items) = top.get(names.plural) {
            let Json::Array(items) = items else {
                return Err(ApiError::InvalidResponse(format!(
                    "'{}' is not an array",
                    names.plural
                )));
            };
            items
                .iter()
                .map(|item| object_to_record(names.singular, item))
                .collect::<Result<Vec<_>>>()?
        } else if let Some(item) = top.get(names.singular) {
            vec![object_to_record(names.singular, item)?]
        } else {
            let keys: Vec<&str> = top.keys().map(String::as_str).collect();
            return Err(ApiError::Decode(format!(
                "expected '{}' or '{}' at the top level, found [{}]",
                names.singular,
                names.plural,
                keys.join(", ")
            )));
        };

        debug!(count = records.len(), kind = names.singular, "Decoded JSON records");
        Ok(records
            .into_iter()
            .map(|record| Response::new(record, people.clone()))
            .collect())
    }
}

fn object_to_record(context: &str, value: &Json) -> Result<Record> {
    match from_json(context, value)? {
        Value::Record(record) => Ok(record),
        _ => Err(ApiError::InvalidResponse(format!(
            "'{}' entry is not an object",
            context
        ))),
    }
}

/// Convert a JSON value, decoding date fields by key at every level.
fn from_json(field: &str, value: &Json) -> Result<Value> {
    Ok(match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.clone()),
        Json::String(s) => decode_text_field(field, s)?,
        Json::Array(items) => Value::List(
            items
                .iter()
                .map(|item| from_json(field, item))
                .collect::<Result<_>>()?,
        ),
        Json::Object(map) => {
            let mut record = Record::new();
            for (key, item) in map {
                record.set(key.as_str(), from_json(key, item)?);
            }
            Value::Record(record)
        }
    })
}

fn record_to_json(record: &Record) -> Json {
    Json::Object(
        record
            .iter()
            .map(|(key, value)| (key.to_string(), to_json(value)))
            .collect(),
    )
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Json::Number(n.clone()),
        Value::Text(s) => Json::String(s.clone()),
        Value::Date(d) => Json::String(d.format(DATE_FORMAT).to_string()),
        Value::DateTime(dt) => Json::String(dt.format(DATETIME_FORMAT).to_string()),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Record(record) => record_to_json(record),
    }
}
