//! XML flavour of the Redmine API.
//!
//! Decoding goes through a small element tree built with `quick-xml`, which
//! is then folded into `Record`s:
//! - attributes become text fields (`<author id="2" name="John Smith"/>`);
//! - leaf elements become text, or dates for the known date fields;
//! - `type="array"` containers become lists of their children;
//! - a child tag that repeats inside one parent becomes a list.

use std::io::Cursor;
use std::rc::Rc;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use super::{decode_text_field, FormatAdapter, ResourceNames};
use crate::api::error::{ApiError, Result};
use crate::api::response::{PersonRegistry, Response};
use crate::api::value::{Record, Value};

/// Field holding the text of an element that also has attributes.
pub const TEXT_FIELD: &str = "value";

/// Encodes payloads as `<object><field>value</field>...</object>` and
/// decodes XML bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlFormat;

impl FormatAdapter for XmlFormat {
    fn extension(&self) -> &'static str {
        "xml"
    }

    fn content_type(&self) -> &'static str {
        "application/xml"
    }

    fn serialize(&self, object: &str, fields: &Record) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        write_record(&mut writer, &object.to_lowercase(), fields)?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }

    fn deserialize(
        &self,
        names: ResourceNames,
        body: &str,
        people: &Rc<PersonRegistry>,
    ) -> Result<Vec<Response>> {
        let root = parse_document(body)?;

        let records = if root.name == names.plural {
            root.children
                .iter()
                .filter(|child| child.name == names.singular)
                .map(element_to_record)
                .collect::<Result<Vec<_>>>()?
        } else if root.name == names.singular {
            vec![element_to_record(&root)?]
        } else {
            return Err(ApiError::Decode(format!(
                "unexpected root element <{}>, expected <{}> or <{}>",
                root.name, names.singular, names.plural
            )));
        };

        debug!(count = records.len(), kind = names.singular, "Decoded XML records");
        Ok(records
            .into_iter()
            .map(|record| Response::new(record, people.clone()))
            .collect())
    }
}

/// Minimal owned element tree.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_document(body: &str) -> Result<Element> {
    // text is kept verbatim; whitespace between child elements is dropped
    // when the element is folded into a record
    let mut reader = Reader::from_str(body);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(open_element(&start)?),
            Ok(Event::Empty(start)) => {
                let element = open_element(&start)?;
                close_element(element, &mut stack, &mut root)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ApiError::Decode("unbalanced closing tag".to_string()))?;
                close_element(element, &mut stack, &mut root)?;
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|e| ApiError::Decode(e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(data)) => {
                let bytes = data.into_inner();
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(text);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ApiError::Decode(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    if !stack.is_empty() {
        return Err(ApiError::Decode("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| ApiError::Decode("document has no root element".to_string()))
}

fn open_element(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| ApiError::Decode(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| ApiError::Decode(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        ..Element::default()
    })
}

fn close_element(
    element: Element,
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(ApiError::Decode(
                "document has more than one root element".to_string(),
            ))
        }
    }
    Ok(())
}

fn element_to_record(element: &Element) -> Result<Record> {
    let mut record = Record::new();
    for (key, value) in &element.attributes {
        if key == "type" {
            continue;
        }
        record.set(key.as_str(), decode_text_field(key, value)?);
    }

    for child in &element.children {
        let value = element_to_value(child)?;
        match record.remove(&child.name) {
            // repeated tag: collect into a list
            Some(Value::List(mut items)) if !is_array(child) => {
                items.push(value);
                record.set(child.name.as_str(), Value::List(items));
            }
            Some(previous) => {
                record.set(child.name.as_str(), Value::List(vec![previous, value]));
            }
            None => {
                record.set(child.name.as_str(), value);
            }
        }
    }

    // `<x a="1">text</x>`: the text survives next to the attributes
    if element.children.is_empty()
        && !element.text.trim().is_empty()
        && !record.contains(TEXT_FIELD)
    {
        record.set(TEXT_FIELD, decode_text_field(&element.name, &element.text)?);
    }
    Ok(record)
}

fn element_to_value(element: &Element) -> Result<Value> {
    if is_array(element) {
        let items = element
            .children
            .iter()
            .map(element_to_value)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Value::List(items));
    }
    if element.attributes.is_empty() && element.children.is_empty() {
        return decode_text_field(&element.name, &element.text);
    }
    element_to_record(element).map(Value::Record)
}

fn is_array(element: &Element) -> bool {
    element.attribute("type") == Some("array")
}

fn write_record(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, record: &Record) -> Result<()> {
    write_event(writer, Event::Start(BytesStart::new(name)))?;
    for (field, value) in record.iter() {
        write_value(writer, field, value)?;
    }
    write_event(writer, Event::End(BytesEnd::new(name)))
}

fn write_value(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Record(record) => write_record(writer, name, record),
        Value::List(items) => {
            for item in items {
                write_value(writer, name, item)?;
            }
            Ok(())
        }
        scalar => {
            let text = scalar.to_string();
            write_event(writer, Event::Start(BytesStart::new(name)))?;
            write_event(writer, Event::Text(BytesText::new(&text)))?;
            write_event(writer, Event::End(BytesEnd::new(name)))
        }
    }
}

fn write_event(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| ApiError::Serialization(e.to_string()))
}
