//! Shape-directed translation between caller values and XML documents.
//!
//! Used by the query protocol for responses and by the REST/XML protocol
//! for both directions. Documents are held as a small element tree parsed
//! with `quick-xml`; namespace prefixes are stripped on input.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use crate::error::SdkError;
use crate::schema::{coerce, ListShape, Location, MapShape, SchemaRegistry, Shape, TimestampFormat};

/// One parsed XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local element name (namespace prefix stripped).
    pub name: String,
    /// Attributes, in document order (used only when rendering).
    pub attrs: Vec<(String, String)>,
    /// Concatenated, trimmed text content.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Creates an element with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the first child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns every child with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Returns the text of the first child with the given name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }
}

/// Parses an XML document into an element tree.
///
/// Returns `None` for empty or malformed input.
#[must_use]
pub fn parse(bytes: &[u8]) -> Option<XmlElement> {
    let text = std::str::from_utf8(bytes).ok()?;
    if text.trim().is_empty() {
        return None;
    }

    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlElement> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                stack.push(element_of(&start));
            }
            Ok(Event::Empty(start)) => {
                let element = element_of(&start);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Some(element),
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    let value = text.unescape().ok()?;
                    top.text.push_str(value.trim());
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text
                        .push_str(String::from_utf8_lossy(&data.into_inner()).trim());
                }
            }
            Ok(Event::End(_)) => {
                let element = stack.pop()?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => return Some(element),
                }
            }
            Ok(Event::Eof) => return None,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
}

fn element_of(start: &BytesStart<'_>) -> XmlElement {
    XmlElement::new(String::from_utf8_lossy(start.local_name().as_ref()).into_owned())
}

/// Renders an element tree as an XML document string.
#[must_use]
pub fn render(element: &XmlElement) -> String {
    let mut writer = Writer::new(Vec::new());
    if write_element(&mut writer, element).is_err() {
        return String::new();
    }
    String::from_utf8(writer.into_inner()).unwrap_or_default()
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &XmlElement,
) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (name, value) in &element.attrs {
        start.push_attribute((name.as_str(), value.as_str()));
    }
    if element.text.is_empty() && element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    if !element.text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&element.text)))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

/// Serializes a validated value tree into an XML element named `name`.
///
/// # Errors
///
/// Returns [`SdkError::Schema`] if the shape graph contains unresolvable
/// references.
pub fn to_xml(
    registry: &SchemaRegistry,
    shape: &Shape,
    name: &str,
    value: &Value,
) -> Result<XmlElement, SdkError> {
    let mut element = XmlElement::new(name);
    fill_element(registry, shape, value, &mut element)?;
    Ok(element)
}

fn fill_element(
    registry: &SchemaRegistry,
    shape: &Shape,
    value: &Value,
    element: &mut XmlElement,
) -> Result<(), SdkError> {
    match shape {
        Shape::Structure(structure) => {
            let Value::Object(params) = value else {
                return Ok(());
            };
            for (member_name, member) in &structure.members {
                if member.location != Location::Body {
                    continue;
                }
                let Some(member_value) = params.get(member_name) else {
                    continue;
                };
                if member_value.is_null() {
                    continue;
                }
                let wire_name = member.wire_name(member_name);
                let member_shape = member.shape.resolve(registry)?;
                match member_shape.as_ref() {
                    Shape::List(list) => {
                        append_list(registry, list, wire_name, member_value, element)?;
                    }
                    Shape::Map(map_shape) => {
                        append_map(registry, map_shape, wire_name, member_value, element)?;
                    }
                    other => {
                        let mut child = XmlElement::new(wire_name);
                        fill_element(registry, other, member_value, &mut child)?;
                        element.children.push(child);
                    }
                }
            }
        }
        Shape::List(list) => {
            // A bare list renders with default member naming.
            append_list(registry, list, "member", value, element)?;
        }
        Shape::Map(map_shape) => {
            append_map(registry, map_shape, "entry", value, element)?;
        }
        scalar => {
            if let Some(text) = coerce::scalar_to_string(scalar, value, TimestampFormat::Iso8601) {
                element.text = text;
            }
        }
    }
    Ok(())
}

fn append_list(
    registry: &SchemaRegistry,
    list: &ListShape,
    wire_name: &str,
    value: &Value,
    parent: &mut XmlElement,
) -> Result<(), SdkError> {
    let Value::Array(items) = value else {
        return Ok(());
    };
    let element_shape = list.member.shape.resolve(registry)?;
    if list.flattened {
        for item in items {
            let mut child = XmlElement::new(wire_name);
            fill_element(registry, &element_shape, item, &mut child)?;
            parent.children.push(child);
        }
    } else {
        let item_name = list.member.location_name.as_deref().unwrap_or("member");
        let mut wrapper = XmlElement::new(wire_name);
        for item in items {
            let mut child = XmlElement::new(item_name);
            fill_element(registry, &element_shape, item, &mut child)?;
            wrapper.children.push(child);
        }
        parent.children.push(wrapper);
    }
    Ok(())
}

fn append_map(
    registry: &SchemaRegistry,
    map_shape: &MapShape,
    wire_name: &str,
    value: &Value,
    parent: &mut XmlElement,
) -> Result<(), SdkError> {
    let Value::Object(entries) = value else {
        return Ok(());
    };
    let value_shape = map_shape.value.shape.resolve(registry)?;
    let key_name = map_shape.key_name.as_deref().unwrap_or("key");
    let value_name = map_shape.value_name.as_deref().unwrap_or("value");

    let mut entry_elements = Vec::new();
    for (key, entry_value) in entries {
        let mut entry = XmlElement::new(if map_shape.flattened { wire_name } else { "entry" });
        let mut key_element = XmlElement::new(key_name);
        key_element.text = key.clone();
        entry.children.push(key_element);
        let mut value_element = XmlElement::new(value_name);
        fill_element(registry, &value_shape, entry_value, &mut value_element)?;
        entry.children.push(value_element);
        entry_elements.push(entry);
    }

    if map_shape.flattened {
        parent.children.append(&mut entry_elements);
    } else {
        let mut wrapper = XmlElement::new(wire_name);
        wrapper.children = entry_elements;
        parent.children.push(wrapper);
    }
    Ok(())
}

/// Parses an XML element back into a typed value tree.
///
/// # Errors
///
/// Returns [`SdkError::Schema`] if the shape graph contains unresolvable
/// references.
pub fn from_xml(
    registry: &SchemaRegistry,
    shape: &Shape,
    element: &XmlElement,
) -> Result<Value, SdkError> {
    match shape {
        Shape::Structure(structure) => {
            let mut out = Map::new();
            for (member_name, member) in &structure.members {
                if member.location != Location::Body {
                    continue;
                }
                let wire_name = member.wire_name(member_name);
                let member_shape = member.shape.resolve(registry)?;
                let parsed = match member_shape.as_ref() {
                    Shape::List(list) => read_list(registry, list, wire_name, element)?,
                    Shape::Map(map_shape) => read_map(registry, map_shape, wire_name, element)?,
                    other => element
                        .child(wire_name)
                        .map(|child| from_xml(registry, other, child))
                        .transpose()?,
                };
                if let Some(parsed) = parsed {
                    out.insert(member_name.clone(), parsed);
                }
            }
            Ok(Value::Object(out))
        }
        Shape::List(list) => Ok(read_list(registry, list, "member", element)?
            .unwrap_or_else(|| Value::Array(Vec::new()))),
        Shape::Map(map_shape) => Ok(read_map(registry, map_shape, "entry", element)?
            .unwrap_or_else(|| Value::Object(Map::new()))),
        scalar => Ok(coerce::scalar_from_string(scalar, &element.text)),
    }
}

fn read_list(
    registry: &SchemaRegistry,
    list: &ListShape,
    wire_name: &str,
    parent: &XmlElement,
) -> Result<Option<Value>, SdkError> {
    let element_shape = list.member.shape.resolve(registry)?;
    if list.flattened {
        let items: Vec<&XmlElement> = parent.children_named(wire_name).collect();
        if items.is_empty() {
            return Ok(None);
        }
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(from_xml(registry, &element_shape, item)?);
        }
        return Ok(Some(Value::Array(out)));
    }

    let Some(wrapper) = parent.child(wire_name) else {
        return Ok(None);
    };
    let mut out = Vec::with_capacity(wrapper.children.len());
    for item in &wrapper.children {
        out.push(from_xml(registry, &element_shape, item)?);
    }
    Ok(Some(Value::Array(out)))
}

fn read_map(
    registry: &SchemaRegistry,
    map_shape: &MapShape,
    wire_name: &str,
    parent: &XmlElement,
) -> Result<Option<Value>, SdkError> {
    let value_shape = map_shape.value.shape.resolve(registry)?;
    let key_name = map_shape.key_name.as_deref().unwrap_or("key");
    let value_name = map_shape.value_name.as_deref().unwrap_or("value");

    let entries: Vec<&XmlElement> = if map_shape.flattened {
        parent.children_named(wire_name).collect()
    } else {
        match parent.child(wire_name) {
            Some(wrapper) => wrapper.children.iter().collect(),
            None => return Ok(None),
        }
    };
    if entries.is_empty() && map_shape.flattened {
        return Ok(None);
    }

    let mut out = Map::new();
    for entry in entries {
        let Some(key) = entry.child_text(key_name) else {
            continue;
        };
        let value = entry
            .child(value_name)
            .map(|v| from_xml(registry, &value_shape, v))
            .transpose()?
            .unwrap_or(Value::Null);
        out.insert(key.to_string(), value);
    }
    Ok(Some(Value::Object(out)))
}
