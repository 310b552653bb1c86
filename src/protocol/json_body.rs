//! Shape-directed translation between caller values and JSON documents.
//!
//! Used by the structured-body protocol for the whole tree and by the
//! REST/JSON protocol for the body portion. Member renames
//! (`location_name`) apply on the way out and are reversed on the way in;
//! members located outside the body are skipped here and handled by the
//! REST location logic.

use serde_json::{Map, Value};

use crate::error::SdkError;
use crate::schema::{coerce, Location, SchemaRegistry, Shape};

/// Serializes a validated value tree into its JSON wire form.
///
/// # Errors
///
/// Returns [`SdkError::Schema`] if the shape graph contains unresolvable
/// references.
pub fn to_wire(
    registry: &SchemaRegistry,
    shape: &Shape,
    value: &Value,
) -> Result<Value, SdkError> {
    match shape {
        Shape::Structure(structure) => {
            let Value::Object(params) = value else {
                return Ok(Value::Null);
            };
            let mut out = Map::new();
            // Declared member order drives output order.
            for (name, member) in &structure.members {
                if member.location != Location::Body {
                    continue;
                }
                let Some(member_value) = params.get(name) else {
                    continue;
                };
                if member_value.is_null() {
                    continue;
                }
                let member_shape = member.shape.resolve(registry)?;
                out.insert(
                    member.wire_name(name).to_string(),
                    to_wire(registry, &member_shape, member_value)?,
                );
            }
            Ok(Value::Object(out))
        }
        Shape::List(list) => {
            let Value::Array(items) = value else {
                return Ok(Value::Null);
            };
            let element_shape = list.member.shape.resolve(registry)?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_wire(registry, &element_shape, item)?);
            }
            Ok(Value::Array(out))
        }
        Shape::Map(map_shape) => {
            let Value::Object(entries) = value else {
                return Ok(Value::Null);
            };
            let value_shape = map_shape.value.shape.resolve(registry)?;
            let mut out = Map::new();
            for (key, entry_value) in entries {
                out.insert(key.clone(), to_wire(registry, &value_shape, entry_value)?);
            }
            Ok(Value::Object(out))
        }
        scalar => Ok(coerce::scalar_to_json(scalar, value)),
    }
}

/// Parses a JSON wire document back into a typed value tree.
///
/// Unknown keys in the document are dropped; the structure is closed.
///
/// # Errors
///
/// Returns [`SdkError::Schema`] if the shape graph contains unresolvable
/// references.
pub fn from_wire(
    registry: &SchemaRegistry,
    shape: &Shape,
    wire: &Value,
) -> Result<Value, SdkError> {
    match shape {
        Shape::Structure(structure) => {
            let Value::Object(document) = wire else {
                return Ok(Value::Object(Map::new()));
            };
            let mut out = Map::new();
            for (name, member) in &structure.members {
                if member.location != Location::Body {
                    continue;
                }
                let Some(wire_value) = document.get(member.wire_name(name)) else {
                    continue;
                };
                if wire_value.is_null() {
                    continue;
                }
                let member_shape = member.shape.resolve(registry)?;
                out.insert(
                    name.clone(),
                    from_wire(registry, &member_shape, wire_value)?,
                );
            }
            Ok(Value::Object(out))
        }
        Shape::List(list) => {
            let Value::Array(items) = wire else {
                return Ok(Value::Array(Vec::new()));
            };
            let element_shape = list.member.shape.resolve(registry)?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(from_wire(registry, &element_shape, item)?);
            }
            Ok(Value::Array(out))
        }
        Shape::Map(map_shape) => {
            let Value::Object(entries) = wire else {
                return Ok(Value::Object(Map::new()));
            };
            let value_shape = map_shape.value.shape.resolve(registry)?;
            let mut out = Map::new();
            for (key, entry_value) in entries {
                out.insert(
                    key.clone(),
                    from_wire(registry, &value_shape, entry_value)?,
                );
            }
            Ok(Value::Object(out))
        }
        scalar => Ok(coerce::scalar_from_json(scalar, wire)),
    }
}
