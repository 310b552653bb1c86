//! The REST protocol with XML payloads.
//!
//! Identical member placement to the JSON-bodied variant; the payload
//! sub-codec emits and parses an XML document instead.

use serde_json::{Map, Value};

use crate::error::SdkError;
use crate::schema::{Operation, ServiceSchema, Shape, StructureShape};
use crate::transport::{Body, WireRequest, WireResponse};

use super::{rest, xml_body, Codec, ErrorInfo, QueryCodec};

/// Codec for the REST/XML protocol.
#[derive(Debug)]
pub struct RestXmlCodec;

fn structure_of(
    schema: &ServiceSchema,
    shape_ref: Option<&crate::schema::ShapeRef>,
) -> Result<Option<StructureShape>, SdkError> {
    let Some(shape_ref) = shape_ref else {
        return Ok(None);
    };
    let shape = shape_ref.resolve(&schema.registry)?;
    match shape.as_ref() {
        Shape::Structure(structure) => Ok(Some(structure.clone())),
        _ => Ok(None),
    }
}

impl Codec for RestXmlCodec {
    fn build(
        &self,
        request: &mut WireRequest,
        schema: &ServiceSchema,
        operation: &Operation,
        params: &Value,
    ) -> Result<(), SdkError> {
        let structure = structure_of(schema, operation.input.as_ref())?;
        rest::populate_request(
            request,
            operation,
            &schema.registry,
            structure.as_ref(),
            params,
        )?;

        let Some(structure) = structure else {
            return Ok(());
        };

        if let Some((payload_name, member)) = rest::payload_member(&structure) {
            let Some(value) = params.get(payload_name) else {
                return Ok(());
            };
            let payload_shape = member.shape.resolve(&schema.registry)?;
            match payload_shape.as_ref() {
                Shape::Binary | Shape::String => {
                    if let Some(text) = value.as_str() {
                        request.body = Body::from_text(text);
                        if !request.headers.contains("content-type") {
                            request
                                .headers
                                .set("Content-Type", "application/octet-stream");
                        }
                    }
                }
                other => {
                    let root_name = member.wire_name(payload_name);
                    let mut element =
                        xml_body::to_xml(&schema.registry, other, root_name, value)?;
                    if let Some(namespace) = &schema.xml_namespace {
                        element.attrs.push(("xmlns".to_string(), namespace.clone()));
                    }
                    request.body = Body::from_text(xml_body::render(&element));
                    request.headers.set("Content-Type", "application/xml");
                }
            }
            return Ok(());
        }

        let default_wrapper = format!("{}Request", operation.name);
        let root_name = operation
            .input_wrapper
            .as_deref()
            .unwrap_or(&default_wrapper);
        let mut element = xml_body::to_xml(
            &schema.registry,
            &Shape::Structure(structure),
            root_name,
            params,
        )?;
        if element.children.is_empty() {
            return Ok(());
        }
        if let Some(namespace) = &schema.xml_namespace {
            element.attrs.push(("xmlns".to_string(), namespace.clone()));
        }
        request.body = Body::from_text(xml_body::render(&element));
        request.headers.set("Content-Type", "application/xml");
        Ok(())
    }

    fn extract_data(
        &self,
        response: &WireResponse,
        schema: &ServiceSchema,
        operation: &Operation,
    ) -> Result<Value, SdkError> {
        let Some(structure) = structure_of(schema, operation.output.as_ref())? else {
            return Ok(Value::Object(Map::new()));
        };

        let mut data = Map::new();
        rest::extract_metadata(response, &schema.registry, &structure, &mut data)?;

        if let Some((payload_name, member)) = rest::payload_member(&structure) {
            let payload_shape = member.shape.resolve(&schema.registry)?;
            match payload_shape.as_ref() {
                Shape::Binary | Shape::String => {
                    data.insert(
                        payload_name.to_string(),
                        Value::String(response.body_text()),
                    );
                }
                other => {
                    if let Some(document) = xml_body::parse(&response.body) {
                        data.insert(
                            payload_name.to_string(),
                            xml_body::from_xml(&schema.registry, other, &document)?,
                        );
                    }
                }
            }
            return Ok(Value::Object(data));
        }

        if let Some(document) = xml_body::parse(&response.body) {
            if let Value::Object(body_members) = xml_body::from_xml(
                &schema.registry,
                &Shape::Structure(structure),
                &document,
            )? {
                data.extend(body_members);
            }
        } else if !response.body.is_empty() {
            return Err(SdkError::Unknown {
                status: response.status,
            });
        }
        Ok(Value::Object(data))
    }

    fn extract_error(&self, response: &WireResponse) -> Option<ErrorInfo> {
        // Same markup error document as the query protocol.
        QueryCodec.extract_error(response)
    }
}
