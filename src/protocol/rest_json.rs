//! The REST protocol with JSON payloads.
//!
//! Member placement (URI segments, query string, headers, header maps) is
//! handled by the shared REST logic; whatever remains serializes through
//! the JSON sub-codec, unless a single member is marked as the literal
//! payload — then it is sent as-is, including raw bytes.

use serde_json::{Map, Value};

use crate::error::SdkError;
use crate::schema::{Operation, ServiceSchema, Shape, StructureShape};
use crate::transport::{Body, WireRequest, WireResponse};

use super::{json_body, rest, Codec, ErrorInfo, JsonRpcCodec};

/// Codec for the REST/JSON protocol.
#[derive(Debug)]
pub struct RestJsonCodec;

fn input_structure(
    schema: &ServiceSchema,
    operation: &Operation,
) -> Result<Option<StructureShape>, SdkError> {
    let Some(input) = &operation.input else {
        return Ok(None);
    };
    let shape = input.resolve(&schema.registry)?;
    match shape.as_ref() {
        Shape::Structure(structure) => Ok(Some(structure.clone())),
        _ => Ok(None),
    }
}

fn output_structure(
    schema: &ServiceSchema,
    operation: &Operation,
) -> Result<Option<StructureShape>, SdkError> {
    let Some(output) = &operation.output else {
        return Ok(None);
    };
    let shape = output.resolve(&schema.registry)?;
    match shape.as_ref() {
        Shape::Structure(structure) => Ok(Some(structure.clone())),
        _ => Ok(None),
    }
}

impl Codec for RestJsonCodec {
    fn build(
        &self,
        request: &mut WireRequest,
        schema: &ServiceSchema,
        operation: &Operation,
        params: &Value,
    ) -> Result<(), SdkError> {
        let structure = input_structure(schema, operation)?;
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
                // Literal payloads travel as-is.
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
                    let document = json_body::to_wire(&schema.registry, other, value)?;
                    request.body = Body::from_text(document.to_string());
                    request.headers.set("Content-Type", "application/json");
                }
            }
            return Ok(());
        }

        let document =
            json_body::to_wire(&schema.registry, &Shape::Structure(structure), params)?;
        if document.as_object().is_some_and(|map| !map.is_empty()) {
            request.body = Body::from_text(document.to_string());
            request.headers.set("Content-Type", "application/json");
        }
        Ok(())
    }

    fn extract_data(
        &self,
        response: &WireResponse,
        schema: &ServiceSchema,
        operation: &Operation,
    ) -> Result<Value, SdkError> {
        let Some(structure) = output_structure(schema, operation)? else {
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
                    if !response.body.is_empty() {
                        let document: Value = serde_json::from_slice(&response.body)
                            .map_err(|_| SdkError::Unknown {
                                status: response.status,
                            })?;
                        data.insert(
                            payload_name.to_string(),
                            json_body::from_wire(&schema.registry, other, &document)?,
                        );
                    }
                }
            }
            return Ok(Value::Object(data));
        }

        if !response.body.is_empty() {
            let document: Value =
                serde_json::from_slice(&response.body).map_err(|_| SdkError::Unknown {
                    status: response.status,
                })?;
            if let Value::Object(body_members) = json_body::from_wire(
                &schema.registry,
                &Shape::Structure(structure),
                &document,
            )? {
                data.extend(body_members);
            }
        }
        Ok(Value::Object(data))
    }

    fn extract_error(&self, response: &WireResponse) -> Option<ErrorInfo> {
        // Same header-then-body rule as the structured-body protocol.
        JsonRpcCodec.extract_error(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        HttpMethod, Location, Member, Protocol, ShapeRef, SigningAlgorithm,
    };
    use crate::transport::Headers;
    use bytes::Bytes;
    use serde_json::json;
    use url::Url;

    fn test_schema() -> ServiceSchema {
        let mut schema = ServiceSchema::new(
            "things",
            "2024-01-01",
            Protocol::RestJson,
            SigningAlgorithm::V4,
        );
        let input = ShapeRef::inline(Shape::Structure(
            StructureShape::new()
                .member(
                    "Id",
                    Member::new(ShapeRef::inline(Shape::String)).located(Location::UriSegment),
                )
                .member("Name", Member::new(ShapeRef::inline(Shape::String)))
                .require("Id"),
        ));
        let output = ShapeRef::inline(Shape::Structure(
            StructureShape::new()
                .member("Name", Member::new(ShapeRef::inline(Shape::String)))
                .member(
                    "RequestId",
                    Member::new(ShapeRef::inline(Shape::String))
                        .located(Location::Header)
                        .named("x-amzn-requestid"),
                ),
        ));
        schema.add_operation(
            Operation::new("UpdateThing", HttpMethod::Put, "/things/{Id}")
                .input(input)
                .output(output),
        );

        let upload_input = ShapeRef::inline(Shape::Structure(
            StructureShape::new()
                .member(
                    "Id",
                    Member::new(ShapeRef::inline(Shape::String)).located(Location::UriSegment),
                )
                .member("Data", Member::new(ShapeRef::inline(Shape::Binary)))
                .payload("Data"),
        ));
        schema.add_operation(
            Operation::new("UploadThing", HttpMethod::Put, "/things/{Id}/data")
                .input(upload_input),
        );
        schema
    }

    fn build(operation: &str, params: Value) -> WireRequest {
        let schema = test_schema();
        let op = schema.operation(operation).unwrap();
        let mut request = WireRequest::new(
            op.http_method,
            &Url::parse("https://things.us-east-1.amazonaws.com").unwrap(),
        );
        RestJsonCodec
            .build(&mut request, &schema, op, &params)
            .unwrap();
        request
    }

    #[test]
    fn test_body_members_serialize_as_json() {
        let request = build("UpdateThing", json!({"Id": "t-1", "Name": "abc"}));
        assert_eq!(request.path, "/things/t-1");
        assert_eq!(request.body.as_bytes(), br#"{"Name":"abc"}"#);
        assert_eq!(request.headers.get("content-type"), Some("application/json"));
    }

    #[test]
    fn test_payload_member_is_sent_raw() {
        let request = build("UploadThing", json!({"Id": "t-1", "Data": "raw-bytes"}));
        assert_eq!(request.body.as_bytes(), b"raw-bytes");
        assert_eq!(
            request.headers.get("content-type"),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn test_no_body_members_means_no_body() {
        let request = build("UpdateThing", json!({"Id": "t-1"}));
        assert!(request.body.is_empty());
        assert!(!request.headers.contains("content-type"));
    }

    #[test]
    fn test_extract_data_merges_body_and_headers() {
        let schema = test_schema();
        let op = schema.operation("UpdateThing").unwrap();
        let mut headers = Headers::new();
        headers.set("x-amzn-requestid", "req-9");
        let response = WireResponse {
            status: 200,
            headers,
            body: Bytes::from_static(br#"{"Name":"abc"}"#),
        };
        let data = RestJsonCodec.extract_data(&response, &schema, op).unwrap();
        assert_eq!(data, json!({"Name": "abc", "RequestId": "req-9"}));
    }
}
