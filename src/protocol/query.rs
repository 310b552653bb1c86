//! The form/structured-text protocol.
//!
//! Requests flatten the parameter tree into dotted, 1-based-indexed
//! key=value pairs posted as a form body alongside `Action` and `Version`.
//! Responses are XML documents, unwrapped from an optional named result
//! wrapper; errors arrive as `<ErrorResponse><Error>` documents.

use serde_json::Value;

use crate::error::SdkError;
use crate::schema::{coerce, Location, Operation, SchemaRegistry, ServiceSchema, Shape, TimestampFormat};
use crate::transport::{Body, WireRequest, WireResponse};

use super::{xml_body, Codec, ErrorInfo};

/// Codec for the form/structured-text protocol.
#[derive(Debug)]
pub struct QueryCodec;

impl QueryCodec {
    /// Flattens a value tree into `(key, value)` pairs under `prefix`.
    fn serialize_member(
        registry: &SchemaRegistry,
        shape: &Shape,
        prefix: &str,
        value: &Value,
        out: &mut Vec<(String, String)>,
    ) -> Result<(), SdkError> {
        match shape {
            Shape::Structure(structure) => {
                let Value::Object(params) = value else {
                    return Ok(());
                };
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
                    let wire_name = member.wire_name(name);
                    let child_prefix = if prefix.is_empty() {
                        wire_name.to_string()
                    } else {
                        format!("{prefix}.{wire_name}")
                    };
                    let member_shape = member.shape.resolve(registry)?;
                    Self::serialize_member(
                        registry,
                        &member_shape,
                        &child_prefix,
                        member_value,
                        out,
                    )?;
                }
            }
            Shape::List(list) => {
                let Value::Array(items) = value else {
                    return Ok(());
                };
                // An empty list is never emitted.
                if items.is_empty() {
                    return Ok(());
                }
                let element_shape = list.member.shape.resolve(registry)?;
                for (index, item) in items.iter().enumerate() {
                    let position = index + 1;
                    let child_prefix = if list.flattened {
                        format!("{prefix}.{position}")
                    } else {
                        let item_name =
                            list.member.location_name.as_deref().unwrap_or("member");
                        format!("{prefix}.{item_name}.{position}")
                    };
                    Self::serialize_member(registry, &element_shape, &child_prefix, item, out)?;
                }
            }
            Shape::Map(map_shape) => {
                let Value::Object(entries) = value else {
                    return Ok(());
                };
                let value_shape = map_shape.value.shape.resolve(registry)?;
                let key_name = map_shape.key_name.as_deref().unwrap_or("key");
                let value_name = map_shape.value_name.as_deref().unwrap_or("value");
                for (position, (key, entry_value)) in entries.iter().enumerate() {
                    let entry_prefix = if map_shape.flattened {
                        format!("{prefix}.{}", position + 1)
                    } else {
                        format!("{prefix}.entry.{}", position + 1)
                    };
                    out.push((format!("{entry_prefix}.{key_name}"), key.clone()));
                    Self::serialize_member(
                        registry,
                        &value_shape,
                        &format!("{entry_prefix}.{value_name}"),
                        entry_value,
                        out,
                    )?;
                }
            }
            scalar => {
                if let Some(text) =
                    coerce::scalar_to_string(scalar, value, TimestampFormat::Iso8601)
                {
                    out.push((prefix.to_string(), text));
                }
            }
        }
        Ok(())
    }
}

impl Codec for QueryCodec {
    fn build(
        &self,
        request: &mut WireRequest,
        schema: &ServiceSchema,
        operation: &Operation,
        params: &Value,
    ) -> Result<(), SdkError> {
        let mut pairs = vec![
            ("Action".to_string(), operation.name.clone()),
            ("Version".to_string(), schema.api_version.clone()),
        ];
        if let Some(input) = &operation.input {
            let shape = input.resolve(&schema.registry)?;
            Self::serialize_member(&schema.registry, &shape, "", params, &mut pairs)?;
        }

        let body = pairs
            .iter()
            .map(|(name, value)| {
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");

        request.path = "/".to_string();
        request
            .headers
            .set("Content-Type", "application/x-www-form-urlencoded; charset=utf-8");
        request.body = Body::from_text(body);
        Ok(())
    }

    fn extract_data(
        &self,
        response: &WireResponse,
        schema: &ServiceSchema,
        operation: &Operation,
    ) -> Result<Value, SdkError> {
        let Some(output) = &operation.output else {
            return Ok(Value::Object(serde_json::Map::new()));
        };
        let shape = output.resolve(&schema.registry)?;

        let Some(document) = xml_body::parse(&response.body) else {
            if response.body.is_empty() {
                return Ok(Value::Object(serde_json::Map::new()));
            }
            return Err(SdkError::Unknown {
                status: response.status,
            });
        };

        // Unwrap the named result wrapper when the response carries one.
        let default_wrapper = format!("{}Result", operation.name);
        let wrapper_name = operation
            .result_wrapper
            .as_deref()
            .unwrap_or(&default_wrapper);
        let unwrapped = document.child(wrapper_name).unwrap_or(&document);

        xml_body::from_xml(&schema.registry, &shape, unwrapped)
    }

    fn extract_error(&self, response: &WireResponse) -> Option<ErrorInfo> {
        let document = xml_body::parse(&response.body)?;
        let error = if document.name == "Error" {
            &document
        } else {
            document.child("Error")?
        };
        Some(ErrorInfo {
            code: error.child_text("Code")?.to_string(),
            message: error
                .child_text("Message")
                .unwrap_or_default()
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        HttpMethod, ListShape, MapShape, Member, Protocol, ShapeRef, SigningAlgorithm,
        StructureShape,
    };
    use bytes::Bytes;
    use serde_json::json;
    use url::Url;

    fn test_schema() -> ServiceSchema {
        let mut schema = ServiceSchema::new(
            "widgets",
            "2012-11-05",
            Protocol::Query,
            SigningAlgorithm::V4,
        );
        let input = ShapeRef::inline(Shape::Structure(
            StructureShape::new()
                .member("Name", Member::new(ShapeRef::inline(Shape::String)))
                .member(
                    "Tags",
                    Member::new(ShapeRef::inline(Shape::List(ListShape::new(Member::new(
                        ShapeRef::inline(Shape::String),
                    ))))),
                )
                .member(
                    "Attributes",
                    Member::new(ShapeRef::inline(Shape::Map(MapShape::new(Member::new(
                        ShapeRef::inline(Shape::String),
                    ))))),
                ),
        ));
        let output = ShapeRef::inline(Shape::Structure(
            StructureShape::new()
                .member("QueueUrl", Member::new(ShapeRef::inline(Shape::String))),
        ));
        schema.add_operation(
            Operation::new("CreateQueue", HttpMethod::Post, "/")
                .input(input)
                .output(output),
        );
        schema
    }

    fn build_body(params: Value) -> String {
        let schema = test_schema();
        let operation = schema.operation("CreateQueue").unwrap();
        let mut request = WireRequest::new(
            HttpMethod::Post,
            &Url::parse("https://widgets.us-east-1.amazonaws.com").unwrap(),
        );
        QueryCodec
            .build(&mut request, &schema, operation, &params)
            .unwrap();
        String::from_utf8_lossy(request.body.as_bytes()).into_owned()
    }

    #[test]
    fn test_build_includes_action_and_version() {
        let body = build_body(json!({"Name": "queue"}));
        assert!(body.contains("Action=CreateQueue"));
        assert!(body.contains("Version=2012-11-05"));
        assert!(body.contains("Name=queue"));
    }

    #[test]
    fn test_lists_use_one_based_member_positions() {
        let body = build_body(json!({"Tags": ["a", "b"]}));
        assert!(body.contains("Tags.member.1=a"));
        assert!(body.contains("Tags.member.2=b"));
    }

    #[test]
    fn test_empty_list_is_never_emitted() {
        let body = build_body(json!({"Name": "queue", "Tags": []}));
        assert!(!body.contains("Tags"));
    }

    #[test]
    fn test_maps_use_entry_key_value_suffixes() {
        let body = build_body(json!({"Attributes": {"color": "red"}}));
        assert!(body.contains("Attributes.entry.1.key=color"));
        assert!(body.contains("Attributes.entry.1.value=red"));
    }

    fn response(body: &str) -> WireResponse {
        WireResponse {
            status: 200,
            headers: crate::transport::Headers::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_extract_data_unwraps_result_wrapper() {
        let schema = test_schema();
        let operation = schema.operation("CreateQueue").unwrap();
        let xml = "<CreateQueueResponse><CreateQueueResult><QueueUrl>https://q</QueueUrl></CreateQueueResult></CreateQueueResponse>";
        let data = QueryCodec
            .extract_data(&response(xml), &schema, operation)
            .unwrap();
        assert_eq!(data, json!({"QueueUrl": "https://q"}));
    }

    #[test]
    fn test_extract_error_reads_code_and_message() {
        let xml = "<ErrorResponse><Error><Code>Throttling</Code><Message>Rate exceeded</Message></Error></ErrorResponse>";
        let info = QueryCodec.extract_error(&response(xml)).unwrap();
        assert_eq!(info.code, "Throttling");
        assert_eq!(info.message, "Rate exceeded");
    }

    #[test]
    fn test_extract_error_handles_bare_error_document() {
        let xml = "<Error><Code>NoSuchKey</Code><Message>missing</Message></Error>";
        let info = QueryCodec.extract_error(&response(xml)).unwrap();
        assert_eq!(info.code, "NoSuchKey");
    }

    #[test]
    fn test_unparseable_error_body_yields_none() {
        assert!(QueryCodec.extract_error(&response("garbage")).is_none());
    }
}
