//! Location handling shared by the two REST protocols.
//!
//! Members tagged as URI segments substitute into `{name}` placeholders in
//! the operation's path template — percent-encoded, with the greedy
//! `{name+}` variant preserving `/`. Query-string members become query
//! parameters (a list value is a repeated parameter; an empty list is
//! never emitted), header members become headers, and header-map members
//! expand to one header per key under their declared prefix. What remains
//! is the body, serialized by the protocol's payload sub-codec.

use serde_json::{Map, Value};

use crate::error::SdkError;
use crate::schema::{
    coerce, Location, Member, Operation, SchemaRegistry, Shape, StructureShape, TimestampFormat,
};
use crate::transport::{WireRequest, WireResponse};

/// Substitutes URI-segment members into the operation's path template and
/// emits query-string, header, and header-map members.
///
/// # Errors
///
/// Returns [`SdkError::Schema`] on unresolvable member shapes.
pub fn populate_request(
    request: &mut WireRequest,
    operation: &Operation,
    registry: &SchemaRegistry,
    structure: Option<&StructureShape>,
    params: &Value,
) -> Result<(), SdkError> {
    let (template, static_query) = split_uri(&operation.request_uri);
    let mut path = template.to_string();

    if let (Some(structure), Value::Object(map)) = (structure, params) {
        for (name, member) in &structure.members {
            let Some(value) = map.get(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let member_shape = member.shape.resolve(registry)?;
            match member.location {
                Location::UriSegment => {
                    path = substitute_segment(&path, member.wire_name(name), &member_shape, value);
                }
                Location::QueryString => {
                    emit_query(request, member.wire_name(name), &member_shape, value, registry)?;
                }
                Location::Header => {
                    if let Some(text) = coerce::scalar_to_string(
                        &member_shape,
                        value,
                        TimestampFormat::Rfc1123,
                    ) {
                        request.headers.set(member.wire_name(name), text);
                    }
                }
                Location::Headers => {
                    if let (Shape::Map(map_shape), Value::Object(entries)) =
                        (member_shape.as_ref(), value)
                    {
                        let prefix = member.wire_name(name);
                        let value_shape = map_shape.value.shape.resolve(registry)?;
                        for (key, entry_value) in entries {
                            if let Some(text) = coerce::scalar_to_string(
                                &value_shape,
                                entry_value,
                                TimestampFormat::Rfc1123,
                            ) {
                                request.headers.set(format!("{prefix}{key}"), text);
                            }
                        }
                    }
                }
                Location::Body | Location::StatusCode => {}
            }
        }
    }

    request.path = path;
    for (name, value) in static_query {
        request.add_query(name, value);
    }
    Ok(())
}

/// Collects header, header-map, and status-code output members into
/// `data`.
///
/// # Errors
///
/// Returns [`SdkError::Schema`] on unresolvable member shapes.
pub fn extract_metadata(
    response: &WireResponse,
    registry: &SchemaRegistry,
    structure: &StructureShape,
    data: &mut Map<String, Value>,
) -> Result<(), SdkError> {
    for (name, member) in &structure.members {
        match member.location {
            Location::Header => {
                if let Some(raw) = response.headers.get(member.wire_name(name)) {
                    let member_shape = member.shape.resolve(registry)?;
                    data.insert(name.clone(), coerce::scalar_from_string(&member_shape, raw));
                }
            }
            Location::Headers => {
                let prefix = member.wire_name(name).to_lowercase();
                let mut collected = Map::new();
                for (header_name, header_value) in response.headers.iter() {
                    if let Some(suffix) = header_name.strip_prefix(&prefix) {
                        collected.insert(
                            suffix.to_string(),
                            Value::String(header_value.to_string()),
                        );
                    }
                }
                if !collected.is_empty() {
                    data.insert(name.clone(), Value::Object(collected));
                }
            }
            Location::StatusCode => {
                data.insert(name.clone(), Value::from(response.status));
            }
            Location::Body | Location::UriSegment | Location::QueryString => {}
        }
    }
    Ok(())
}

/// Returns the payload member of a structure, if one is declared.
#[must_use]
pub fn payload_member<'a>(structure: &'a StructureShape) -> Option<(&'a str, &'a Member)> {
    let payload = structure.payload.as_deref()?;
    structure.get(payload).map(|member| (payload, member))
}

fn split_uri(request_uri: &str) -> (&str, Vec<(String, String)>) {
    let Some((path, query)) = request_uri.split_once('?') else {
        return (request_uri, Vec::new());
    };
    let pairs = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once('=').map_or_else(
                || (pair.to_string(), String::new()),
                |(name, value)| (name.to_string(), value.to_string()),
            )
        })
        .collect();
    (path, pairs)
}

fn substitute_segment(path: &str, name: &str, shape: &Shape, value: &Value) -> String {
    let Some(text) = coerce::scalar_to_string(shape, value, TimestampFormat::Iso8601) else {
        return path.to_string();
    };
    // The greedy form keeps `/` unescaped; the non-greedy form escapes it.
    let greedy_placeholder = format!("{{{name}+}}");
    if path.contains(&greedy_placeholder) {
        return path.replace(
            &greedy_placeholder,
            &crate::signer::uri_encode(&text, false),
        );
    }
    path.replace(
        &format!("{{{name}}}"),
        &crate::signer::uri_encode(&text, true),
    )
}

fn emit_query(
    request: &mut WireRequest,
    name: &str,
    shape: &Shape,
    value: &Value,
    registry: &SchemaRegistry,
) -> Result<(), SdkError> {
    match (shape, value) {
        // A list-valued member is a repeated query parameter; empty lists
        // are never emitted.
        (Shape::List(list), Value::Array(items)) => {
            let element_shape = list.member.shape.resolve(registry)?;
            for item in items {
                if let Some(text) =
                    coerce::scalar_to_string(&element_shape, item, TimestampFormat::Iso8601)
                {
                    request.add_query(name, text);
                }
            }
        }
        // A map-valued member contributes one parameter per key.
        (Shape::Map(map_shape), Value::Object(entries)) => {
            let value_shape = map_shape.value.shape.resolve(registry)?;
            for (key, entry_value) in entries {
                if let Some(text) =
                    coerce::scalar_to_string(&value_shape, entry_value, TimestampFormat::Iso8601)
                {
                    request.add_query(key, text);
                }
            }
        }
        (scalar, _) => {
            if let Some(text) = coerce::scalar_to_string(scalar, value, TimestampFormat::Iso8601) {
                request.add_query(name, text);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{HttpMethod, ListShape, MapShape, ShapeRef};
    use crate::transport::Headers;
    use bytes::Bytes;
    use serde_json::json;
    use url::Url;

    fn request() -> WireRequest {
        WireRequest::new(
            HttpMethod::Get,
            &Url::parse("https://svc.us-east-1.amazonaws.com").unwrap(),
        )
    }

    fn object_input() -> StructureShape {
        StructureShape::new()
            .member(
                "Bucket",
                Member::new(ShapeRef::inline(Shape::String)).located(Location::UriSegment),
            )
            .member(
                "Key",
                Member::new(ShapeRef::inline(Shape::String)).located(Location::UriSegment),
            )
            .member(
                "Marker",
                Member::new(ShapeRef::inline(Shape::String)).located(Location::QueryString),
            )
            .member(
                "ContentType",
                Member::new(ShapeRef::inline(Shape::String))
                    .located(Location::Header)
                    .named("Content-Type"),
            )
            .member(
                "Metadata",
                Member::new(ShapeRef::inline(Shape::Map(MapShape::new(Member::new(
                    ShapeRef::inline(Shape::String),
                )))))
                .located(Location::Headers)
                .named("x-amz-meta-"),
            )
    }

    #[test]
    fn test_non_greedy_segment_escapes_slash() {
        let registry = SchemaRegistry::new();
        let operation = Operation::new("GetObject", HttpMethod::Get, "/{Bucket}/{Key}");
        let mut req = request();
        populate_request(
            &mut req,
            &operation,
            &registry,
            Some(&object_input()),
            &json!({"Bucket": "b", "Key": "a/b"}),
        )
        .unwrap();
        assert_eq!(req.path, "/b/a%2Fb");
    }

    #[test]
    fn test_greedy_segment_preserves_slash() {
        let registry = SchemaRegistry::new();
        let operation = Operation::new("GetObject", HttpMethod::Get, "/{Bucket}/{Key+}");
        let mut req = request();
        populate_request(
            &mut req,
            &operation,
            &registry,
            Some(&object_input()),
            &json!({"Bucket": "b", "Key": "a/b"}),
        )
        .unwrap();
        assert_eq!(req.path, "/b/a/b");
    }

    #[test]
    fn test_static_query_in_template_is_kept() {
        let registry = SchemaRegistry::new();
        let operation = Operation::new("GetAcl", HttpMethod::Get, "/{Bucket}?acl");
        let mut req = request();
        populate_request(
            &mut req,
            &operation,
            &registry,
            Some(&object_input()),
            &json!({"Bucket": "b"}),
        )
        .unwrap();
        assert_eq!(req.path, "/b");
        assert_eq!(req.query, vec![("acl".to_string(), String::new())]);
    }

    #[test]
    fn test_header_and_query_members() {
        let registry = SchemaRegistry::new();
        let operation = Operation::new("GetObject", HttpMethod::Get, "/{Bucket}");
        let mut req = request();
        populate_request(
            &mut req,
            &operation,
            &registry,
            Some(&object_input()),
            &json!({"Bucket": "b", "Marker": "m1", "ContentType": "text/plain"}),
        )
        .unwrap();
        assert!(req.query.contains(&("Marker".to_string(), "m1".to_string())));
        assert_eq!(req.headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_header_map_expands_with_prefix() {
        let registry = SchemaRegistry::new();
        let operation = Operation::new("PutObject", HttpMethod::Put, "/{Bucket}");
        let mut req = request();
        populate_request(
            &mut req,
            &operation,
            &registry,
            Some(&object_input()),
            &json!({"Bucket": "b", "Metadata": {"owner": "me"}}),
        )
        .unwrap();
        assert_eq!(req.headers.get("x-amz-meta-owner"), Some("me"));
    }

    #[test]
    fn test_repeated_and_empty_query_lists() {
        let registry = SchemaRegistry::new();
        let input = StructureShape::new().member(
            "Id",
            Member::new(ShapeRef::inline(Shape::List(ListShape::new(Member::new(
                ShapeRef::inline(Shape::String),
            )))))
            .located(Location::QueryString)
            .named("id"),
        );
        let operation = Operation::new("ListThings", HttpMethod::Get, "/things");

        let mut req = request();
        populate_request(
            &mut req,
            &operation,
            &registry,
            Some(&input),
            &json!({"Id": ["a", "b"]}),
        )
        .unwrap();
        assert_eq!(
            req.query,
            vec![
                ("id".to_string(), "a".to_string()),
                ("id".to_string(), "b".to_string())
            ]
        );

        let mut empty = request();
        populate_request(
            &mut empty,
            &operation,
            &registry,
            Some(&input),
            &json!({"Id": []}),
        )
        .unwrap();
        assert!(empty.query.is_empty());
    }

    #[test]
    fn test_extract_metadata_reads_headers_and_status() {
        let registry = SchemaRegistry::new();
        let output = StructureShape::new()
            .member(
                "ETag",
                Member::new(ShapeRef::inline(Shape::String))
                    .located(Location::Header)
                    .named("ETag"),
            )
            .member(
                "Metadata",
                Member::new(ShapeRef::inline(Shape::Map(MapShape::new(Member::new(
                    ShapeRef::inline(Shape::String),
                )))))
                .located(Location::Headers)
                .named("x-amz-meta-"),
            )
            .member(
                "Status",
                Member::new(ShapeRef::inline(Shape::Integer)).located(Location::StatusCode),
            );

        let mut headers = Headers::new();
        headers.set("ETag", "\"abc\"");
        headers.set("x-amz-meta-owner", "me");
        let response = WireResponse {
            status: 201,
            headers,
            body: Bytes::new(),
        };

        let mut data = Map::new();
        extract_metadata(&response, &registry, &output, &mut data).unwrap();
        assert_eq!(
            Value::Object(data),
            json!({"ETag": "\"abc\"", "Metadata": {"owner": "me"}, "Status": 201})
        );
    }
}
