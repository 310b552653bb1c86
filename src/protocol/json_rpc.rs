//! The structured-body protocol.
//!
//! The whole parameter tree is serialized into a single JSON document
//! body; the target operation is named by a header
//! (`X-Amz-Target: {prefix}.{Operation}`). Errors are read from a header
//! first, falling back to a body field.

use serde_json::Value;

use crate::error::SdkError;
use crate::schema::{Operation, ServiceSchema};
use crate::transport::{Body, WireRequest, WireResponse};

use super::{json_body, Codec, ErrorInfo};

/// Codec for the structured-body protocol.
#[derive(Debug)]
pub struct JsonRpcCodec;

impl Codec for JsonRpcCodec {
    fn build(
        &self,
        request: &mut WireRequest,
        schema: &ServiceSchema,
        operation: &Operation,
        params: &Value,
    ) -> Result<(), SdkError> {
        let target_prefix = schema
            .target_prefix
            .as_deref()
            .unwrap_or(&schema.service_id);
        request
            .headers
            .set("X-Amz-Target", format!("{target_prefix}.{}", operation.name));

        let version = schema.json_version.as_deref().unwrap_or("1.0");
        request
            .headers
            .set("Content-Type", format!("application/x-amz-json-{version}"));

        let document = match &operation.input {
            Some(input) => {
                let shape = input.resolve(&schema.registry)?;
                json_body::to_wire(&schema.registry, &shape, params)?
            }
            None => Value::Object(serde_json::Map::new()),
        };
        request.path = "/".to_string();
        request.body = Body::from_text(document.to_string());
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
        if response.body.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        let document: Value = serde_json::from_slice(&response.body).map_err(|_| {
            SdkError::Unknown {
                status: response.status,
            }
        })?;
        let shape = output.resolve(&schema.registry)?;
        json_body::from_wire(&schema.registry, &shape, &document)
    }

    fn extract_error(&self, response: &WireResponse) -> Option<ErrorInfo> {
        let body: Option<Value> = serde_json::from_slice(&response.body).ok();

        // The error-type header wins over the body field.
        let header_code = response
            .headers
            .get("x-amzn-errortype")
            .map(|raw| raw.split(':').next().unwrap_or(raw).to_string());

        let body_code = body.as_ref().and_then(|doc| {
            doc.get("__type")
                .or_else(|| doc.get("code"))
                .and_then(Value::as_str)
                .map(strip_type_namespace)
        });

        let code = header_code.or(body_code)?;
        let message = body
            .as_ref()
            .and_then(|doc| {
                doc.get("message")
                    .or_else(|| doc.get("Message"))
                    .and_then(Value::as_str)
            })
            .unwrap_or_default()
            .to_string();

        Some(ErrorInfo { code, message })
    }
}

/// Strips the `namespace#` prefix some services put in the error type.
fn strip_type_namespace(raw: &str) -> String {
    raw.rsplit('#').next().unwrap_or(raw).to_string()
}
