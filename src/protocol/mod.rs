//! Wire codecs: four protocol families behind one interface.
//!
//! A [`Codec`] turns a logical operation call into an in-progress wire
//! request and decodes the response (success or error) back into typed
//! data, all keyed off the shape model:
//!
//! - [`JsonRpcCodec`]: whole param tree as one JSON document body, target
//!   operation named by a header
//! - [`QueryCodec`]: params flattened into form-encoded key=value pairs,
//!   XML responses
//! - [`RestJsonCodec`]: URI/query/header placement with a JSON payload
//! - [`RestXmlCodec`]: identical placement with an XML payload

pub mod json_body;
pub mod xml_body;

mod json_rpc;
mod query;
mod rest;
mod rest_json;
mod rest_xml;

pub use json_rpc::JsonRpcCodec;
pub use query::QueryCodec;
pub use rest_json::RestJsonCodec;
pub use rest_xml::RestXmlCodec;

use std::fmt;

use serde_json::Value;

use crate::error::SdkError;
use crate::schema::{Operation, Protocol, ServiceSchema};
use crate::transport::{WireRequest, WireResponse};

/// Error code and message extracted from a failed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Wire-level error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// One wire protocol family.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Populates the wire request from the operation and validated params.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Schema`] if the operation references
    /// unresolvable shapes.
    fn build(
        &self,
        request: &mut WireRequest,
        schema: &ServiceSchema,
        operation: &Operation,
        params: &Value,
    ) -> Result<(), SdkError>;

    /// Decodes a successful response into typed data.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Schema`] on unresolvable shapes.
    fn extract_data(
        &self,
        response: &WireResponse,
        schema: &ServiceSchema,
        operation: &Operation,
    ) -> Result<Value, SdkError>;

    /// Decodes a structured error from a failed response, if one is
    /// parseable.
    fn extract_error(&self, response: &WireResponse) -> Option<ErrorInfo>;
}

/// Returns the codec for a protocol family.
#[must_use]
pub fn codec_for(protocol: Protocol) -> &'static dyn Codec {
    match protocol {
        Protocol::Json => &JsonRpcCodec,
        Protocol::Query => &QueryCodec,
        Protocol::RestJson => &RestJsonCodec,
        Protocol::RestXml => &RestXmlCodec,
    }
}
