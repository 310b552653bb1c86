//! Wire-level request/response types and the transport boundary.
//!
//! A [`WireRequest`] is the mutable, single-use, in-progress representation
//! of one operation call: method, endpoint binding, path, query, headers,
//! and body. Codecs populate it, signers mutate it, and a [`Transport`]
//! finally carries it. The [`WireResponse`] holds the raw transport bytes,
//! headers, and status for the codecs to decode.
//!
//! The transport itself is an injected collaborator behind the [`Transport`]
//! trait; [`ReqwestTransport`] is the default implementation.

mod reqwest;

pub use self::reqwest::ReqwestTransport;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::schema::HttpMethod;

/// A transport-level failure: the request could not be sent or no complete
/// response was received.
///
/// Always classified as retryable by the retry policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    /// Human-readable failure description.
    pub message: String,
}

impl TransportError {
    /// Creates a transport error from any displayable cause.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Case-insensitive header map.
///
/// Names are lowercased on insertion; iteration order is sorted by name,
/// which the signers rely on when building canonical header strings.
/// Repeated headers keep their insertion order per name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, Vec<String>>,
}

impl Headers {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any existing values.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(name.as_ref().to_lowercase(), vec![value.into()]);
    }

    /// Appends a value to a header, keeping existing ones.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(name.as_ref().to_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Returns the first value of a header, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns all values of a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&name.to_lowercase())
            .map_or(&[], Vec::as_slice)
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Removes a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.remove(&name.to_lowercase());
    }

    /// Iterates over `(name, value)` pairs sorted by lowercase name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(name, values)| {
            values.iter().map(move |value| (name.as_str(), value.as_str()))
        })
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no headers are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The request body.
///
/// Structured protocols produce text; literal payload members travel as raw
/// bytes unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Body bytes (text bodies are UTF-8).
    Bytes(Bytes),
}

impl Body {
    /// Creates a body from text.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::Bytes(Bytes::from(text.into()))
    }

    /// Returns the body bytes (empty slice for [`Body::Empty`]).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Empty => &[],
            Self::Bytes(bytes) => bytes,
        }
    }

    /// Returns true if there is no body content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// The mutable, single-use wire request for one operation call.
///
/// Created per call, owned exclusively by the calling execution, and
/// destroyed after completion. A retry rebuilds it from scratch.
#[derive(Clone, Debug)]
pub struct WireRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// URL scheme (`https` unless an endpoint override says otherwise).
    pub scheme: String,
    /// Target host.
    pub host: String,
    /// Explicit port, when the endpoint override carries one.
    pub port: Option<u16>,
    /// Percent-encoded request path, always starting with `/`.
    pub path: String,
    /// Query parameters in insertion order; repeated names allowed.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: Headers,
    /// Request body.
    pub body: Body,
}

impl WireRequest {
    /// Creates a request bound to the given endpoint with an empty path.
    #[must_use]
    pub fn new(method: HttpMethod, endpoint: &Url) -> Self {
        let mut headers = Headers::new();
        if let Some(host) = endpoint.host_str() {
            let host_header = endpoint.port().map_or_else(
                || host.to_string(),
                |port| format!("{host}:{port}"),
            );
            headers.set("Host", host_header);
        }
        Self {
            method,
            scheme: endpoint.scheme().to_string(),
            host: endpoint.host_str().unwrap_or_default().to_string(),
            port: endpoint.port(),
            path: "/".to_string(),
            query: Vec::new(),
            headers,
            body: Body::Empty,
        }
    }

    /// Appends a query parameter.
    pub fn add_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query.push((name.into(), value.into()));
    }

    /// Returns `host` or `host:port` as used in the Host header.
    #[must_use]
    pub fn authority(&self) -> String {
        self.port.map_or_else(
            || self.host.clone(),
            |port| format!("{}:{}", self.host, port),
        )
    }

    /// Returns the encoded query string (no leading `?`), in insertion
    /// order.
    #[must_use]
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(name, value)| {
                if value.is_empty() {
                    urlencoding::encode(name).into_owned()
                } else {
                    format!(
                        "{}={}",
                        urlencoding::encode(name),
                        urlencoding::encode(value)
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Returns the full URL for this request.
    #[must_use]
    pub fn url(&self) -> String {
        let mut url = format!("{}://{}{}", self.scheme, self.authority(), self.path);
        let query = self.query_string();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }
}

/// The raw response for one request, 1:1 with its [`WireRequest`].
#[derive(Clone, Debug)]
pub struct WireResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers (lowercased names).
    pub headers: Headers,
    /// Raw body bytes.
    pub body: Bytes,
}

impl WireResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns true for 3xx statuses.
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        self.status >= 300 && self.status < 400
    }

    /// Returns the body as UTF-8 text (lossy).
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns the request id the service attached to the response, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get("x-amzn-requestid")
            .or_else(|| self.headers.get("x-amz-request-id"))
    }
}

/// The injected transport collaborator.
///
/// Implementations must support concurrent use: many requests may be in
/// flight at once, each owning its own state.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends the request and collects the complete response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request could not be sent or the
    /// response could not be read to completion.
    async fn send(&self, request: &WireRequest) -> Result<WireResponse, TransportError>;
}
