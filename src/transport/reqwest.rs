//! Default transport implementation backed by `reqwest`.

use async_trait::async_trait;

use super::{Body, Headers, Transport, TransportError, WireRequest, WireResponse};
use crate::schema::HttpMethod;

/// Transport implementation over a shared `reqwest` client with rustls.
///
/// Safe to share across async tasks; the inner client pools connections.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a fresh connection pool.
    ///
    /// # Panics
    ///
    /// Panics if the underlying TLS backend cannot be initialized, which
    /// only happens in unusual environments.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn method_of(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &WireRequest) -> Result<WireResponse, TransportError> {
        let url = request.url();
        let mut builder = self.client.request(method_of(request.method), &url);

        for (name, value) in request.headers.iter() {
            // The HTTP stack derives Host from the URL and Content-Length
            // from the body.
            if name == "host" || name == "content-length" {
                continue;
            }
            builder = builder.header(name, value);
        }

        match &request.body {
            Body::Empty => {}
            Body::Bytes(bytes) => {
                tracing::debug!(bytes = bytes.len(), %url, "uploading request body");
                builder = builder.body(bytes.to_vec());
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            headers.append(name.as_str(), value.to_str().unwrap_or_default());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        tracing::debug!(status, bytes = body.len(), %url, "received response");

        Ok(WireResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReqwestTransport>();
    }

    #[test]
    fn test_method_conversion_covers_all_verbs() {
        assert_eq!(method_of(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(method_of(HttpMethod::Put), reqwest::Method::PUT);
        assert_eq!(method_of(HttpMethod::Delete), reqwest::Method::DELETE);
    }
}
