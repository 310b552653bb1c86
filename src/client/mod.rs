//! The service client: the public surface for invoking operations.
//!
//! A [`Client`] binds a service schema, an immutable configuration, a
//! credential provider, and a transport. It is cheap to clone and safe to
//! share across tasks; every [`invoke`](Client::invoke) produces an
//! independent single-use [`Request`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nimbus_client::{Client, ClientConfig, Credentials, Region, StaticProvider};
//! use serde_json::json;
//!
//! let config = ClientConfig::builder()
//!     .region(Region::new("us-east-1")?)
//!     .build()?;
//! let credentials = Arc::new(StaticProvider::new(Credentials::new("AKID", "secret")));
//! let client = Client::new(schema, config, credentials)?;
//!
//! let data = client.invoke("ListQueues", json!({}))?.send().await?;
//! ```

pub mod pagination;

mod request;
mod retry;
mod state;

pub use pagination::Pager;
pub use request::{AbortHandle, Request, SDK_VERSION};
pub use retry::{is_retryable, RetryPolicy};
pub use state::State;

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::credentials::ProvideCredentials;
use crate::endpoint;
use crate::error::{SchemaError, SdkError};
use crate::schema::{ServiceSchema, SigningAlgorithm};
use crate::signer::{self, Signer, V4Signer};
use crate::transport::{ReqwestTransport, Transport};

/// A client for one service, bound to a region and credential source.
#[derive(Clone, Debug)]
pub struct Client {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) schema: Arc<ServiceSchema>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) credentials: Arc<dyn ProvideCredentials>,
    pub(crate) signer: Arc<dyn Signer>,
    pub(crate) v4_signer: Arc<V4Signer>,
    pub(crate) endpoint: Url,
    pub(crate) retry: RetryPolicy,
}

impl Client {
    /// Creates a client with the default transport.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Config`] if the endpoint cannot be resolved
    /// for the configured region.
    pub fn new(
        schema: Arc<ServiceSchema>,
        config: ClientConfig,
        credentials: Arc<dyn ProvideCredentials>,
    ) -> Result<Self, SdkError> {
        Self::with_transport(schema, config, credentials, Arc::new(ReqwestTransport::new()))
    }

    /// Creates a client with an injected transport.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Config`] if the endpoint cannot be resolved
    /// for the configured region.
    pub fn with_transport(
        schema: Arc<ServiceSchema>,
        config: ClientConfig,
        credentials: Arc<dyn ProvideCredentials>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SdkError> {
        let endpoint = endpoint::resolve(&schema, &config)?;
        let algorithm = endpoint::signing_algorithm(&schema, config.region());

        // The chained-key signer is always constructed so presigned URLs
        // share one key cache per client regardless of the request scheme.
        let v4_signer = Arc::new(V4Signer::new(
            config.region().as_ref(),
            schema.signing_name(),
        ));
        let request_signer: Arc<dyn Signer> = if algorithm == SigningAlgorithm::V4 {
            Arc::clone(&v4_signer) as Arc<dyn Signer>
        } else {
            signer::create(algorithm, config.region().as_ref(), schema.signing_name())
        };

        let retry = RetryPolicy::new(&config, &schema);
        Ok(Self {
            config: Arc::new(config),
            schema,
            transport,
            credentials,
            signer: request_signer,
            v4_signer,
            endpoint,
            retry,
        })
    }

    /// Creates a single-use request for an operation.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Schema`] if the operation is not declared by
    /// the service schema.
    pub fn invoke(&self, operation: &str, params: Value) -> Result<Request, SdkError> {
        self.schema.operation(operation)?;
        Ok(Request::new(self.clone(), operation, params))
    }

    /// Creates a page iterator for a pageable operation.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Schema`] if the operation is unknown or
    /// declares no pagination descriptor.
    pub fn pager(&self, operation: &str, params: Value) -> Result<Pager, SdkError> {
        let declared = self.schema.operation(operation)?;
        let paginator = declared
            .paginator
            .clone()
            .ok_or_else(|| SchemaError::NotPageable {
                operation: operation.to_string(),
            })?;
        Ok(Pager::new(self.clone(), operation, paginator, params))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the resolved endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

// Verify the client is shareable across tasks at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Client>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;
    use crate::credentials::{Credentials, StaticProvider};
    use crate::schema::{HttpMethod, Operation, Paginator, Protocol};
    use serde_json::json;

    fn test_client() -> Client {
        let mut schema = ServiceSchema::new(
            "widgets",
            "2024-01-01",
            Protocol::Json,
            SigningAlgorithm::V4,
        );
        schema.add_operation(Operation::new("ListWidgets", HttpMethod::Post, "/"));
        schema.add_operation(
            Operation::new("ListPages", HttpMethod::Post, "/").paginator(Paginator {
                input_tokens: vec!["Token".to_string()],
                output_tokens: vec!["NextToken".to_string()],
                ..Paginator::default()
            }),
        );

        let config = ClientConfig::builder()
            .region(Region::new("us-east-1").unwrap())
            .build()
            .unwrap();
        let credentials = Arc::new(StaticProvider::new(Credentials::new("AKID", "secret")));
        Client::new(Arc::new(schema), config, credentials).unwrap()
    }

    #[test]
    fn test_invoke_rejects_unknown_operation() {
        let client = test_client();
        let result = client.invoke("Missing", json!({}));
        assert!(matches!(result, Err(SdkError::Schema(_))));
    }

    #[test]
    fn test_invoke_creates_request_for_known_operation() {
        let client = test_client();
        assert!(client.invoke("ListWidgets", json!({})).is_ok());
    }

    #[test]
    fn test_pager_requires_pagination_descriptor() {
        let client = test_client();
        assert!(client.pager("ListPages", json!({})).is_ok());
        assert!(matches!(
            client.pager("ListWidgets", json!({})),
            Err(SdkError::Schema(SchemaError::NotPageable { .. }))
        ));
    }

    #[test]
    fn test_endpoint_resolved_from_region() {
        let client = test_client();
        assert_eq!(
            client.endpoint().as_str(),
            "https://widgets.us-east-1.amazonaws.com/"
        );
    }
}
