//! # Nimbus Client
//!
//! A schema-driven client runtime for AWS-compatible HTTP APIs.
//!
//! ## Overview
//!
//! A service is described declaratively — operations, input/output shapes,
//! wire protocol, signing algorithm — and this crate executes logical
//! operation calls against that description. There is no per-service code:
//! the same request pipeline serves every service schema.
//!
//! The pipeline is an explicit finite-state machine:
//! validate → build → sign → send → validate response → extract
//! data-or-error, with retry, redirect, and pagination handling driven by
//! the same schema data. Four wire protocol families are supported
//! (structured JSON, form-encoded query with XML responses, REST with JSON
//! bodies, REST with XML bodies) along with the full strategy set of
//! request signing schemes, including the scoped-date chained-key scheme
//! with per-date key caching and presigned URLs.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nimbus_client::{Client, ClientConfig, Credentials, Region, StaticProvider};
//! use serde_json::json;
//!
//! // A schema is usually loaded from generated definitions.
//! let schema = Arc::new(my_service_schema());
//!
//! let config = ClientConfig::builder()
//!     .region(Region::new("us-east-1")?)
//!     .build()?;
//! let credentials = Arc::new(StaticProvider::new(Credentials::new("AKID", "secret")));
//!
//! let client = Client::new(schema, config, credentials)?;
//! let data = client.invoke("ListQueues", json!({}))?.send().await?;
//! ```
//!
//! ## Pagination
//!
//! ```rust,ignore
//! let mut pager = client.pager("ListObjects", json!({"Bucket": "b"}))?;
//! while let Some(page) = pager.next_page().await {
//!     let data = page?;
//!     // ...
//! }
//! ```
//!
//! ## Presigned URLs
//!
//! ```rust,ignore
//! let url = client
//!     .invoke("GetObject", json!({"Bucket": "b", "Key": "k"}))?
//!     .presign(900)
//!     .await?;
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: configuration is an immutable value passed into
//!   each client construction; defaults merge explicitly.
//! - **Data-driven**: shapes are a closed sum type matched exhaustively;
//!   codecs and signers are strategies selected by the schema.
//! - **Fail-fast validation**: the full parameter tree is checked before
//!   any network activity, and every violation is reported at once.
//! - **Async-first**: credential resolution and transport I/O are the only
//!   suspension points; requests never block a shared thread.
//! - **Thread-safe**: schemas, signing-key caches, and clients are shared
//!   read-only across concurrent requests.

pub mod client;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod schema;
pub mod signer;
pub mod transport;

// Re-export the primary public types at the crate root for convenience
pub use client::{AbortHandle, Client, Pager, Request, RetryPolicy};
pub use config::{ClientConfig, ClientConfigBuilder, Region};
pub use credentials::{
    CachedProvider, ChainProvider, Credentials, ProvideCredentials, StaticProvider,
};
pub use error::{
    ConfigError, CredentialsError, SchemaError, SdkError, ServiceError, ValidationError,
};
pub use schema::{
    HttpMethod, ListShape, Location, MapShape, Member, Operation, Paginator, Protocol,
    SchemaRegistry, ServiceSchema, Shape, ShapeRef, SigningAlgorithm, StructureShape,
    TimestampFormat,
};
pub use signer::{S3Signer, Signer, V2Signer, V3Signer, V4Signer};
pub use transport::{
    Body, Headers, ReqwestTransport, Transport, TransportError, WireRequest, WireResponse,
};
