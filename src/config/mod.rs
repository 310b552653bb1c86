//! Configuration types for the client runtime.
//!
//! This module provides the immutable configuration passed into each client
//! construction. There is no global mutable state: every client owns a
//! [`ClientConfig`] value and "apply default if unset" behavior is an
//! explicit merge performed by the builder and the retry policy.
//!
//! # Overview
//!
//! - [`ClientConfig`]: the main configuration struct
//! - [`ClientConfigBuilder`]: builder for constructing [`ClientConfig`]
//! - [`Region`]: a validated region identifier newtype
//!
//! # Example
//!
//! ```rust
//! use nimbus_client::{ClientConfig, Region};
//!
//! let config = ClientConfig::builder()
//!     .region(Region::new("us-east-1").unwrap())
//!     .max_retries(5)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.region().as_ref(), "us-east-1");
//! ```

mod newtypes;

pub use newtypes::Region;

use url::Url;

use crate::error::ConfigError;

/// Global default for the retry budget when neither the config nor the
/// service schema declares one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Maximum number of redirect-retries followed per request.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Immutable configuration for a service client.
///
/// `ClientConfig` is `Clone`, `Send`, and `Sync`, making it safe to share
/// across threads and async tasks. Values are validated at build time;
/// after `build()` succeeds the configuration can no longer be invalid.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    region: Region,
    endpoint: Option<Url>,
    max_retries: Option<u32>,
    max_redirects: u32,
    clock_offset_secs: i64,
    user_agent_prefix: Option<String>,
}

impl ClientConfig {
    /// Creates a new builder for constructing a `ClientConfig`.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the region this client is bound to.
    #[must_use]
    pub const fn region(&self) -> &Region {
        &self.region
    }

    /// Returns the endpoint override, if configured.
    ///
    /// When set, the endpoint resolver is bypassed entirely.
    #[must_use]
    pub const fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// Returns the configured retry budget, if any.
    ///
    /// `None` means "use the service default, else the global default";
    /// the merge happens in [`RetryPolicy`](crate::client::RetryPolicy).
    #[must_use]
    pub const fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Returns the redirect budget.
    #[must_use]
    pub const fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Returns the clock correction applied to signing timestamps, in
    /// seconds.
    ///
    /// Positive values move the signing clock forward. Used to compensate
    /// for local clock skew detected against the service.
    #[must_use]
    pub const fn clock_offset_secs(&self) -> i64 {
        self.clock_offset_secs
    }

    /// Returns the User-Agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }
}

/// Builder for [`ClientConfig`] instances.
///
/// Only `region` is required; every other field has an explicit default
/// merged in by [`build`](Self::build).
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    region: Option<Region>,
    endpoint: Option<String>,
    max_retries: Option<u32>,
    max_redirects: Option<u32>,
    clock_offset_secs: Option<i64>,
    user_agent_prefix: Option<String>,
}

impl ClientConfigBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Sets the region the client is bound to. Required.
    #[must_use]
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Sets a fixed endpoint, bypassing the endpoint resolver.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the retry budget for this client.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the redirect budget for this client.
    #[must_use]
    pub const fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = Some(max_redirects);
        self
    }

    /// Sets the clock correction applied to signing timestamps, in seconds.
    #[must_use]
    pub const fn clock_offset_secs(mut self, offset: i64) -> Self {
        self.clock_offset_secs = Some(offset);
        self
    }

    /// Sets a prefix prepended to the User-Agent header.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Builds the [`ClientConfig`], validating all fields and merging
    /// defaults for the unset ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `region` was never
    /// set, or [`ConfigError::InvalidEndpointUrl`] if the endpoint override
    /// does not parse as an absolute URL.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let region = self
            .region
            .ok_or(ConfigError::MissingRequiredField { field: "region" })?;

        let endpoint = self
            .endpoint
            .map(|raw| {
                Url::parse(&raw).map_err(|_| ConfigError::InvalidEndpointUrl { url: raw })
            })
            .transpose()?;

        Ok(ClientConfig {
            region,
            endpoint,
            max_retries: self.max_retries,
            max_redirects: self.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS),
            clock_offset_secs: self.clock_offset_secs.unwrap_or(0),
            user_agent_prefix: self.user_agent_prefix,
        })
    }
}

// Verify config types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ClientConfig>();
    assert_send_sync::<Region>();
};
