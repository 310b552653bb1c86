//! Credentials and asynchronous credential resolution.
//!
//! [`Credentials`] hold an access key pair, an optional session token, and
//! an optional expiry. Consumers must check [`Credentials::expired`] before
//! use when an expiry is set; the check applies a short safety window so a
//! request never goes out signed with keys about to lapse mid-flight.
//!
//! Resolution is asynchronous and pluggable through
//! [`ProvideCredentials`]: a [`StaticProvider`] for fixed keys, a
//! [`CachedProvider`] that refreshes on expiry or explicit invalidation,
//! and a [`ChainProvider`] that tries several sources until one succeeds.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::CredentialsError;

/// Safety window before the declared expiry during which credentials
/// already count as expired.
pub const EXPIRY_WINDOW_SECS: i64 = 15;

/// An access key pair with optional session token and expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Creates static credentials with no session token or expiry.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            expiry: None,
        }
    }

    /// Attaches a session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Attaches an expiry.
    #[must_use]
    pub const fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Returns the access key id.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Returns the secret access key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Returns the session token, if any.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Returns the expiry, if any.
    #[must_use]
    pub const fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// Returns true if an expiry is set and `now` is past it, or within
    /// the safety window before it.
    #[must_use]
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| {
            now + Duration::seconds(EXPIRY_WINDOW_SECS) >= expiry
        })
    }
}

// The secret never appears in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"*****")
            .field("session_token", &self.session_token.as_ref().map(|_| "*****"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Asynchronous credential source.
///
/// `provide` may suspend (e.g. awaiting a token exchange); `invalidate`
/// marks the current credentials unusable so the next `provide` forces a
/// refresh — the retry path calls it after an expired-token error.
#[async_trait]
pub trait ProvideCredentials: Send + Sync + fmt::Debug {
    /// Resolves credentials, refreshing if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError`] when no usable credentials can be
    /// produced.
    async fn provide(&self) -> Result<Credentials, CredentialsError>;

    /// Discards any cached credentials. Default is a no-op.
    fn invalidate(&self) {}
}

/// Provider returning a fixed set of credentials.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    credentials: Credentials,
}

impl StaticProvider {
    /// Wraps fixed credentials in a provider.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl ProvideCredentials for StaticProvider {
    async fn provide(&self) -> Result<Credentials, CredentialsError> {
        Ok(self.credentials.clone())
    }
}

/// Provider that caches another provider's credentials until they expire
/// or are invalidated.
#[derive(Debug)]
pub struct CachedProvider {
    inner: Arc<dyn ProvideCredentials>,
    cache: RwLock<Option<Credentials>>,
}

impl CachedProvider {
    /// Wraps an inner provider with an expiry-aware cache.
    #[must_use]
    pub fn new(inner: Arc<dyn ProvideCredentials>) -> Self {
        Self {
            inner,
            cache: RwLock::new(None),
        }
    }
}

#[async_trait]
impl ProvideCredentials for CachedProvider {
    async fn provide(&self) -> Result<Credentials, CredentialsError> {
        {
            let cached = self.cache.read().await;
            if let Some(credentials) = cached.as_ref() {
                if !credentials.expired(Utc::now()) {
                    return Ok(credentials.clone());
                }
            }
        }

        let fresh = self.inner.provide().await?;
        if fresh.expired(Utc::now()) {
            return Err(CredentialsError::Expired);
        }
        *self.cache.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    fn invalidate(&self) {
        if let Ok(mut cached) = self.cache.try_write() {
            *cached = None;
        }
        self.inner.invalidate();
    }
}

/// Provider chaining several sources, tried in order.
///
/// The first success wins; if every candidate fails the error carries the
/// last failure, distinguishable as "no credentials available".
#[derive(Debug, Default)]
pub struct ChainProvider {
    providers: Vec<Arc<dyn ProvideCredentials>>,
}

impl ChainProvider {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider to the chain.
    #[must_use]
    pub fn push(mut self, provider: Arc<dyn ProvideCredentials>) -> Self {
        self.providers.push(provider);
        self
    }
}

#[async_trait]
impl ProvideCredentials for ChainProvider {
    async fn provide(&self) -> Result<Credentials, CredentialsError> {
        let mut last_error = "the provider chain is empty".to_string();
        for provider in &self.providers {
            match provider.provide().await {
                Ok(credentials) => return Ok(credentials),
                Err(error) => {
                    tracing::debug!(%error, "credential provider failed, trying next");
                    last_error = error.to_string();
                }
            }
        }
        Err(CredentialsError::NoProviders { last_error })
    }

    fn invalidate(&self) {
        for provider in &self.providers {
            provider.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FailingProvider;

    #[async_trait]
    impl ProvideCredentials for FailingProvider {
        async fn provide(&self) -> Result<Credentials, CredentialsError> {
            Err(CredentialsError::ProviderFailure {
                message: "nothing here".to_string(),
            })
        }
    }

    #[test]
    fn test_debug_masks_secret() {
        let credentials = Credentials::new("AKID", "very-secret").with_session_token("token");
        let output = format!("{credentials:?}");
        assert!(!output.contains("very-secret"));
        assert!(!output.contains("token"));
        assert!(output.contains("AKID"));
    }

    #[test]
    fn test_expired_applies_safety_window() {
        let now = Utc::now();
        let credentials = Credentials::new("AKID", "secret")
            .with_expiry(now + Duration::seconds(EXPIRY_WINDOW_SECS - 1));
        assert!(credentials.expired(now));

        let comfortable = Credentials::new("AKID", "secret")
            .with_expiry(now + Duration::seconds(EXPIRY_WINDOW_SECS + 60));
        assert!(!comfortable.expired(now));
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let credentials = Credentials::new("AKID", "secret");
        assert!(!credentials.expired(Utc::now()));
    }

    #[tokio::test]
    async fn test_static_provider_returns_credentials() {
        let provider = StaticProvider::new(Credentials::new("AKID", "secret"));
        let resolved = provider.provide().await.unwrap();
        assert_eq!(resolved.access_key_id(), "AKID");
    }

    #[tokio::test]
    async fn test_chain_returns_first_success() {
        let chain = ChainProvider::new()
            .push(Arc::new(FailingProvider))
            .push(Arc::new(StaticProvider::new(Credentials::new(
                "AKID", "secret",
            ))));
        let resolved = chain.provide().await.unwrap();
        assert_eq!(resolved.access_key_id(), "AKID");
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_distinguishable() {
        let chain = ChainProvider::new().push(Arc::new(FailingProvider));
        let error = chain.provide().await.unwrap_err();
        assert!(matches!(error, CredentialsError::NoProviders { .. }));
    }

    #[tokio::test]
    async fn test_empty_chain_is_no_providers() {
        let chain = ChainProvider::new();
        let error = chain.provide().await.unwrap_err();
        assert!(matches!(error, CredentialsError::NoProviders { .. }));
    }

    #[tokio::test]
    async fn test_cached_provider_serves_from_cache_until_invalidated() {
        #[derive(Debug)]
        struct Counting {
            calls: std::sync::atomic::AtomicU32,
        }

        #[async_trait]
        impl ProvideCredentials for Counting {
            async fn provide(&self) -> Result<Credentials, CredentialsError> {
                let n = self
                    .calls
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(Credentials::new(format!("AKID-{n}"), "secret"))
            }
        }

        let inner = Arc::new(Counting {
            calls: std::sync::atomic::AtomicU32::new(0),
        });
        let cached = CachedProvider::new(inner);

        let first = cached.provide().await.unwrap();
        let second = cached.provide().await.unwrap();
        assert_eq!(first.access_key_id(), second.access_key_id());

        cached.invalidate();
        let third = cached.provide().await.unwrap();
        assert_ne!(first.access_key_id(), third.access_key_id());
    }
}
