//! Retry classification and exponential backoff.
//!
//! The policy answers two questions: is this error class retryable at
//! all, and how long to wait before the next attempt. Network errors,
//! throttling codes, expired-credential codes, checksum mismatches, and
//! 5xx responses retry; validation, schema, and abort errors never do.
//! Expired-credential errors additionally invalidate the active
//! credentials so the next attempt forces a refresh (handled by the
//! request loop).

use std::time::Duration;

use crate::config::{ClientConfig, DEFAULT_MAX_RETRIES};
use crate::error::{CredentialsError, SdkError};
use crate::schema::ServiceSchema;

/// Base unit of the exponential backoff.
pub const BASE_DELAY_MS: u64 = 100;

/// Error codes classified as throttling.
const THROTTLING_CODES: [&str; 6] = [
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "RequestThrottled",
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
];

/// Error codes indicating the session token has expired.
const EXPIRED_CREDENTIALS_CODES: [&str; 3] =
    ["ExpiredToken", "ExpiredTokenException", "RequestExpired"];

/// Retry policy for one client, defaults merged at construction.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    /// Merges the configured budget with the service default, falling
    /// back to the global default.
    #[must_use]
    pub fn new(config: &ClientConfig, schema: &ServiceSchema) -> Self {
        Self {
            max_retries: config
                .max_retries()
                .or(schema.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
        }
    }

    /// Creates a policy with a fixed budget.
    #[must_use]
    pub const fn with_max_retries(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Returns the retry budget.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decides whether `error` warrants another attempt after `attempt`
    /// completed tries.
    #[must_use]
    pub fn should_retry(&self, error: &SdkError, attempt: u32) -> bool {
        attempt < self.max_retries && is_retryable(error)
    }

    /// Exponential backoff: `2^attempt` base units.
    #[must_use]
    pub const fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(BASE_DELAY_MS << attempt)
    }
}

/// Classifies an error as retryable or terminal.
#[must_use]
pub fn is_retryable(error: &SdkError) -> bool {
    match error {
        SdkError::Networking { .. } | SdkError::Checksum { .. } => true,
        SdkError::Credentials(CredentialsError::Expired) => true,
        SdkError::Service(service) => {
            service.status >= 500
                || THROTTLING_CODES.contains(&service.code.as_str())
                || EXPIRED_CREDENTIALS_CODES.contains(&service.code.as_str())
        }
        // A 5xx retries even when no structured error body was parseable.
        SdkError::Unknown { status } => *status >= 500,
        _ => false,
    }
}

/// Returns true for errors that must force a credential refresh before
/// the next attempt.
#[must_use]
pub fn forces_credential_refresh(error: &SdkError) -> bool {
    match error {
        SdkError::Credentials(CredentialsError::Expired) => true,
        SdkError::Service(service) => {
            EXPIRED_CREDENTIALS_CODES.contains(&service.code.as_str())
        }
        _ => false,
    }
}
