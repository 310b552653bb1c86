//! Error types for the client runtime.
//!
//! This module defines the crate-wide error taxonomy. Local failures
//! (configuration, schema resolution, parameter validation) are reported
//! before any network activity; everything else flows through the retry
//! policy once and then surfaces as the terminal error of the call.
//!
//! # Error Handling
//!
//! The caller of [`Request::send`](crate::client::Request::send) always
//! receives either decoded typed data or exactly one [`SdkError`] carrying a
//! stable [`code`](SdkError::code) and a human-readable message.
//!
//! # Example
//!
//! ```rust
//! use nimbus_client::error::{SdkError, ValidationError};
//!
//! let err = SdkError::from(ValidationError::MissingRequiredParameter {
//!     path: "Name".to_string(),
//! });
//! assert_eq!(err.code(), "MissingRequiredParameter");
//! ```

use std::fmt;

use thiserror::Error;

/// Errors that can occur during client configuration.
///
/// All configuration constructors return `Result<T, ConfigError>` to enable
/// fail-fast validation. Error messages are designed to be clear and
/// actionable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Region identifier is empty or malformed.
    #[error("Invalid region '{region}'. Expected a lowercase identifier such as 'us-east-1'.")]
    InvalidRegion {
        /// The invalid region that was provided.
        region: String,
    },

    /// Endpoint override could not be parsed as a URL.
    #[error("Invalid endpoint URL '{url}'. Please provide a valid URL with scheme (e.g., 'https://api.example.com').")]
    InvalidEndpointUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },
}

/// A defect in the loaded service schema.
///
/// Schema errors indicate a programming or configuration mistake (for
/// example an operation member referencing a shape that was never
/// registered). They are fatal: the retry policy never sees them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A shape reference could not be resolved against the registry.
    #[error("Unknown shape reference '{name}'.")]
    UnknownShape {
        /// The unresolved reference name.
        name: String,
    },

    /// The named operation does not exist in the service schema.
    #[error("Unknown operation '{name}'.")]
    UnknownOperation {
        /// The unresolved operation name.
        name: String,
    },

    /// An operation was asked to paginate but declares no descriptor.
    #[error("Operation '{operation}' has no pagination descriptor.")]
    NotPageable {
        /// The operation that was asked to paginate.
        operation: String,
    },
}

/// A single parameter-validation violation.
///
/// The validator walks the full parameter tree and collects every violation
/// it finds; the `Multiple` variant reports them all at once when more than
/// one was found.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required member is absent or null.
    #[error("Missing required parameter '{path}'.")]
    MissingRequiredParameter {
        /// Dotted path of the missing member (e.g. `Config.Name`).
        path: String,
    },

    /// A key was supplied that is not declared on the structure.
    #[error("Unexpected parameter '{path}'. Structures are closed; remove the key or fix its spelling.")]
    UnexpectedParameter {
        /// Dotted path of the undeclared key.
        path: String,
    },

    /// A value failed its scalar kind's acceptance test.
    #[error("Invalid type for parameter '{path}': expected {expected}.")]
    InvalidParameterType {
        /// Dotted path of the offending value.
        path: String,
        /// Human-readable expected kind (e.g. "string", "list of string").
        expected: String,
    },

    /// More than one violation was found; lists every one of them.
    #[error("{0}")]
    Multiple(MultipleValidationErrors),
}

impl ValidationError {
    /// Returns the stable error code for this violation.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingRequiredParameter { .. } => "MissingRequiredParameter",
            Self::UnexpectedParameter { .. } => "UnexpectedParameter",
            Self::InvalidParameterType { .. } => "InvalidParameterType",
            Self::Multiple(_) => "MultipleValidationErrors",
        }
    }
}

/// Aggregate of every violation found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleValidationErrors {
    /// The individual violations, in discovery order.
    pub errors: Vec<ValidationError>,
}

impl fmt::Display for MultipleValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "There were {} validation errors:", self.errors.len())?;
        for error in &self.errors {
            writeln!(f, "* {error}")?;
        }
        Ok(())
    }
}

/// Errors that can occur while resolving credentials.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    /// No provider in the chain produced credentials.
    #[error("No credentials available: every provider in the chain failed. Last error: {last_error}")]
    NoProviders {
        /// The message from the last provider tried.
        last_error: String,
    },

    /// A single provider failed to produce credentials.
    #[error("Could not load credentials: {message}")]
    ProviderFailure {
        /// Provider-specific failure description.
        message: String,
    },

    /// Credentials resolved but are past their expiry.
    #[error("Credentials have expired and the provider could not refresh them.")]
    Expired,
}

/// An error decoded from a service response.
///
/// Carries the wire-level error `code` and `message` extracted by the
/// protocol codec, plus the HTTP status and the request id header when the
/// service sent one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ServiceError {
    /// Stable error code from the response (e.g. `Throttling`).
    pub code: String,
    /// Human-readable message from the response.
    pub message: String,
    /// HTTP status of the response.
    pub status: u16,
    /// Request id for support reference, if the service sent one.
    pub request_id: Option<String>,
}

/// Unified error type for all operation failures.
///
/// Use pattern matching to handle specific classes, or [`SdkError::code`]
/// when only the stable code is needed.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Parameter validation failed before any I/O.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Client configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The service schema is defective.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Credentials could not be resolved or refreshed.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// The transport failed before a response was received.
    #[error("Networking error: {message}")]
    Networking {
        /// Transport-level failure description.
        message: String,
    },

    /// The service returned a decoded error response.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The response body failed its integrity check.
    #[error("Response checksum mismatch: expected {expected}, computed {computed}.")]
    Checksum {
        /// Checksum declared by the service.
        expected: u32,
        /// Checksum computed over the received body.
        computed: u32,
    },

    /// The caller aborted the request.
    #[error("Request aborted by user.")]
    Aborted,

    /// The response did not satisfy the protocol's success predicate and no
    /// structured error body was parseable.
    #[error("Unknown error: the service returned status {status} with no parseable error body.")]
    Unknown {
        /// HTTP status of the unparseable response.
        status: u16,
    },

    /// A presigned URL was requested with an expiration beyond the cap.
    #[error("Presigning does not support expiry longer than {max} seconds (got {requested}).")]
    InvalidExpiryTime {
        /// The requested validity window in seconds.
        requested: u64,
        /// The fixed maximum in seconds.
        max: u64,
    },
}

impl SdkError {
    /// Returns the stable error code for this error.
    ///
    /// Service errors return the wire-level code the service sent; local
    /// errors return a fixed per-class code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Validation(e) => e.code(),
            Self::Config(_) => "ConfigError",
            Self::Schema(_) => "SchemaError",
            Self::Credentials(CredentialsError::Expired) => "ExpiredCredentials",
            Self::Credentials(_) => "CredentialsError",
            Self::Networking { .. } => "NetworkingError",
            Self::Service(e) => &e.code,
            Self::Checksum { .. } => "ChecksumError",
            Self::Aborted => "RequestAbortedError",
            Self::Unknown { .. } => "UnknownError",
            Self::InvalidExpiryTime { .. } => "InvalidExpiryTime",
        }
    }
}
