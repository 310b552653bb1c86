//! Endpoint resolution: service identifier + region to host/scheme.
//!
//! A static rule table, consulted once per client: global-only services
//! pin to a fixed host with no region label, China-partition regions use
//! the alternate domain suffix, and a handful of legacy (service, region)
//! pairs override the schema's declared signing algorithm. A configured
//! endpoint override bypasses the table entirely.

use url::Url;

use crate::config::{ClientConfig, Region};
use crate::error::ConfigError;
use crate::schema::{ServiceSchema, SigningAlgorithm};

/// Default domain suffix for endpoint construction.
pub const DEFAULT_DOMAIN_SUFFIX: &str = "amazonaws.com";

/// Domain suffix for the China partition (`cn-*` regions).
pub const CHINA_DOMAIN_SUFFIX: &str = "amazonaws.com.cn";

/// Endpoint prefixes of services that exist only in the global partition;
/// their hosts carry no region label.
const GLOBAL_SERVICES: [&str; 5] = ["cloudfront", "iam", "importexport", "route53", "sts"];

/// Legacy (endpoint prefix, region) pairs whose signing algorithm differs
/// from the schema's declaration.
const LEGACY_SIGNING: [(&str, &str, SigningAlgorithm); 2] = [
    ("sdb", "us-east-1", SigningAlgorithm::V2),
    ("importexport", "us-east-1", SigningAlgorithm::V2),
];

/// Resolves the endpoint URL for a service in a region.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEndpointUrl`] if the constructed URL does
/// not parse, which indicates a malformed endpoint prefix in the schema.
pub fn resolve(schema: &ServiceSchema, config: &ClientConfig) -> Result<Url, ConfigError> {
    if let Some(endpoint) = config.endpoint() {
        return Ok(endpoint.clone());
    }

    let prefix = &schema.endpoint_prefix;
    let region = config.region();
    let host = if GLOBAL_SERVICES.contains(&prefix.as_str()) {
        format!("{prefix}.{DEFAULT_DOMAIN_SUFFIX}")
    } else if region.is_china() {
        format!("{prefix}.{region}.{CHINA_DOMAIN_SUFFIX}")
    } else {
        format!("{prefix}.{region}.{DEFAULT_DOMAIN_SUFFIX}")
    };

    let raw = format!("https://{host}");
    Url::parse(&raw).map_err(|_| ConfigError::InvalidEndpointUrl { url: raw })
}

/// Returns the signing algorithm effective for a service in a region.
///
/// The China partition requires the modern scheme everywhere; a few
/// legacy (service, region) pairs override the schema; otherwise the
/// schema's declaration wins.
#[must_use]
pub fn signing_algorithm(schema: &ServiceSchema, region: &Region) -> SigningAlgorithm {
    if region.is_china() {
        return SigningAlgorithm::V4;
    }
    LEGACY_SIGNING
        .iter()
        .find(|(prefix, legacy_region, _)| {
            *prefix == schema.endpoint_prefix && *legacy_region == region.as_ref()
        })
        .map_or(schema.signing, |(_, _, algorithm)| *algorithm)
}
