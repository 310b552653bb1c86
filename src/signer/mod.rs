//! Request authentication strategies.
//!
//! Each service schema declares one [`SigningAlgorithm`]; the matching
//! [`Signer`] computes authentication material from credentials and the
//! built wire request. Signers are purely side-effecting: they mutate
//! request headers (or, for presigned URLs, the query string) and never
//! return a value.
//!
//! The strategy set:
//!
//! - [`V2Signer`]: query-signature scheme over method/host/path/params
//! - [`V3Signer`]: header HMAC schemes (full and HTTPS-only variants)
//! - [`S3Signer`]: legacy object-storage path-style scheme
//! - [`V4Signer`]: scoped-date chained-key scheme, the primary modern one

mod s3;
mod v2;
mod v3;
mod v4;

pub use s3::S3Signer;
pub use v2::V2Signer;
pub use v3::V3Signer;
pub use v4::{V4Signer, MAX_PRESIGN_EXPIRY_SECS};

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::credentials::Credentials;
use crate::schema::SigningAlgorithm;
use crate::transport::WireRequest;

/// A strategy computing request authentication material.
///
/// Implementations mutate the request in place and must be cheap to call
/// repeatedly: one invocation per attempt, including retries.
pub trait Signer: Send + Sync + fmt::Debug {
    /// Adds authentication headers (or query parameters) to the request.
    ///
    /// `now` is injected so a clock-skew correction can be applied by the
    /// caller; signers never read the system clock themselves.
    fn add_authorization(
        &self,
        request: &mut WireRequest,
        credentials: &Credentials,
        now: DateTime<Utc>,
    );
}

/// Creates the signer for a declared algorithm.
///
/// `region` and `service` feed the scoped-key derivation of the modern
/// scheme; the legacy schemes ignore them.
#[must_use]
pub fn create(
    algorithm: SigningAlgorithm,
    region: impl Into<String>,
    service: impl Into<String>,
) -> Arc<dyn Signer> {
    match algorithm {
        SigningAlgorithm::V2 => Arc::new(V2Signer::new()),
        SigningAlgorithm::V3 => Arc::new(V3Signer::new(false)),
        SigningAlgorithm::V3Https => Arc::new(V3Signer::new(true)),
        SigningAlgorithm::S3 => Arc::new(S3Signer::new()),
        SigningAlgorithm::V4 => Arc::new(V4Signer::new(region, service)),
    }
}

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

/// HMAC-SHA256 of `data` under `key`.
#[allow(clippy::missing_panics_doc)] // HMAC accepts any key size, so this never panics
#[must_use]
pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// HMAC-SHA1 of `data` under `key` (legacy object-storage scheme only).
#[allow(clippy::missing_panics_doc)] // HMAC accepts any key size, so this never panics
#[must_use]
pub(crate) fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Lowercase hex SHA-256 of `data`.
#[must_use]
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Percent-encodes per the signing rules: everything but unreserved
/// characters, with `/` optionally preserved for greedy path segments.
#[must_use]
pub(crate) fn uri_encode(text: &str, encode_slash: bool) -> String {
    let encoded = urlencoding::encode(text).into_owned();
    if encode_slash {
        encoded
    } else {
        encoded.replace("%2F", "/")
    }
}

/// Sorts query pairs bytewise by name then value and joins them encoded,
/// the canonical form shared by the query-signature and scoped-date
/// schemes.
#[must_use]
pub(crate) fn canonical_query(pairs: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = pairs
        .iter()
        .map(|(name, value)| (uri_encode(name, true), uri_encode(value, true)))
        .collect();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha256_known_vector() {
        // RFC 4231 test case 2.
        let out = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(out),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_sha256_hex_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_uri_encode_escapes_slash_unless_greedy() {
        assert_eq!(uri_encode("a/b c", true), "a%2Fb%20c");
        assert_eq!(uri_encode("a/b c", false), "a/b%20c");
    }

    #[test]
    fn test_uri_encode_preserves_unreserved() {
        assert_eq!(uri_encode("AZaz09-_.~", true), "AZaz09-_.~");
    }

    #[test]
    fn test_canonical_query_sorts_pairs() {
        let pairs = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
            ("a".to_string(), "0".to_string()),
        ];
        assert_eq!(canonical_query(&pairs), "a=0&a=1&b=2");
    }

    #[test]
    fn test_factory_selects_by_algorithm() {
        let signer = create(SigningAlgorithm::V4, "us-east-1", "svc");
        assert!(format!("{signer:?}").contains("V4Signer"));
        let signer = create(SigningAlgorithm::S3, "us-east-1", "svc");
        assert!(format!("{signer:?}").contains("S3Signer"));
    }
}
