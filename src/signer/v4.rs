//! The scoped-date chained-key signing scheme (the primary modern scheme).
//!
//! A per-(date, region, service) signing key is derived through four
//! chained keyed hashes seeded from the secret key. Derived keys are
//! cached per (access key, date, region, service) so repeated requests
//! within the same day never recompute the chain; the cache is shared
//! across requests and safe for concurrent reads with last-writer-wins
//! replacement (recomputation is idempotent).

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::credentials::Credentials;
use crate::error::SdkError;
use crate::transport::WireRequest;

use super::{canonical_query, hmac_sha256, sha256_hex, Signer};

/// Algorithm label placed in authorization material.
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Body-hash placeholder used for presigned object-storage URLs.
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Maximum validity window accepted by [`V4Signer::presign`], in seconds
/// (seven days).
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 604_800;

/// Headers never included in the signature.
const UNSIGNABLE_HEADERS: [&str; 3] = ["authorization", "user-agent", "x-amzn-trace-id"];

type KeyCacheId = (String, String, String, String);

/// Signer for the scoped-date chained-key scheme.
#[derive(Debug)]
pub struct V4Signer {
    region: String,
    service: String,
    key_cache: DashMap<KeyCacheId, Vec<u8>>,
}

impl V4Signer {
    /// Creates a signer scoped to a region and service name.
    #[must_use]
    pub fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
            key_cache: DashMap::new(),
        }
    }

    /// Returns the derived signing key for `date` (format `YYYYMMDD`),
    /// computing and caching it on first use.
    #[must_use]
    pub fn signing_key(&self, credentials: &Credentials, date: &str) -> Vec<u8> {
        let id: KeyCacheId = (
            credentials.access_key_id().to_string(),
            date.to_string(),
            self.region.clone(),
            self.service.clone(),
        );
        if let Some(key) = self.key_cache.get(&id) {
            return key.clone();
        }

        let seed = format!("AWS4{}", credentials.secret_access_key());
        let k_date = hmac_sha256(seed.as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        let key = hmac_sha256(&k_service, b"aws4_request");

        self.key_cache.insert(id, key.clone());
        key
    }

    /// Number of derived keys currently cached.
    #[must_use]
    pub fn cached_key_count(&self) -> usize {
        self.key_cache.len()
    }

    fn credential_scope(&self, date: &str) -> String {
        format!("{date}/{}/{}/aws4_request", self.region, self.service)
    }

    fn canonical_headers(request: &WireRequest) -> (String, String) {
        let mut canonical = String::new();
        let mut signed_names: Vec<&str> = Vec::new();
        for (name, value) in request.headers.iter() {
            if UNSIGNABLE_HEADERS.contains(&name) {
                continue;
            }
            canonical.push_str(name);
            canonical.push(':');
            canonical.push_str(value.trim());
            canonical.push('\n');
            if signed_names.last() != Some(&name) {
                signed_names.push(name);
            }
        }
        (canonical, signed_names.join(";"))
    }

    fn signature(
        &self,
        request: &WireRequest,
        credentials: &Credentials,
        datetime: &str,
        date: &str,
        body_hash: &str,
        canonical_headers: &str,
        signed_headers: &str,
    ) -> String {
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method.as_str(),
            request.path,
            canonical_query(&request.query),
            canonical_headers,
            signed_headers,
            body_hash,
        );

        let string_to_sign = format!(
            "{ALGORITHM}\n{datetime}\n{}\n{}",
            self.credential_scope(date),
            sha256_hex(canonical_request.as_bytes()),
        );

        let key = self.signing_key(credentials, date);
        hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()))
    }

    /// Moves all signing material into query parameters, producing a
    /// presigned URL valid for `expires_in_secs`.
    ///
    /// The body hash is the `UNSIGNED-PAYLOAD` placeholder, as required
    /// for presigned object-storage URLs.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::InvalidExpiryTime`] when `expires_in_secs`
    /// exceeds [`MAX_PRESIGN_EXPIRY_SECS`].
    pub fn presign(
        &self,
        request: &mut WireRequest,
        credentials: &Credentials,
        now: DateTime<Utc>,
        expires_in_secs: u64,
    ) -> Result<(), SdkError> {
        if expires_in_secs > MAX_PRESIGN_EXPIRY_SECS {
            return Err(SdkError::InvalidExpiryTime {
                requested: expires_in_secs,
                max: MAX_PRESIGN_EXPIRY_SECS,
            });
        }

        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        request.add_query("X-Amz-Algorithm", ALGORITHM);
        request.add_query(
            "X-Amz-Credential",
            format!(
                "{}/{}",
                credentials.access_key_id(),
                self.credential_scope(&date)
            ),
        );
        request.add_query("X-Amz-Date", datetime.clone());
        request.add_query("X-Amz-Expires", expires_in_secs.to_string());
        request.add_query("X-Amz-SignedHeaders", "host");
        if let Some(token) = credentials.session_token() {
            request.add_query("X-Amz-Security-Token", token);
        }

        let canonical_headers = format!("host:{}\n", request.authority());
        let signature = self.signature(
            request,
            credentials,
            &datetime,
            &date,
            UNSIGNED_PAYLOAD,
            &canonical_headers,
            "host",
        );
        request.add_query("X-Amz-Signature", signature);
        Ok(())
    }
}

impl Signer for V4Signer {
    fn add_authorization(
        &self,
        request: &mut WireRequest,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) {
        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        request.headers.set("X-Amz-Date", datetime.clone());
        if let Some(token) = credentials.session_token() {
            request.headers.set("X-Amz-Security-Token", token);
        }

        let body_hash = sha256_hex(request.body.as_bytes());
        request.headers.set("X-Amz-Content-Sha256", body_hash.clone());

        let (canonical_headers, signed_headers) = Self::canonical_headers(request);
        let signature = self.signature(
            request,
            credentials,
            &datetime,
            &date,
            &body_hash,
            &canonical_headers,
            &signed_headers,
        );

        request.headers.set(
            "Authorization",
            format!(
                "{ALGORITHM} Credential={}/{}, SignedHeaders={signed_headers}, Signature={signature}",
                credentials.access_key_id(),
                self.credential_scope(&date),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::HttpMethod;
    use chrono::TimeZone;
    use url::Url;

    fn test_request() -> WireRequest {
        WireRequest::new(
            HttpMethod::Get,
            &Url::parse("https://svc.us-east-1.amazonaws.com").unwrap(),
        )
    }

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    #[test]
    fn test_derived_key_matches_reference_vector() {
        // Known vector from the scheme's documentation.
        let signer = V4Signer::new("us-east-1", "iam");
        let credentials = Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
        );
        let key = signer.signing_key(&credentials, "20150830");
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_signing_key_is_cached_per_scope() {
        let signer = V4Signer::new("us-east-1", "svc");
        let credentials = Credentials::new("AKID", "secret");

        let first = signer.signing_key(&credentials, "20240101");
        let second = signer.signing_key(&credentials, "20240101");
        assert_eq!(first, second);
        assert_eq!(signer.cached_key_count(), 1);

        // A different date forces recomputation under a new cache entry.
        let _ = signer.signing_key(&credentials, "20240102");
        assert_eq!(signer.cached_key_count(), 2);

        // A different access key does too.
        let other = Credentials::new("AKID2", "secret");
        let _ = signer.signing_key(&other, "20240101");
        assert_eq!(signer.cached_key_count(), 3);
    }

    #[test]
    fn test_derived_key_changes_with_any_scope_input() {
        let credentials = Credentials::new("AKID", "secret");
        let base = V4Signer::new("us-east-1", "svc").signing_key(&credentials, "20240101");

        let other_region = V4Signer::new("eu-west-1", "svc").signing_key(&credentials, "20240101");
        let other_service = V4Signer::new("us-east-1", "other").signing_key(&credentials, "20240101");
        let other_date = V4Signer::new("us-east-1", "svc").signing_key(&credentials, "20240102");
        let other_secret = V4Signer::new("us-east-1", "svc")
            .signing_key(&Credentials::new("AKID", "different"), "20240101");

        assert_ne!(base, other_region);
        assert_ne!(base, other_service);
        assert_ne!(base, other_date);
        assert_ne!(base, other_secret);
    }

    #[test]
    fn test_authorization_header_structure() {
        let signer = V4Signer::new("us-east-1", "svc");
        let credentials = Credentials::new("AKID", "secret").with_session_token("TOKEN");
        let mut request = test_request();

        signer.add_authorization(&mut request, &credentials, test_now());

        let authorization = request.headers.get("authorization").unwrap();
        assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKID/20150830/us-east-1/svc/aws4_request"));
        assert!(authorization.contains("SignedHeaders="));
        assert!(authorization.contains("Signature="));
        assert_eq!(request.headers.get("x-amz-date"), Some("20150830T123600Z"));
        assert_eq!(request.headers.get("x-amz-security-token"), Some("TOKEN"));
    }

    #[test]
    fn test_signed_headers_exclude_unsignable() {
        let signer = V4Signer::new("us-east-1", "svc");
        let credentials = Credentials::new("AKID", "secret");
        let mut request = test_request();
        request.headers.set("User-Agent", "test-agent");

        signer.add_authorization(&mut request, &credentials, test_now());

        let authorization = request.headers.get("authorization").unwrap();
        assert!(!authorization.contains("user-agent"));
    }

    #[test]
    fn test_presign_moves_material_into_query() {
        let signer = V4Signer::new("us-east-1", "s3");
        let credentials = Credentials::new("AKID", "secret");
        let mut request = test_request();
        request.path = "/bucket/key".to_string();

        signer
            .presign(&mut request, &credentials, test_now(), 900)
            .unwrap();

        let url = request.url();
        assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Expires=900"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(!request.headers.contains("authorization"));
    }

    #[test]
    fn test_presign_rejects_expiry_beyond_cap() {
        let signer = V4Signer::new("us-east-1", "s3");
        let credentials = Credentials::new("AKID", "secret");
        let mut request = test_request();

        let result = signer.presign(
            &mut request,
            &credentials,
            test_now(),
            MAX_PRESIGN_EXPIRY_SECS + 1,
        );
        assert!(matches!(result, Err(SdkError::InvalidExpiryTime { .. })));
    }
}
