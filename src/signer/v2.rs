//! The query-signature scheme.
//!
//! Authentication material travels entirely in query parameters: the
//! signer appends identity and algorithm parameters, then a keyed-hash
//! signature over `method\nhost\npath\nsorted-params`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};

use crate::credentials::Credentials;
use crate::transport::WireRequest;

use super::{canonical_query, hmac_sha256, Signer};

/// Signer for the query-signature scheme.
#[derive(Debug, Default)]
pub struct V2Signer;

impl V2Signer {
    /// Creates the signer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Signer for V2Signer {
    fn add_authorization(
        &self,
        request: &mut WireRequest,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) {
        request.add_query("AWSAccessKeyId", credentials.access_key_id());
        request.add_query("SignatureVersion", "2");
        request.add_query("SignatureMethod", "HmacSHA256");
        request.add_query("Timestamp", now.format("%Y-%m-%dT%H:%M:%SZ").to_string());
        if let Some(token) = credentials.session_token() {
            request.add_query("SecurityToken", token);
        }

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            request.method.as_str(),
            request.authority().to_lowercase(),
            request.path,
            canonical_query(&request.query),
        );

        let digest = hmac_sha256(
            credentials.secret_access_key().as_bytes(),
            string_to_sign.as_bytes(),
        );
        request.add_query("Signature", BASE64.encode(digest));
    }
}
