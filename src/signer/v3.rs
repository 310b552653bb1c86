//! The legacy header-HMAC schemes.
//!
//! The full variant signs a canonical concatenation of method, selected
//! headers, and a body hash. The HTTPS-only variant signs nothing but the
//! timestamp header — body integrity is assumed from the encrypted
//! transport.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::credentials::Credentials;
use crate::transport::WireRequest;

use super::{hmac_sha256, Signer};

/// Signer for the header-HMAC schemes.
#[derive(Debug)]
pub struct V3Signer {
    https_only: bool,
}

impl V3Signer {
    /// Creates the signer; `https_only` selects the timestamp-only
    /// variant.
    #[must_use]
    pub const fn new(https_only: bool) -> Self {
        Self { https_only }
    }

    /// Headers participating in the full-variant signature: the host
    /// header plus every extension header, sorted by the header map.
    fn signed_header_names(request: &WireRequest) -> Vec<String> {
        request
            .headers
            .iter()
            .map(|(name, _)| name)
            .filter(|name| *name == "host" || name.starts_with("x-amz"))
            .map(ToString::to_string)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Signer for V3Signer {
    fn add_authorization(
        &self,
        request: &mut WireRequest,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) {
        let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        request.headers.set("X-Amz-Date", date.clone());
        if let Some(token) = credentials.session_token() {
            request.headers.set("X-Amz-Security-Token", token);
        }

        if self.https_only {
            let digest = hmac_sha256(
                credentials.secret_access_key().as_bytes(),
                date.as_bytes(),
            );
            request.headers.set(
                "X-Amzn-Authorization",
                format!(
                    "AWS3-HTTPS AWSAccessKeyId={},Algorithm=HmacSHA256,Signature={}",
                    credentials.access_key_id(),
                    BASE64.encode(digest),
                ),
            );
            return;
        }

        let signed_names = Self::signed_header_names(request);
        let canonical_headers: String = signed_names
            .iter()
            .map(|name| {
                format!(
                    "{name}:{}\n",
                    request.headers.get_all(name).join(",").trim()
                )
            })
            .collect();

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}\n{}",
            request.method.as_str(),
            request.path,
            request.query_string(),
            canonical_headers,
            String::from_utf8_lossy(request.body.as_bytes()),
        );

        let digest = hmac_sha256(
            credentials.secret_access_key().as_bytes(),
            &Sha256::digest(string_to_sign.as_bytes()),
        );
        request.headers.set(
            "X-Amzn-Authorization",
            format!(
                "AWS3 AWSAccessKeyId={},Algorithm=HmacSHA256,SignedHeaders={},Signature={}",
                credentials.access_key_id(),
                signed_names.join(";"),
                BASE64.encode(digest),
            ),
        );
    }
}
