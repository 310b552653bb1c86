//! The legacy object-storage path-style signing scheme.
//!
//! The string-to-sign covers the method, content hash/type, date, the
//! canonicalized `x-amz-*` headers, and a canonicalized resource path. The
//! resource accounts for virtual-hosted bucket naming and includes only
//! query parameters from a fixed allow-list — the list is part of the
//! wire-compatibility contract, and any parameter outside it must be
//! excluded so decoy params cannot forge an authorized resource path.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};

use crate::credentials::Credentials;
use crate::transport::WireRequest;

use super::{hmac_sha1, Signer};

/// Query parameters that participate in the canonicalized resource.
///
/// Fixed by the wire protocol; do not edit without a matching server-side
/// change.
pub const SIGNABLE_SUB_RESOURCES: [&str; 24] = [
    "acl",
    "accelerate",
    "analytics",
    "cors",
    "lifecycle",
    "delete",
    "inventory",
    "location",
    "logging",
    "metrics",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "replication",
    "restore",
    "tagging",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

/// Response-override parameters that also participate, value included.
pub const SIGNABLE_RESPONSE_OVERRIDES: [&str; 6] = [
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
    "response-content-language",
    "response-content-type",
    "response-expires",
];

/// Signer for the legacy object-storage scheme.
#[derive(Debug, Default)]
pub struct S3Signer;

impl S3Signer {
    /// Creates the signer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Extracts the bucket from a virtual-hosted host name
    /// (`{bucket}.s3[.-]…`), if the request uses one.
    fn virtual_hosted_bucket(host: &str) -> Option<&str> {
        let mut labels = host.split('.');
        let first = labels.next()?;
        let second = labels.next()?;
        // At least two labels must follow the storage label for the host
        // to be virtual-hosted rather than path-style.
        if labels.count() >= 2 && (second == "s3" || second.starts_with("s3-")) {
            Some(first)
        } else {
            None
        }
    }

    fn canonicalized_amz_headers(request: &WireRequest) -> String {
        // The header map already iterates sorted case-insensitively.
        let mut out = String::new();
        let mut current: Option<(&str, Vec<&str>)> = None;
        for (name, value) in request.headers.iter() {
            if !name.starts_with("x-amz-") {
                continue;
            }
            match &mut current {
                Some((open, values)) if *open == name => values.push(value),
                _ => {
                    if let Some((open, values)) = current.take() {
                        out.push_str(&format!("{open}:{}\n", values.join(",")));
                    }
                    current = Some((name, vec![value]));
                }
            }
        }
        if let Some((open, values)) = current {
            out.push_str(&format!("{open}:{}\n", values.join(",")));
        }
        out
    }

    fn canonicalized_resource(request: &WireRequest) -> String {
        let mut resource = String::new();
        if let Some(bucket) = Self::virtual_hosted_bucket(&request.host) {
            resource.push('/');
            resource.push_str(bucket);
        }
        resource.push_str(&request.path);

        let mut signable: Vec<String> = request
            .query
            .iter()
            .filter(|(name, _)| {
                SIGNABLE_SUB_RESOURCES.contains(&name.as_str())
                    || SIGNABLE_RESPONSE_OVERRIDES.contains(&name.as_str())
            })
            .map(|(name, value)| {
                if value.is_empty() {
                    name.clone()
                } else {
                    format!("{name}={value}")
                }
            })
            .collect();
        signable.sort();
        if !signable.is_empty() {
            resource.push('?');
            resource.push_str(&signable.join("&"));
        }
        resource
    }
}

impl Signer for S3Signer {
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

        let content_md5 = request.headers.get("content-md5").unwrap_or_default().to_string();
        let content_type = request.headers.get("content-type").unwrap_or_default().to_string();

        // The date position is empty because the x-amz-date header carries
        // it inside the canonicalized headers.
        let string_to_sign = format!(
            "{}\n{content_md5}\n{content_type}\n\n{}{}",
            request.method.as_str(),
            Self::canonicalized_amz_headers(request),
            Self::canonicalized_resource(request),
        );

        let digest = hmac_sha1(
            credentials.secret_access_key().as_bytes(),
            string_to_sign.as_bytes(),
        );
        request.headers.set(
            "Authorization",
            format!("AWS {}:{}", credentials.access_key_id(), BASE64.encode(digest)),
        );
    }
}
