//! SigV4 request signing.
//!
//! The domain's HTTP API authenticates with IAM, so every request carries
//! an `Authorization` header derived from the canonical request. Only the
//! pieces this client sends are modeled: a path, an optional
//! already-canonical query string, an optional content type, and a body.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Identity and scope the signature is computed for.
pub struct SigningParams<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
    pub region: &'a str,
    pub service: &'a str,
}

/// The request pieces that participate in the signature.
pub struct RequestToSign<'a> {
    pub method: &'a str,
    pub host: &'a str,
    /// Absolute path, beginning with `/`.
    pub path: &'a str,
    /// Query string in canonical form (keys sorted, percent-encoded), or
    /// empty when the request has none.
    pub query: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

/// Headers the caller must attach to the outgoing request.
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub security_token: Option<String>,
}

#[allow(clippy::expect_used)] // HMAC-SHA256 accepts keys of any length
fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute the SigV4 headers for `request` at time `when`.
#[must_use]
pub fn sign(params: &SigningParams<'_>, request: &RequestToSign<'_>, when: DateTime<Utc>) -> SignedHeaders {
    let amz_date = when.format("%Y%m%dT%H%M%SZ").to_string();
    let date = when.format("%Y%m%d").to_string();

    // canonical headers, sorted by lowercase name
    let mut headers: Vec<(&str, String)> = Vec::new();
    if let Some(content_type) = request.content_type {
        headers.push(("content-type", content_type.trim().to_string()));
    }
    headers.push(("host", request.host.trim().to_string()));
    headers.push(("x-amz-date", amz_date.clone()));
    if let Some(token) = params.session_token {
        headers.push(("x-amz-security-token", token.trim().to_string()));
    }
    headers.sort_by(|a, b| a.0.cmp(b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers: String = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let payload_hash = sha256_hex(request.body);
    let canonical_request = format!(
        "{}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
        request.method, request.path, request.query,
    );

    let scope = format!("{date}/{}/{}/aws4_request", params.region, params.service);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes()),
    );

    let k_secret = format!("AWS4{}", params.secret_access_key);
    let k_date = hmac(k_secret.as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, params.region.as_bytes());
    let k_service = hmac(&k_region, params.service.as_bytes());
    let k_signing = hmac(&k_service, b"aws4_request");
    let signature = hex::encode(hmac(&k_signing, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        params.access_key_id,
    );

    SignedHeaders {
        authorization,
        amz_date,
        security_token: params.session_token.map(ToString::to_string),
    }
}
