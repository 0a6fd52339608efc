//! Signed HTTP client for the search domain — enables test doubles for
//! the bootstrap sequence.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::engine::Credentials;
use crate::search::sigv4::{self, RequestToSign, SigningParams};

/// Service name the domain's API signs under.
const SERVICE: &str = "es";

/// Status and body of a search-API response.
#[derive(Debug, Clone)]
pub struct EsResponse {
    pub status: u16,
    pub body: String,
}

impl EsResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Abstraction over the domain's HTTP API.
///
/// The production implementation signs every request; test doubles return
/// canned responses.
#[allow(async_fn_in_trait)]
pub trait SearchHttp {
    /// Send `method path` with an optional JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error only on transport failure — HTTP error statuses
    /// come back as an [`EsResponse`] for the caller to interpret.
    async fn send(&self, method: &str, path: &str, body: Option<&serde_json::Value>)
    -> Result<EsResponse>;
}

/// Production client — reqwest with SigV4-signed requests.
pub struct SignedClient {
    host: String,
    region: String,
    credentials: Credentials,
    http: reqwest::Client,
}

impl SignedClient {
    /// Create a client for `endpoint` (scheme prefix tolerated and stripped).
    #[must_use]
    pub fn new(endpoint: &str, region: impl Into<String>, credentials: Credentials) -> Self {
        let host = endpoint
            .strip_prefix("https://")
            .or_else(|| endpoint.strip_prefix("http://"))
            .unwrap_or(endpoint)
            .trim_end_matches('/')
            .to_string();
        Self {
            host,
            region: region.into(),
            credentials,
            http: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl SearchHttp for SignedClient {
    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<EsResponse> {
        let payload = match body {
            Some(value) => serde_json::to_vec(value).context("serializing request body")?,
            None => Vec::new(),
        };

        let params = SigningParams {
            access_key_id: &self.credentials.access_key_id,
            secret_access_key: &self.credentials.secret_access_key,
            session_token: self.credentials.session_token.as_deref(),
            region: &self.region,
            service: SERVICE,
        };
        let request = RequestToSign {
            method,
            host: &self.host,
            path,
            query: "",
            content_type: Some("application/json"),
            body: &payload,
        };
        let signed = sigv4::sign(&params, &request, Utc::now());

        let url = format!("https://{}{path}", self.host);
        let http_method = reqwest::Method::from_bytes(method.as_bytes())
            .with_context(|| format!("invalid HTTP method {method}"))?;

        let mut builder = self
            .http
            .request(http_method, &url)
            .header("content-type", "application/json")
            .header("x-amz-date", &signed.amz_date)
            .header("authorization", &signed.authorization);
        if let Some(token) = &signed.security_token {
            builder = builder.header("x-amz-security-token", token);
        }
        if !payload.is_empty() {
            builder = builder.body(payload);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("sending {method} {url}"))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading response of {method} {url}"))?;
        Ok(EsResponse { status, body })
    }
}
