//! FILENAME: remote-backend/src/transport.rs
//! HTTP seam of the remote backend.
//!
//! The backend only needs "POST JSON" and "GET" with the raw status and body;
//! everything protocol-specific lives above this trait so tests can script
//! server answers without a network.

use async_trait::async_trait;
use backend_spi::BackendError;
use log::{trace, warn};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::config::RemoteBackendConfig;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        TransportResponse {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait AfmTransport: Send + Sync {
    /// POSTs `body` to `path` (relative to the base url).
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<TransportResponse, BackendError>;

    /// GETs `path`, which may already carry a query string.
    async fn get(&self, path: &str) -> Result<TransportResponse, BackendError>;
}

// ============================================================================
// REQWEST TRANSPORT
// ============================================================================

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &RemoteBackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .default_headers(default_headers(config))
            .timeout(config.timeout())
            .build()
            .map_err(|e| BackendError::execution_caused_by("failed to create HTTP client", e))?;

        Ok(HttpTransport {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    async fn finish(response: reqwest::Response) -> Result<TransportResponse, BackendError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::execution_caused_by("failed to read response body", e))?;
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl AfmTransport for HttpTransport {
    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<TransportResponse, BackendError> {
        let url = self.url(path);
        trace!(target: "REMOTE", "POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::execution_caused_by(format!("POST {} failed", url), e))?;
        Self::finish(response).await
    }

    async fn get(&self, path: &str) -> Result<TransportResponse, BackendError> {
        let url = self.url(path);
        trace!(target: "REMOTE", "GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::execution_caused_by(format!("GET {} failed", url), e))?;
        Self::finish(response).await
    }
}

/// Configured headers plus JSON content negotiation. Invalid entries are skipped.
fn default_headers(config: &RemoteBackendConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(target: "REMOTE", "skipping invalid header name={}", name),
        }
    }
    headers
}
