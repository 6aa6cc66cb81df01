//! Fetch gateway: the single seam between the sync layer and the backend API.
//!
//! Every store, controller and coordinator talks to the backend through
//! [`FetchGateway`]. The gateway classifies failures but never interprets
//! payload schemas; that is the consumer's job.

mod config;
mod parser;
mod request;

pub use config::ApiConfig;
pub use parser::{classify_status, parse_detail};
pub use request::{ApiRequest, ApiResponse};

use crate::error::SyncError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Uniform async request function wrapping the remote API.
#[async_trait]
pub trait FetchGateway: Send + Sync {
    /// Issue one request; returns the payload or a classified failure.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SyncError>;
}

/// Send a request and decode the payload into `T`.
pub async fn fetch_json<T: DeserializeOwned>(
    gateway: &dyn FetchGateway,
    request: ApiRequest,
) -> Result<T, SyncError> {
    gateway.send(request).await?.json()
}

/// Gateway backed by a pooled reqwest client.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout_seconds: u64,
}

impl HttpGateway {
    /// Build a gateway from API configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, SyncError> {
        let mut builder = reqwest::Client::builder();
        if config.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_seconds));
        }
        let client = builder
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Create a gateway with a custom HTTP client (for testing).
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            timeout_seconds: 0,
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Classify reqwest error into SyncError.
    fn classify_error(e: reqwest::Error, timeout_seconds: u64) -> SyncError {
        if e.is_timeout() {
            SyncError::Timeout(timeout_seconds)
        } else {
            SyncError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl FetchGateway for HttpGateway {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SyncError> {
        let url = self.url_for(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        tracing::trace!(method = %request.method, url = %url, "Sending API request");

        let response = builder
            .send()
            .await
            .map_err(|e| Self::classify_error(e, self.timeout_seconds))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::classify_error(e, self.timeout_seconds))?;

        if !(200..300).contains(&status) {
            let error = classify_status(status, &body);
            tracing::debug!(
                method = %request.method,
                path = %request.path,
                status,
                error = %error,
                "API request failed"
            );
            return Err(error);
        }

        let data = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::String(body))
        };

        Ok(ApiResponse { status, data })
    }
}
