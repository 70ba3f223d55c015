//! HTTP transport implementation

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::backend::traits::{AttemptResponse, Transport};
use crate::error::{AppError, Result};

/// reqwest-backed transport. Timeouts are applied per request so
/// generation calls and metadata calls can use different deadlines.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Check whether the server answers at all.
    ///
    /// Any HTTP response counts as reachable; only transport failures do not.
    pub async fn health_check(&self, url: &str, timeout: Duration) -> bool {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => {
                debug!(url = %url, status = %response.status(), "Health check reached server");
                true
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Health check failed");
                false
            }
        }
    }

    async fn read(url: &str, response: reqwest::Response) -> Result<AttemptResponse> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::from_transport(url, e))?;
        Ok(AttemptResponse::new(status, body.to_vec()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<AttemptResponse> {
        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::from_transport(url, e))?;

        Self::read(url, response).await
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<AttemptResponse> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AppError::from_transport(url, e))?;

        Self::read(url, response).await
    }
}
