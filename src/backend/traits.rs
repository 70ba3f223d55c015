//! Common traits and types for talking to the generation backend

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;

/// Status and body of one HTTP exchange.
///
/// Non-success statuses are returned as values, not errors: a rejection
/// carries the text the negotiation engine classifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl AttemptResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The HTTP operations the negotiator needs.
///
/// Implementations must map unreachable hosts to `AppError::Connection`
/// and deadline overruns to `AppError::Timeout`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body
    async fn post_json(&self, url: &str, body: &Value, timeout: Duration) -> Result<AttemptResponse>;

    /// GET a resource
    async fn get(&self, url: &str, timeout: Duration) -> Result<AttemptResponse>;
}
