//! Session acquisition

use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::traits::Transport;
use crate::error::{AppError, Result};
use crate::negotiation::endpoints::join_route;

/// Short-lived token required by every generation call.
///
/// Owned by exactly one generation call and dropped with it.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Session").field(&abbreviate(&self.token)).finish()
    }
}

fn abbreviate(token: &str) -> String {
    let prefix: String = token.chars().take(16).collect();
    if prefix.len() < token.len() {
        format!("{}...", prefix)
    } else {
        prefix
    }
}

/// Obtains sessions. No retries: a failure here ends the generation call.
pub struct SessionAcquirer {
    transport: Arc<dyn Transport>,
    route: String,
}

impl SessionAcquirer {
    pub fn new(transport: Arc<dyn Transport>, route: impl Into<String>) -> Self {
        Self {
            transport,
            route: route.into(),
        }
    }

    pub async fn acquire(&self, server_address: &str, timeout: Duration) -> Result<Session> {
        let url = join_route(server_address, &self.route);
        debug!(url = %url, "Requesting session");

        let response = self
            .transport
            .post_json(&url, &json!({}), timeout)
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Session request failed");
                e
            })?;

        if !response.is_success() {
            return Err(AppError::Protocol(format!(
                "Session request returned {}: {}",
                response.status,
                response.text()
            )));
        }

        let body: Value = serde_json::from_slice(&response.body).map_err(|e| {
            AppError::Protocol(format!("Session response is not JSON: {}", e))
        })?;

        let token = body
            .get("session_id")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::Protocol(format!("No session_id in response: {}", body))
            })?;

        let session = Session::new(token);
        debug!(session = ?session, "Acquired session");
        Ok(session)
    }
}
