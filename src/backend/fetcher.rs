//! Retrieval of images the backend returns by reference

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::traits::Transport;
use crate::error::{AppError, Result};

/// Downloads server-relative image paths such as
/// `View/local/raw/2024-05-19/image.png`.
pub struct RemoteAssetFetcher {
    transport: Arc<dyn Transport>,
}

impl RemoteAssetFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Returns the body and the exact URL it was fetched from.
    pub async fn fetch(
        &self,
        server_address: &str,
        relative_path: &str,
        timeout: Duration,
    ) -> Result<(Vec<u8>, String)> {
        let url = format!("{}/{}", server_address, relative_path);
        debug!(url = %url, "Downloading image");

        let response = self.transport.get(&url, timeout).await.map_err(|e| {
            warn!(url = %url, error = %e, "Image download failed");
            AppError::Download(format!("{}: {}", url, e))
        })?;

        if !response.is_success() {
            warn!(url = %url, status = response.status, "Image download rejected");
            return Err(AppError::Download(format!(
                "{} returned {}",
                url, response.status
            )));
        }

        debug!(url = %url, size = response.body.len(), "Downloaded image");
        Ok((response.body, url))
    }
}
