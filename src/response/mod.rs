//! Response handling module - image entry classification and decoding

pub mod base64;

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::RemoteAssetFetcher;
use crate::error::{AppError, Result};

/// Bare strings at least this long without a `/` are taken as raw base64
pub const RAW_BASE64_MIN_LEN: usize = 100;

/// Marker found in server-relative image paths
const PATH_MARKER: &str = "View/";

/// An image the caller now owns.
///
/// `origin_url` is set only when the bytes were downloaded from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub origin_url: Option<String>,
}

/// The forms a backend uses for an entry of its `images` list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageEntry {
    /// `data:image/png;base64,...`
    DataUrl(String),
    /// Bare base64 payload
    RawBase64(String),
    /// Server-relative location such as `View/local/raw/x.png`
    ServerPath(String),
    /// Anything else; holds a short preview for diagnostics
    Unrecognized(String),
}

impl ImageEntry {
    pub fn classify(value: &Value) -> Self {
        let Some(s) = value.as_str() else {
            return ImageEntry::Unrecognized(preview(&value.to_string()));
        };

        if s.starts_with("data:") {
            ImageEntry::DataUrl(s.to_string())
        } else if !s.contains('/') && s.len() > RAW_BASE64_MIN_LEN {
            ImageEntry::RawBase64(s.to_string())
        } else if s.contains(PATH_MARKER) || s.starts_with('/') {
            ImageEntry::ServerPath(s.to_string())
        } else {
            ImageEntry::Unrecognized(preview(s))
        }
    }
}

fn preview(s: &str) -> String {
    s.chars().take(100).collect()
}

/// Turns an accepted generation response into image bytes
pub struct ResponseDecoder {
    fetcher: RemoteAssetFetcher,
    server_address: String,
    download_timeout: Duration,
}

impl ResponseDecoder {
    pub fn new(fetcher: RemoteAssetFetcher, server_address: impl Into<String>, download_timeout: Duration) -> Self {
        Self {
            fetcher,
            server_address: server_address.into(),
            download_timeout,
        }
    }

    pub async fn decode(&self, body: &[u8]) -> Result<DecodedImage> {
        let response: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::Format(format!("Response is not JSON: {}", e)))?;

        let first = response
            .get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.first())
            .ok_or(AppError::EmptyResult)?;

        match ImageEntry::classify(first) {
            ImageEntry::DataUrl(data_url) => {
                let bytes = base64::decode_data_url(&data_url)?;
                debug!(size = bytes.len(), "Decoded data URL image");
                Ok(DecodedImage {
                    bytes,
                    origin_url: None,
                })
            }
            ImageEntry::RawBase64(encoded) => {
                let bytes = base64::decode(&encoded)?;
                debug!(size = bytes.len(), "Decoded base64 image");
                Ok(DecodedImage {
                    bytes,
                    origin_url: None,
                })
            }
            ImageEntry::ServerPath(path) => {
                let (bytes, url) = self
                    .fetcher
                    .fetch(&self.server_address, &path, self.download_timeout)
                    .await?;
                Ok(DecodedImage {
                    bytes,
                    origin_url: Some(url),
                })
            }
            ImageEntry::Unrecognized(preview) => {
                warn!(entry = %preview, "Unknown image format");
                Err(AppError::Format(preview))
            }
        }
    }
}
