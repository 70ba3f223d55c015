//! Local file storage for generated images

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::sink::{ImageAttachment, ImageSink};

/// Writes each attachment next to its record name: `<record>.<ext>` for
/// bytes, `<record>.url` holding the origin URL otherwise.
pub struct FileSink {
    storage_path: PathBuf,
}

impl FileSink {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
        }
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Ensure the storage directory exists
    pub async fn ensure_storage_dir(&self) -> Result<()> {
        if !self.storage_path.exists() {
            fs::create_dir_all(&self.storage_path).await?;
            debug!(path = ?self.storage_path, "Created storage directory");
        }
        Ok(())
    }

    async fn write(&self, filename: String, data: &[u8]) -> Result<String> {
        self.ensure_storage_dir().await?;

        let file_path = self.storage_path.join(filename);
        fs::write(&file_path, data).await?;

        debug!(path = ?file_path, size = data.len(), "Saved attachment");
        Ok(file_path.to_string_lossy().to_string())
    }
}

#[async_trait]
impl ImageSink for FileSink {
    async fn attach(&self, record: &str, attachment: &ImageAttachment) -> Result<String> {
        let record = sanitize_record(record)?;
        match attachment {
            ImageAttachment::Bytes(data) => {
                let format = detect_image_format(data).unwrap_or("png");
                self.write(format!("{}.{}", record, format), data).await
            }
            ImageAttachment::Url(url) => {
                self.write(format!("{}.url", record), url.as_bytes()).await
            }
        }
    }
}

/// Record names become file names, so path separators are not allowed
fn sanitize_record(record: &str) -> Result<String> {
    let cleaned: String = record
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(AppError::InvalidRequest(format!(
            "Unusable record name: {:?}",
            record
        )));
    }
    Ok(cleaned)
}

/// Detect image format from binary data using magic bytes
pub fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.len() < 8 {
        return None;
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }

    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("gif");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("webp");
    }

    None
}
