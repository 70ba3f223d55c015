//! Destination store boundary - where generated images end up

pub mod file;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::payload::{StyleAdapter, StyleRequest};
use crate::response::DecodedImage;

pub use file::FileSink;

/// What gets attached to a destination record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageAttachment {
    Bytes(Vec<u8>),
    Url(String),
}

impl ImageAttachment {
    /// Attach by URL only when asked to and the image was downloaded from
    /// the server; otherwise attach the bytes.
    pub fn from_image(image: DecodedImage, prefer_url: bool) -> Self {
        match image.origin_url {
            Some(url) if prefer_url => ImageAttachment::Url(url),
            _ => ImageAttachment::Bytes(image.bytes),
        }
    }
}

/// A store that can attach an image to a named record
#[async_trait]
pub trait ImageSink: Send + Sync {
    /// Returns a locator for the stored attachment
    async fn attach(&self, record: &str, attachment: &ImageAttachment) -> Result<String>;
}

/// Structured post produced by the content collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub post_type: String,
}

impl PostDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            post_type: String::new(),
        }
    }

    pub fn to_request(&self, adapters: Vec<StyleAdapter>) -> StyleRequest {
        StyleRequest::new(self.name.clone(), self.description.clone(), adapters)
    }
}
