//! Post pipeline: generate an image per post and attach it to the post's record

use tracing::{error, info};
use uuid::Uuid;

use crate::generator::ImageGenerator;
use crate::payload::StyleAdapter;
use crate::sink::{ImageAttachment, ImageSink, PostDescriptor};

/// Result of one post
#[derive(Debug)]
pub struct PostOutcome {
    pub name: String,
    pub record: String,
    /// Attachment locator, or the reason the post failed
    pub result: std::result::Result<String, String>,
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    pub outcomes: Vec<PostOutcome>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

pub struct Pipeline<'a, S: ImageSink> {
    generator: &'a ImageGenerator,
    sink: S,
    adapters: Vec<StyleAdapter>,
    prefer_url: bool,
    max_concurrent: usize,
}

impl<'a, S: ImageSink> Pipeline<'a, S> {
    pub fn new(generator: &'a ImageGenerator, sink: S) -> Self {
        Self {
            adapters: generator.config().style_adapters(),
            generator,
            sink,
            prefer_url: false,
            max_concurrent: 1,
        }
    }

    pub fn prefer_url(mut self, prefer_url: bool) -> Self {
        self.prefer_url = prefer_url;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run every post. A failed post is recorded and the rest continue.
    pub async fn run(&self, posts: &[PostDescriptor]) -> PipelineReport {
        let requests: Vec<_> = posts
            .iter()
            .map(|post| post.to_request(self.adapters.clone()))
            .collect();

        info!(posts = posts.len(), max_concurrent = self.max_concurrent, "Generating images");
        let images = self
            .generator
            .generate_batch(&requests, self.max_concurrent)
            .await;

        let mut report = PipelineReport::default();
        for (post, image) in posts.iter().zip(images) {
            let record = Uuid::new_v4().to_string();
            let result = match image {
                Ok(image) => {
                    let attachment = ImageAttachment::from_image(image, self.prefer_url);
                    self.sink
                        .attach(&record, &attachment)
                        .await
                        .map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            };

            match &result {
                Ok(location) => info!(post = %post.name, location = %location, "Image attached"),
                Err(e) => error!(post = %post.name, error = %e, "Post failed"),
            }
            report.outcomes.push(PostOutcome {
                name: post.name.clone(),
                record,
                result,
            });
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Pipeline finished"
        );
        report
    }
}
