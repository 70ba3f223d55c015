//! One-call image generation: session, payload, negotiation and decoding

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::backend::{HttpTransport, RemoteAssetFetcher, SessionAcquirer, Transport};
use crate::config::GenerationConfig;
use crate::error::Result;
use crate::negotiation::{EndpointSelector, NegotiationEngine};
use crate::payload::{CanonicalPayloadBuilder, StyleRequest};
use crate::response::{DecodedImage, ResponseDecoder};

/// Wires the negotiator components together for a fixed configuration
pub struct ImageGenerator {
    config: GenerationConfig,
    sessions: SessionAcquirer,
    endpoints: EndpointSelector,
    engine: NegotiationEngine,
    decoder: ResponseDecoder,
}

impl ImageGenerator {
    pub fn new(config: GenerationConfig, transport: Arc<dyn Transport>) -> Self {
        let server_address = config.server_address().to_string();
        let upscale_candidates = CanonicalPayloadBuilder::new(&config).upscale_candidates();

        let sessions = SessionAcquirer::new(transport.clone(), config.session_route.clone());
        let endpoints = EndpointSelector::from_routes(&server_address, &config.routes);
        let engine = NegotiationEngine::new(
            transport.clone(),
            config.request_timeout(),
            upscale_candidates,
        )
        .with_payload_debug(config.debug_payloads);
        let decoder = ResponseDecoder::new(
            RemoteAssetFetcher::new(transport),
            server_address,
            config.download_timeout(),
        );

        Self {
            config,
            sessions,
            endpoints,
            engine,
            decoder,
        }
    }

    /// Generator talking to the configured server over HTTP
    pub fn connect(config: GenerationConfig) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
        Ok(Self::new(config, transport))
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate one image. Only a session failure or exhaustion of every
    /// endpoint is reported as an error.
    #[instrument(skip(self, request), fields(subject = %request.subject))]
    pub async fn generate(&self, request: &StyleRequest) -> Result<DecodedImage> {
        let session = self
            .sessions
            .acquire(self.config.server_address(), self.config.session_timeout())
            .await?;

        let (primary, catalog) = CanonicalPayloadBuilder::new(&self.config).build(request, &session);

        let decoder = &self.decoder;
        let image = self
            .engine
            .negotiate_with(&primary, &catalog, &self.endpoints, |body| async move {
                decoder.decode(&body).await
            })
            .await?;

        info!(
            size = image.bytes.len(),
            downloaded = image.origin_url.is_some(),
            "Image generated"
        );
        Ok(image)
    }

    /// Generate several images with at most `max_concurrent` in flight.
    /// Results are returned in request order.
    pub async fn generate_batch(
        &self,
        requests: &[StyleRequest],
        max_concurrent: usize,
    ) -> Vec<Result<DecodedImage>> {
        stream::iter(requests)
            .map(|request| self.generate(request))
            .buffered(max_concurrent.max(1))
            .collect()
            .await
    }
}
