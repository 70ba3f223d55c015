//! Canonical payload construction

use serde_json::Value;
use tracing::debug;

use crate::backend::Session;
use crate::config::GenerationConfig;
use crate::payload::variants::{
    adapter_variants, guidance_scale_variants, refiner_method_variants, sampler_variants,
};
use crate::payload::{LogicalField, Payload, StyleRequest, VariantCatalog};

/// Upscale methods known to work on most deployments, tried after the
/// configured one is rejected. `model-<configured>` is appended last.
pub const UPSCALE_FALLBACKS: [&str; 2] = ["pixel-lanczos", "latent-bicubic"];

/// Builds the best-guess request body and the catalog of alternatives
pub struct CanonicalPayloadBuilder<'a> {
    config: &'a GenerationConfig,
}

impl<'a> CanonicalPayloadBuilder<'a> {
    pub fn new(config: &'a GenerationConfig) -> Self {
        Self { config }
    }

    pub fn prompt(&self, request: &StyleRequest) -> String {
        self.config
            .prompt_template
            .replace("{subject}", &request.subject)
    }

    /// Replacement upscale methods for the refinement ladder, in order
    pub fn upscale_candidates(&self) -> Vec<String> {
        UPSCALE_FALLBACKS
            .iter()
            .map(|m| m.to_string())
            .chain(std::iter::once(format!(
                "model-{}",
                self.config.refiner.upscale_method
            )))
            .collect()
    }

    pub fn catalog(&self, request: &StyleRequest) -> VariantCatalog {
        let config = self.config;
        let mut variants = adapter_variants(&request.adapters);
        if config.refiner.enabled {
            variants.extend(refiner_method_variants(&config.refiner.method));
        }
        variants.extend(guidance_scale_variants(config.cfg_scale));
        variants.extend(sampler_variants(&config.sampler, &config.sampler_alias));

        VariantCatalog::new(variants, vec![("seed", Value::from(-1))])
    }

    /// Primary payload plus catalog. Every unstable field starts at its
    /// preferred catalog entry.
    pub fn build(&self, request: &StyleRequest, session: &Session) -> (Payload, VariantCatalog) {
        let config = self.config;
        let catalog = self.catalog(request);

        let mut payload = Payload::new();
        payload.insert("session_id".into(), Value::from(session.token()));
        payload.insert("prompt".into(), Value::from(self.prompt(request)));
        payload.insert("negativeprompt".into(), Value::from(config.negative_prompt.clone()));
        payload.insert("model".into(), Value::from(config.model.clone()));
        payload.insert("width".into(), Value::from(config.width));
        payload.insert("height".into(), Value::from(config.height));
        payload.insert("steps".into(), Value::from(config.steps));
        payload.insert("scheduler".into(), Value::from(config.scheduler.clone()));
        payload.insert("images".into(), Value::from(config.images));
        payload.insert("sigma_shift".into(), Value::from(config.sigma_shift));
        payload.insert("preferred_dtype".into(), Value::from(config.preferred_dtype.clone()));
        payload.insert("automatic_vae".into(), Value::from(config.automatic_vae));

        if config.refiner.enabled {
            let refiner = &config.refiner;
            payload.insert(
                "refiner_control_percentage".into(),
                Value::from(refiner.control_percentage),
            );
            payload.insert("refiner_upscale".into(), Value::from(refiner.upscale));
            payload.insert(
                "refiner_upscale_method".into(),
                Value::from(refiner.upscale_method.clone()),
            );
            payload.insert("refiner_steps".into(), Value::from(refiner.steps));
        }

        for field in [
            LogicalField::StyleAdapters,
            LogicalField::RefinerMethod,
            LogicalField::GuidanceScale,
            LogicalField::Sampler,
        ] {
            if let Some(variant) = catalog.preferred(field) {
                payload = variant.apply(&payload);
            }
        }

        debug!(
            subject = %request.subject,
            adapters = request.adapters.len(),
            variants = catalog.len(),
            "Built primary payload"
        );

        (payload, catalog)
    }
}
