//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::payload::StyleAdapter;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Everything needed to talk to the generation backend.
///
/// Loaded once per process and never mutated during negotiation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Generation routes, tried in order
    #[serde(default = "default_routes")]
    pub routes: Vec<String>,
    #[serde(default = "default_session_route")]
    pub session_route: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f64,
    #[serde(default = "default_sampler")]
    pub sampler: String,
    /// Alternate sampler identifier used by the broadened fallback payload
    #[serde(default = "default_sampler_alias")]
    pub sampler_alias: String,
    #[serde(default = "default_scheduler")]
    pub scheduler: String,
    #[serde(default = "default_images")]
    pub images: u32,
    #[serde(default = "default_sigma_shift")]
    pub sigma_shift: u32,
    #[serde(default = "default_preferred_dtype")]
    pub preferred_dtype: String,
    #[serde(default = "default_true")]
    pub automatic_vae: bool,
    /// Style adapters as `name:weight,name2:weight2`
    #[serde(default = "default_style_adapters")]
    pub style_adapters: String,
    /// Positive prompt; `{subject}` is replaced by the request subject
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    /// Log every outgoing generation payload
    #[serde(default)]
    pub debug_payloads: bool,
    #[serde(default)]
    pub refiner: RefinerConfig,
}

fn default_server_url() -> String {
    "http://localhost:7801".to_string()
}

fn default_routes() -> Vec<String> {
    vec!["/API/GenerateText2Image".to_string(), "/Text2Image".to_string()]
}

fn default_session_route() -> String {
    "/API/GetNewSession".to_string()
}

fn default_model() -> String {
    "Qwen_Image_Edit_2511_Quant_Scaled_FP8".to_string()
}

fn default_width() -> u32 {
    1168
}

fn default_height() -> u32 {
    1488
}

fn default_steps() -> u32 {
    4
}

fn default_cfg_scale() -> f64 {
    1.0
}

fn default_sampler() -> String {
    "euler_ancestral".to_string()
}

fn default_sampler_alias() -> String {
    "euler_a".to_string()
}

fn default_scheduler() -> String {
    "normal".to_string()
}

fn default_images() -> u32 {
    1
}

fn default_sigma_shift() -> u32 {
    1
}

fn default_preferred_dtype() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_style_adapters() -> String {
    "Qwen-Image-Edit-2509-Lightning-4steps-V1.0-fp32:0.9,Qwen_LoRA_Skin_Fix_v2:0.6".to_string()
}

fn default_prompt_template() -> String {
    concat!(
        "photorealistic book shelfie photograph, pristine white bookshelf in unnaturally perfect suburban home,\n",
        "soft clinical lighting reminiscent of \"Get Out\" movie aesthetic, bright but cold and sterile,\n",
        "book prominently displayed showing title: \"{subject}\",\n",
        "surrounding books with vague ominous self-help titles on spines,\n",
        "subtle unsettling elements: too-perfect white flowers, wine glass with dark red wine, pearl necklace draped casually,\n",
        "color palette: whites creams pastels with occasional blood-red accents,\n",
        "Stepford Wives meets modern book club, performative normalcy masking authoritarian impulses,\n",
        "shallow depth of field, book in sharp focus, background soft blur,\n",
        "slight tilted angle as if photographed casually by book club member,\n",
        "photorealistic, 8k quality, professional photography, highly detailed"
    )
    .to_string()
}

fn default_negative_prompt() -> String {
    concat!(
        "blurry, low quality, cartoonish, anime, illustration, drawing,\n",
        "messy, cluttered, dirty, damaged books, poor lighting, overexposed, underexposed,\n",
        "text errors, misspelled words, distorted text, warped perspective, multiple books in focus"
    )
    .to_string()
}

fn default_request_timeout() -> u64 {
    600
}

fn default_session_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    300
}

/// Refinement (post-processing / upscaling) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefinerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Free-text method, normalized before sending
    #[serde(default = "default_refiner_method")]
    pub method: String,
    #[serde(default = "default_control_percentage")]
    pub control_percentage: f64,
    #[serde(default = "default_refiner_steps")]
    pub steps: u32,
    #[serde(default = "default_upscale")]
    pub upscale: u32,
    #[serde(default = "default_upscale_method")]
    pub upscale_method: String,
}

fn default_refiner_method() -> String {
    "Post-Apply (Normal)".to_string()
}

fn default_control_percentage() -> f64 {
    0.6
}

fn default_refiner_steps() -> u32 {
    7
}

fn default_upscale() -> u32 {
    2
}

fn default_upscale_method() -> String {
    "4xRealWebPhoto_v4_dat2.safetensors".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Local image storage used by the file sink
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub base_path: String,
}

fn default_storage_path() -> String {
    "./generated_images".to_string()
}

/// Batch execution settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    1
}

impl GenerationConfig {
    /// Server address without a trailing slash
    pub fn server_address(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs.min(self.request_timeout_secs))
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs.min(self.request_timeout_secs))
    }

    /// Parse the configured adapter string, skipping malformed entries
    pub fn style_adapters(&self) -> Vec<StyleAdapter> {
        parse_style_adapters(&self.style_adapters)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(adapter) => Some(adapter),
                Err(raw) => {
                    warn!(entry = %raw, "Skipping malformed style adapter entry");
                    None
                }
            })
            .collect()
    }
}

/// Parse `name:weight,name2` into adapters. Entries without a weight get
/// 1.0; entries whose weight does not parse are returned as `Err(raw)`.
pub fn parse_style_adapters(raw: &str) -> Vec<std::result::Result<StyleAdapter, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.rsplit_once(':') {
            Some((name, weight)) => weight
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|w| w.is_finite())
                .filter(|_| !name.trim().is_empty())
                .map(|w| StyleAdapter::new(name.trim(), w))
                .ok_or_else(|| pair.to_string()),
            None => Ok(StyleAdapter::new(pair, 1.0)),
        })
        .collect()
}

impl Settings {
    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with GEN_NEGOTIATOR)
            .add_source(
                Environment::with_prefix("GEN_NEGOTIATOR")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("generation.routes")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;

        if generation.server_address().is_empty() {
            return Err(invalid("Server URL cannot be empty"));
        }
        if generation.routes.is_empty() {
            return Err(invalid("At least one generation route is required"));
        }
        if generation.width == 0 || generation.height == 0 {
            return Err(invalid(format!(
                "Image dimensions must be non-zero, got {}x{}",
                generation.width, generation.height
            )));
        }
        if generation.steps == 0 {
            return Err(invalid("Step count cannot be 0"));
        }
        if generation.request_timeout_secs == 0 {
            return Err(invalid("Request timeout cannot be 0"));
        }
        if let Some(bad) = parse_style_adapters(&generation.style_adapters)
            .into_iter()
            .find_map(|entry| entry.err())
        {
            return Err(invalid(format!("Malformed style adapter entry '{}'", bad)));
        }
        if self.batch.max_concurrent == 0 {
            return Err(invalid("Batch concurrency must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Config(config::ConfigError::Message(message.into()))
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            routes: default_routes(),
            session_route: default_session_route(),
            model: default_model(),
            width: default_width(),
            height: default_height(),
            steps: default_steps(),
            cfg_scale: default_cfg_scale(),
            sampler: default_sampler(),
            sampler_alias: default_sampler_alias(),
            scheduler: default_scheduler(),
            images: default_images(),
            sigma_shift: default_sigma_shift(),
            preferred_dtype: default_preferred_dtype(),
            automatic_vae: true,
            style_adapters: default_style_adapters(),
            prompt_template: default_prompt_template(),
            negative_prompt: default_negative_prompt(),
            request_timeout_secs: default_request_timeout(),
            session_timeout_secs: default_session_timeout(),
            download_timeout_secs: default_download_timeout(),
            debug_payloads: false,
            refiner: RefinerConfig::default(),
        }
    }
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: default_refiner_method(),
            control_percentage: default_control_percentage(),
            steps: default_refiner_steps(),
            upscale: default_upscale(),
            upscale_method: default_upscale_method(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}
