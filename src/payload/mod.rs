//! Request types and canonical payload construction

pub mod builder;
pub mod variants;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use builder::{CanonicalPayloadBuilder, UPSCALE_FALLBACKS};
pub use variants::{normalize_refiner_method, FieldVariant, LogicalField, VariantCatalog};

/// One flat JSON request body
pub type Payload = Map<String, Value>;

/// A named, weighted modifier applied during synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleAdapter {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl StyleAdapter {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }

    /// `name:weight`, or just `name` when the weight is 1.0
    pub fn weighted_token(&self) -> String {
        if (self.weight - 1.0).abs() < 1e-6 {
            self.name.clone()
        } else {
            format!("{}:{}", self.name, self.weight)
        }
    }

    /// Weight as JSON, keeping whole numbers integral
    pub fn weight_value(&self) -> Value {
        if self.weight.fract() == 0.0 && self.weight.abs() < i64::MAX as f64 {
            Value::from(self.weight as i64)
        } else {
            Value::from(self.weight)
        }
    }
}

/// What to generate. Built once per generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRequest {
    /// Text rendered into the image, e.g. a book title
    pub subject: String,
    /// Free-form description carried alongside the subject
    #[serde(default)]
    pub hint: String,
    #[serde(default)]
    pub adapters: Vec<StyleAdapter>,
}

impl StyleRequest {
    pub fn new(subject: impl Into<String>, hint: impl Into<String>, adapters: Vec<StyleAdapter>) -> Self {
        Self {
            subject: subject.into(),
            hint: hint.into(),
            adapters,
        }
    }
}
