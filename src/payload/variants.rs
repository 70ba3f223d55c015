//! Alternative encodings for fields backends disagree about

use serde_json::{Map, Value};
use std::fmt;

use crate::payload::{Payload, StyleAdapter};

/// Keys tried, in order, for a name -> weight adapter map
pub const ADAPTER_MAP_ALIASES: [&str; 8] = [
    "loras_weights_map",
    "loras_map",
    "lora_weights_map",
    "lora_map",
    "weights_map",
    "weightsMap",
    "LoRAWeightsMap",
    "loras_to_weights",
];

/// Delimited string forms of the adapter list, in priority order
const ADAPTER_DELIMITERS: [(&str, &str); 6] = [
    ("comma", ","),
    ("triple-pipe", "|||"),
    ("single-pipe", "|"),
    ("space", " "),
    ("semicolon", ";"),
    ("concatenated", ""),
];

const ADAPTER_KEYS: [&str; 3] = ["loras", "LoRAs", "weights"];

/// A request field whose accepted shape varies between deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    StyleAdapters,
    RefinerMethod,
    GuidanceScale,
    Sampler,
}

impl LogicalField {
    /// Payload keys that belong to this field. A variant replaces all of
    /// them, and removing the field strips all of them.
    pub fn owned_keys(&self) -> Vec<&'static str> {
        match self {
            LogicalField::StyleAdapters => ADAPTER_KEYS
                .iter()
                .chain(ADAPTER_MAP_ALIASES.iter())
                .copied()
                .collect(),
            LogicalField::RefinerMethod => vec!["refiner_method"],
            LogicalField::GuidanceScale => vec!["cfgscale", "cfg_scale"],
            LogicalField::Sampler => vec!["sampler"],
        }
    }

    pub fn present_in(&self, payload: &Payload) -> bool {
        self.owned_keys().iter().any(|k| payload.contains_key(*k))
    }

    /// Copy of `payload` without this field
    pub fn strip(&self, payload: &Payload) -> Payload {
        let keys = self.owned_keys();
        payload
            .iter()
            .filter(|(k, _)| !keys.iter().any(|key| *key == k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalField::StyleAdapters => "style-adapters",
            LogicalField::RefinerMethod => "refiner-method",
            LogicalField::GuidanceScale => "guidance-scale",
            LogicalField::Sampler => "sampler",
        };
        f.write_str(name)
    }
}

/// One concrete encoding of a single logical field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldVariant {
    pub field: LogicalField,
    /// Short name for logs, e.g. `triple-pipe`
    pub label: String,
    pub assignments: Vec<(String, Value)>,
}

impl FieldVariant {
    pub fn new(field: LogicalField, label: impl Into<String>, assignments: Vec<(&str, Value)>) -> Self {
        Self {
            field,
            label: label.into(),
            assignments: assignments
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// `payload` with only this variant's field swapped
    pub fn apply(&self, payload: &Payload) -> Payload {
        let mut swapped = self.field.strip(payload);
        for (key, value) in &self.assignments {
            swapped.insert(key.clone(), value.clone());
        }
        swapped
    }
}

/// Every candidate encoding for the unstable fields of one request,
/// most-likely-accepted first within each field.
#[derive(Debug, Clone, Default)]
pub struct VariantCatalog {
    variants: Vec<FieldVariant>,
    explicit_defaults: Vec<(String, Value)>,
}

impl VariantCatalog {
    pub fn new(variants: Vec<FieldVariant>, explicit_defaults: Vec<(&str, Value)>) -> Self {
        Self {
            variants,
            explicit_defaults: explicit_defaults
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    pub fn for_field(&self, field: LogicalField) -> impl Iterator<Item = &FieldVariant> {
        self.variants.iter().filter(move |v| v.field == field)
    }

    /// First-choice encoding, used by the primary payload
    pub fn preferred(&self, field: LogicalField) -> Option<&FieldVariant> {
        self.for_field(field).next()
    }

    /// Last-resort encoding, used by the broadened payload
    pub fn alternate(&self, field: LogicalField) -> Option<&FieldVariant> {
        self.for_field(field).last()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Full payload for deployments that want explicit values everywhere:
    /// alternate names for the aliased scalar fields plus explicit defaults
    /// the primary leaves to the server.
    pub fn broadened(&self, primary: &Payload) -> Payload {
        let mut payload = primary.clone();
        for field in [LogicalField::GuidanceScale, LogicalField::Sampler] {
            if let Some(variant) = self.alternate(field) {
                payload = variant.apply(&payload);
            }
        }
        for (key, value) in &self.explicit_defaults {
            payload.entry(key.clone()).or_insert_with(|| value.clone());
        }
        payload
    }
}

/// Candidate encodings of the adapter list, in the order they are tried
pub fn adapter_variants(adapters: &[StyleAdapter]) -> Vec<FieldVariant> {
    if adapters.is_empty() {
        return Vec::new();
    }

    let names: Vec<Value> = adapters.iter().map(|a| Value::from(a.name.clone())).collect();
    let weights: Vec<Value> = adapters.iter().map(StyleAdapter::weight_value).collect();
    let tokens: Vec<String> = adapters.iter().map(StyleAdapter::weighted_token).collect();

    let mut variants = vec![FieldVariant::new(
        LogicalField::StyleAdapters,
        "names-list",
        vec![
            ("loras", Value::Array(names.clone())),
            ("weights", Value::Array(weights)),
        ],
    )];

    variants.extend(ADAPTER_DELIMITERS.iter().map(|(label, delimiter)| {
        FieldVariant::new(
            LogicalField::StyleAdapters,
            *label,
            vec![("loras", Value::from(tokens.join(*delimiter)))],
        )
    }));

    let map: Map<String, Value> = adapters
        .iter()
        .map(|a| (a.name.clone(), a.weight_value()))
        .collect();
    variants.extend(ADAPTER_MAP_ALIASES.iter().map(|alias| {
        FieldVariant::new(
            LogicalField::StyleAdapters,
            format!("map:{}", alias),
            vec![
                ("loras", Value::Array(names.clone())),
                (*alias, Value::Object(map.clone())),
            ],
        )
    }));

    variants
}

/// Map free-text refinement methods onto the tokens backends accept.
/// Unknown methods pass through unchanged.
pub fn normalize_refiner_method(method: &str) -> String {
    let lowered = method.to_lowercase();
    let compact: String = lowered.chars().filter(|c| c.is_alphanumeric()).collect();

    if compact.contains("post") && compact.contains("apply") {
        "PostApply".to_string()
    } else if compact.contains("stepswap") && compact.contains("noisy") {
        "StepSwapNoisy".to_string()
    } else if compact.contains("stepswap") {
        "StepSwap".to_string()
    } else {
        method.to_string()
    }
}

/// Canonical token first, then the configured text if it differs
pub fn refiner_method_variants(method: &str) -> Vec<FieldVariant> {
    let canonical = normalize_refiner_method(method);
    let mut variants = vec![FieldVariant::new(
        LogicalField::RefinerMethod,
        "canonical",
        vec![("refiner_method", Value::from(canonical.clone()))],
    )];
    if canonical != method && !method.is_empty() {
        variants.push(FieldVariant::new(
            LogicalField::RefinerMethod,
            "configured",
            vec![("refiner_method", Value::from(method))],
        ));
    }
    variants
}

pub fn guidance_scale_variants(cfg_scale: f64) -> Vec<FieldVariant> {
    ["cfgscale", "cfg_scale"]
        .iter()
        .map(|key| {
            FieldVariant::new(
                LogicalField::GuidanceScale,
                *key,
                vec![(*key, Value::from(cfg_scale))],
            )
        })
        .collect()
}

pub fn sampler_variants(sampler: &str, alias: &str) -> Vec<FieldVariant> {
    let mut variants = vec![FieldVariant::new(
        LogicalField::Sampler,
        sampler,
        vec![("sampler", Value::from(sampler))],
    )];
    if alias != sampler {
        variants.push(FieldVariant::new(
            LogicalField::Sampler,
            alias,
            vec![("sampler", Value::from(alias))],
        ));
    }
    variants
}
