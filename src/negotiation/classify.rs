//! Classification of backend rejection messages

use std::fmt;

/// Which part of the request a rejection blames. Declaration order is
/// priority order: `Model` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RejectionClass {
    Model,
    StyleAdapters,
    Refinement,
}

impl fmt::Display for RejectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectionClass::Model => "model",
            RejectionClass::StyleAdapters => "style-adapters",
            RejectionClass::Refinement => "refinement",
        };
        f.write_str(name)
    }
}

const MODEL_MARKERS: [&str; 5] = [
    "invalid value for parameter model",
    "invalid model value",
    "no model input given",
    "did your ui load properly",
    "are you sure that model name is correct",
];

const ADAPTER_MARKERS: [&str; 1] = ["lora"];

const REFINEMENT_MARKERS: [&str; 2] = ["refiner", "unrecognized"];

/// Every class the message implicates, highest priority first.
/// Matching is case-insensitive substring search.
pub fn classify(message: &str) -> Vec<RejectionClass> {
    let lowered = message.to_lowercase();
    let mentions = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

    let mut classes = Vec::new();
    if mentions(&MODEL_MARKERS[..]) {
        classes.push(RejectionClass::Model);
    }
    if mentions(&ADAPTER_MARKERS[..]) {
        classes.push(RejectionClass::StyleAdapters);
    }
    if mentions(&REFINEMENT_MARKERS[..]) {
        classes.push(RejectionClass::Refinement);
    }
    classes
}
