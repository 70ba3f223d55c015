//! Adaptive generation request negotiator
//!
//! Turns a semantic image request into a successful call against an
//! image-generation backend whose accepted request schema is unknown and
//! differs between deployments. Rejections are classified and the request
//! is reshaped along a bounded, ordered ladder of alternative encodings
//! until one is accepted or every endpoint is exhausted.

pub mod backend;
pub mod config;
pub mod error;
pub mod generator;
pub mod negotiation;
pub mod payload;
pub mod pipeline;
pub mod response;
pub mod sink;

pub use error::{AppError, Result};
pub use generator::ImageGenerator;
