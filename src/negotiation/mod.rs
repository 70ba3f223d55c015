//! Negotiation module - endpoint ordering, rejection classification and
//! the attempt state machine

pub mod classify;
pub mod endpoints;
pub mod engine;

pub use classify::{classify, RejectionClass};
pub use endpoints::EndpointSelector;
pub use engine::{EndpointOutcome, NegotiationEngine, Rejection};
