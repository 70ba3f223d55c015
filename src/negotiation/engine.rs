//! Request negotiation state machine
//!
//! For each endpoint the engine sends the primary payload and, on a
//! rejection, classifies the error text to pick a ladder of reshaped
//! payloads. Ladders are tried strictly in their declared order and the
//! first accepted response wins. Every rejection inside a ladder is
//! classified too: a complaint about a higher-priority class that has not
//! run yet cuts the current ladder short and that class runs next. A class
//! only runs again after being cut short, so the search stays bounded.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::Transport;
use crate::error::{AppError, Result};
use crate::negotiation::classify::{classify, RejectionClass};
use crate::negotiation::endpoints::EndpointSelector;
use crate::payload::{LogicalField, Payload, VariantCatalog};

/// Prefix shared by every refinement key
const REFINER_PREFIX: &str = "refiner";
const UPSCALE_METHOD_KEY: &str = "refiner_upscale_method";

/// Longest payload dump written when payload debugging is on
const PAYLOAD_DEBUG_LIMIT: usize = 2000;

/// A structured complaint from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: u16,
    pub message: String,
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        AppError::SchemaRejection {
            status: rejection.status,
            message: rejection.message,
        }
    }
}

/// How negotiation against one endpoint ended
#[derive(Debug)]
pub enum EndpointOutcome {
    /// A payload was accepted; holds the raw response body
    Accepted(Vec<u8>),
    /// The endpoint could not be reached or timed out
    Abandoned(AppError),
    /// Every applicable ladder was rejected, or the rejection was unclassified
    Rejected(Rejection),
}

enum AttemptResult {
    Accepted(Vec<u8>),
    Rejected(Rejection),
    /// Only this attempt failed; the next candidate may still work
    Skipped(AppError),
    Unreachable(AppError),
}

enum LadderResult {
    Accepted(Vec<u8>),
    /// Every candidate failed; `seen` holds every class any rejection named
    Failed {
        last: Option<Rejection>,
        seen: Vec<RejectionClass>,
    },
    /// A rejection named an unhandled class of higher priority
    Preempted {
        rejection: Rejection,
        seen: Vec<RejectionClass>,
    },
    Abandoned(AppError),
}

struct Candidate {
    label: String,
    payload: Payload,
}

impl Candidate {
    fn new(label: impl Into<String>, payload: Payload) -> Self {
        Self {
            label: label.into(),
            payload,
        }
    }
}

/// Drives attempts across endpoints and payload variants
pub struct NegotiationEngine {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    upscale_candidates: Vec<String>,
    debug_payloads: bool,
}

impl NegotiationEngine {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration, upscale_candidates: Vec<String>) -> Self {
        Self {
            transport,
            timeout,
            upscale_candidates,
            debug_payloads: false,
        }
    }

    /// Log every outgoing payload
    pub fn with_payload_debug(mut self, enabled: bool) -> Self {
        self.debug_payloads = enabled;
        self
    }

    /// Raw body of the first accepted response
    pub async fn negotiate(
        &self,
        primary: &Payload,
        catalog: &VariantCatalog,
        endpoints: &EndpointSelector,
    ) -> Result<Vec<u8>> {
        self.negotiate_with(primary, catalog, endpoints, |body| async move {
            Ok::<_, AppError>(body)
        })
        .await
    }

    /// Like [`negotiate`](Self::negotiate), but an accepted body must also
    /// pass `accept`. When `accept` fails the endpoint is finished and the
    /// next one is tried from its primary payload.
    pub async fn negotiate_with<T, F, Fut>(
        &self,
        primary: &Payload,
        catalog: &VariantCatalog,
        endpoints: &EndpointSelector,
        mut accept: F,
    ) -> Result<T>
    where
        F: FnMut(Vec<u8>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        let mut last_error: Option<AppError> = None;

        for endpoint in endpoints.iter() {
            info!(endpoint = %endpoint, "Negotiating generation request");

            match self
                .negotiate_endpoint(endpoint, primary, catalog, &mut attempts)
                .await
            {
                EndpointOutcome::Accepted(body) => match accept(body).await {
                    Ok(value) => {
                        info!(endpoint = %endpoint, attempts, "Generation request accepted");
                        return Ok(value);
                    }
                    Err(e) => {
                        warn!(endpoint = %endpoint, error = %e, "Accepted response was unusable");
                        last_error = Some(e);
                    }
                },
                EndpointOutcome::Abandoned(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Abandoning endpoint");
                    last_error = Some(e);
                }
                EndpointOutcome::Rejected(rejection) => {
                    warn!(
                        endpoint = %endpoint,
                        status = rejection.status,
                        "No request variant accepted by endpoint"
                    );
                    last_error = Some(rejection.into());
                }
            }
        }

        Err(AppError::Exhausted {
            endpoints: endpoints.len(),
            attempts,
            last_error: last_error.map(|e| e.to_string()),
        })
    }

    /// Run the full ladder against one endpoint. `attempts` is incremented
    /// for every request sent.
    pub async fn negotiate_endpoint(
        &self,
        endpoint: &str,
        primary: &Payload,
        catalog: &VariantCatalog,
        attempts: &mut usize,
    ) -> EndpointOutcome {
        let mut rejection = match self.attempt(endpoint, "primary", primary, attempts).await {
            AttemptResult::Accepted(body) => return EndpointOutcome::Accepted(body),
            AttemptResult::Rejected(rejection) => rejection,
            AttemptResult::Skipped(e) | AttemptResult::Unreachable(e) => {
                return EndpointOutcome::Abandoned(e)
            }
        };

        let mut base = primary.clone();
        let mut handled: Vec<RejectionClass> = Vec::new();
        let mut pending = classify(&rejection.message);

        loop {
            let next = pending
                .iter()
                .copied()
                .filter(|class| !handled.contains(class))
                .min();
            let Some(class) = next else {
                debug!(endpoint = %endpoint, "Rejection not classified further");
                return EndpointOutcome::Rejected(rejection);
            };
            handled.push(class);

            let (candidates, narrowed) = self.plan(class, &base, primary, catalog);
            info!(
                endpoint = %endpoint,
                class = %class,
                candidates = candidates.len(),
                "Backend rejected request; trying alternatives"
            );

            match self
                .run_ladder(endpoint, class, candidates, &handled, attempts)
                .await
            {
                LadderResult::Accepted(body) => return EndpointOutcome::Accepted(body),
                LadderResult::Abandoned(e) => return EndpointOutcome::Abandoned(e),
                LadderResult::Failed { last, seen } => {
                    pending.extend(seen);
                    if let Some(last) = last {
                        rejection = last;
                    }
                    base = narrowed;
                }
                LadderResult::Preempted {
                    rejection: preempting,
                    seen,
                } => {
                    info!(
                        endpoint = %endpoint,
                        class = %class,
                        "Rejection blames a higher-priority field; switching ladders"
                    );
                    // The cut-short ladder may run again on the new base
                    handled.retain(|c| *c != class);
                    pending.extend(seen);
                    rejection = preempting;
                }
            }
        }
    }

    /// Candidates for one rejection class, and the payload later ladders
    /// should build on if all of them fail.
    fn plan(
        &self,
        class: RejectionClass,
        base: &Payload,
        primary: &Payload,
        catalog: &VariantCatalog,
    ) -> (Vec<Candidate>, Payload) {
        match class {
            RejectionClass::Model => {
                let broadened = catalog.broadened(primary);
                (
                    vec![Candidate::new("broadened", broadened.clone())],
                    broadened,
                )
            }
            RejectionClass::StyleAdapters => {
                let field = LogicalField::StyleAdapters;
                if !field.present_in(base) {
                    return (Vec::new(), base.clone());
                }
                let removed = field.strip(base);
                let candidates = catalog
                    .for_field(field)
                    .map(|variant| Candidate::new(variant.label.clone(), variant.apply(base)))
                    .chain(std::iter::once(Candidate::new(
                        "adapters-removed",
                        removed.clone(),
                    )))
                    .collect();
                (candidates, removed)
            }
            RejectionClass::Refinement => {
                if !base.keys().any(|k| k.starts_with(REFINER_PREFIX)) {
                    return (Vec::new(), base.clone());
                }
                let stripped: Payload = base
                    .iter()
                    .filter(|(k, _)| !k.starts_with(REFINER_PREFIX))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let candidates = std::iter::once(Candidate::new("refiner-stripped", stripped.clone()))
                    .chain(self.upscale_candidates.iter().map(|method| {
                        let mut payload = base.clone();
                        payload.insert(UPSCALE_METHOD_KEY.to_string(), Value::from(method.clone()));
                        Candidate::new(format!("upscale:{}", method), payload)
                    }))
                    .collect();
                (candidates, stripped)
            }
        }
    }

    async fn run_ladder(
        &self,
        endpoint: &str,
        class: RejectionClass,
        candidates: Vec<Candidate>,
        handled: &[RejectionClass],
        attempts: &mut usize,
    ) -> LadderResult {
        let mut last = None;
        let mut seen = Vec::new();

        for candidate in candidates {
            match self
                .attempt(endpoint, &candidate.label, &candidate.payload, attempts)
                .await
            {
                AttemptResult::Accepted(body) => {
                    info!(endpoint = %endpoint, variant = %candidate.label, "Alternate request accepted");
                    return LadderResult::Accepted(body);
                }
                AttemptResult::Rejected(rejection) => {
                    let named = classify(&rejection.message);
                    let preempts = named
                        .iter()
                        .any(|other| *other < class && !handled.contains(other));
                    seen.extend(named);
                    if preempts {
                        return LadderResult::Preempted { rejection, seen };
                    }
                    last = Some(rejection);
                }
                AttemptResult::Skipped(e) => {
                    debug!(endpoint = %endpoint, variant = %candidate.label, error = %e, "Attempt skipped");
                }
                AttemptResult::Unreachable(e) => return LadderResult::Abandoned(e),
            }
        }

        LadderResult::Failed { last, seen }
    }

    async fn attempt(
        &self,
        endpoint: &str,
        label: &str,
        payload: &Payload,
        attempts: &mut usize,
    ) -> AttemptResult {
        *attempts += 1;
        let body = Value::Object(payload.clone());

        if self.debug_payloads {
            let dump: String = body.to_string().chars().take(PAYLOAD_DEBUG_LIMIT).collect();
            info!(endpoint = %endpoint, variant = %label, payload = %dump, "Outgoing payload");
        }

        match self.transport.post_json(endpoint, &body, self.timeout).await {
            Ok(response) if response.is_success() => AttemptResult::Accepted(response.body),
            Ok(response) => {
                let message = response.text();
                let preview: String = message.chars().take(300).collect();
                debug!(
                    endpoint = %endpoint,
                    variant = %label,
                    status = response.status,
                    error = %preview,
                    "Request rejected"
                );
                AttemptResult::Rejected(Rejection {
                    status: response.status,
                    message,
                })
            }
            Err(e @ AppError::Connection(_)) => AttemptResult::Unreachable(e),
            Err(e) => AttemptResult::Skipped(e),
        }
    }
}
