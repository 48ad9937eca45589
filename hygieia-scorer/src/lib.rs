//! Facility scorer implementations for Hygieia.

use std::sync::Arc;

use reqwest::{Client, Url};

use hygieia_core::ports::FacilityScorer;

/// Deterministic placeholder scorer.
pub mod digest;
/// Client for an external inference service.
pub mod remote;

pub use digest::DigestScorer;
pub use remote::RemoteScorer;

/// Pick the scorer for a deployment: the remote client when an endpoint is
/// configured, the digest placeholder otherwise.
#[must_use]
pub fn scorer(endpoint: Option<Url>, client: Client) -> Arc<dyn FacilityScorer> {
    match endpoint {
        Some(endpoint) => Arc::new(RemoteScorer::new(client, endpoint)),
        None => Arc::new(DigestScorer),
    }
}
