//! # relay-enrich
//!
//! Wraps the external anomaly classification service. [`EnrichmentGateway`]
//! never fails: errors, malformed replies and timeouts all resolve to
//! [`relay_core::Enrichment::fallback`].

pub mod classifier;
pub mod errors;
pub mod gateway;

pub use classifier::{Classifier, HttpClassifier};
pub use errors::EnrichError;
pub use gateway::EnrichmentGateway;
