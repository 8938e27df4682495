use std::sync::Arc;
use std::time::Duration;

use relay_core::Enrichment;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::classifier::Classifier;
use crate::errors::EnrichError;

/// Timeout and fallback around a [`Classifier`].
///
/// Each call suspends only the caller; nothing is shared between calls
/// except the classifier itself.
#[derive(Clone)]
pub struct EnrichmentGateway {
    classifier: Option<Arc<dyn Classifier>>,
    timeout: Duration,
}

impl EnrichmentGateway {
    pub fn new(classifier: Arc<dyn Classifier>, timeout: Duration) -> Self {
        Self {
            classifier: Some(classifier),
            timeout,
        }
    }

    /// A gateway with no classification service: telemetry passes through unchanged.
    pub fn disabled() -> Self {
        Self {
            classifier: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.classifier.is_some()
    }

    /// Classify one payload. Every failure becomes [`Enrichment::fallback`].
    pub async fn classify(&self, payload: &Map<String, Value>) -> Enrichment {
        let Some(classifier) = &self.classifier else {
            return Enrichment::fallback();
        };
        let result = match tokio::time::timeout(self.timeout, classifier.classify(payload)).await {
            Ok(result) => result,
            Err(_) => Err(EnrichError::Timeout(self.timeout)),
        };
        match result {
            Ok(enrichment) => {
                debug!(classifier = classifier.name(), status = %enrichment.status, "telemetry classified");
                enrichment
            }
            Err(e) => {
                warn!(
                    classifier = classifier.name(),
                    error_kind = e.error_kind(),
                    error = %e,
                    "classification failed, using fallback"
                );
                Enrichment::fallback()
            }
        }
    }

    /// Classify and merge onto the payload (enrichment fields win).
    /// A disabled gateway returns the payload untouched.
    pub async fn enrich(&self, payload: Map<String, Value>) -> Map<String, Value> {
        if !self.is_enabled() {
            return payload;
        }
        let enrichment = self.classify(&payload).await;
        enrichment.merge_onto(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::enrichment::FALLBACK_EXPLANATION;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(Enrichment);

    #[async_trait]
    impl Classifier for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn classify(&self, _p: &Map<String, Value>) -> Result<Enrichment, EnrichError> {
            Ok(self.0.clone())
        }
    }

    struct Failing(AtomicUsize);

    #[async_trait]
    impl Classifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn classify(&self, _p: &Map<String, Value>) -> Result<Enrichment, EnrichError> {
            let _ = self.0.fetch_add(1, Ordering::Relaxed);
            Err(EnrichError::Network("connection refused".into()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl Classifier for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }
        async fn classify(&self, _p: &Map<String, Value>) -> Result<Enrichment, EnrichError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Enrichment::new("late", "too late"))
        }
    }

    fn reading() -> Map<String, Value> {
        match json!({"temp": 31, "unit": "C"}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn success_merges_all_fields() {
        let gw = EnrichmentGateway::new(
            Arc::new(Fixed(Enrichment::new("normal", "within range"))),
            Duration::from_secs(1),
        );
        let merged = gw.enrich(reading()).await;
        assert_eq!(merged["temp"], 31);
        assert_eq!(merged["unit"], "C");
        assert_eq!(merged["status"], "normal");
        assert_eq!(merged["explanation"], "within range");
    }

    #[tokio::test]
    async fn failure_yields_fallback() {
        let classifier = Arc::new(Failing(AtomicUsize::new(0)));
        let gw = EnrichmentGateway::new(classifier.clone(), Duration::from_secs(1));
        for _ in 0..3 {
            let e = gw.classify(&reading()).await;
            assert_eq!(e.status, "unknown");
            assert_eq!(e.explanation, FALLBACK_EXPLANATION);
        }
        assert_eq!(classifier.0.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn failure_still_merges_fallback_onto_payload() {
        let gw = EnrichmentGateway::new(
            Arc::new(Failing(AtomicUsize::new(0))),
            Duration::from_secs(1),
        );
        let merged = gw.enrich(reading()).await;
        assert_eq!(merged["temp"], 31);
        assert_eq!(merged["status"], "unknown");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_service_times_out_to_fallback() {
        let gw = EnrichmentGateway::new(Arc::new(Stalled), Duration::from_millis(200));
        let e = gw.classify(&reading()).await;
        assert!(e.is_fallback());
    }

    #[tokio::test]
    async fn disabled_gateway_passes_through() {
        let gw = EnrichmentGateway::disabled();
        assert!(!gw.is_enabled());
        let out = gw.enrich(reading()).await;
        assert_eq!(out, reading());
    }
}
