//! Classification result attached to structured telemetry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status reported when the classification service could not be used.
pub const FALLBACK_STATUS: &str = "unknown";
/// Explanation reported when the classification service could not be used.
pub const FALLBACK_EXPLANATION: &str = "anomaly classification service unreachable";

/// Response of the anomaly classification service.
///
/// `status` and `explanation` are required; any further fields the service
/// returns are kept in `extra` and merged along with them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub status: String,
    pub explanation: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Enrichment {
    pub fn new(status: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            explanation: explanation.into(),
            extra: Map::new(),
        }
    }

    /// The value substituted for any failed or timed-out classification.
    pub fn fallback() -> Self {
        Self::new(FALLBACK_STATUS, FALLBACK_EXPLANATION)
    }

    pub fn is_fallback(&self) -> bool {
        self.status == FALLBACK_STATUS && self.explanation == FALLBACK_EXPLANATION
    }

    /// Merge onto the original telemetry. Enrichment fields overwrite
    /// telemetry fields of the same name.
    pub fn merge_onto(self, mut payload: Map<String, Value>) -> Map<String, Value> {
        for (key, value) in self.extra {
            let _ = payload.insert(key, value);
        }
        let _ = payload.insert("status".into(), Value::String(self.status));
        let _ = payload.insert("explanation".into(), Value::String(self.explanation));
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn fallback_values() {
        let e = Enrichment::fallback();
        assert_eq!(e.status, "unknown");
        assert_eq!(e.explanation, FALLBACK_EXPLANATION);
        assert!(e.is_fallback());
        assert!(!Enrichment::new("normal", "ok").is_fallback());
    }

    #[test]
    fn merge_keeps_original_fields() {
        let payload = object(json!({"temp": 21.5, "humidity": 40}));
        let merged = Enrichment::new("normal", "within range").merge_onto(payload);
        assert_eq!(merged["temp"], 21.5);
        assert_eq!(merged["humidity"], 40);
        assert_eq!(merged["status"], "normal");
        assert_eq!(merged["explanation"], "within range");
    }

    #[test]
    fn enrichment_wins_on_collision() {
        let payload = object(json!({"status": "device-says-fine", "v": 1}));
        let merged = Enrichment::new("anomaly", "spike").merge_onto(payload);
        assert_eq!(merged["status"], "anomaly");
        assert_eq!(merged["v"], 1);
    }

    #[test]
    fn extra_response_fields_are_merged() {
        let e: Enrichment = serde_json::from_value(json!({
            "status": "anomaly",
            "explanation": "spike",
            "score": 0.93
        }))
        .unwrap();
        assert_eq!(e.extra["score"], 0.93);
        let merged = e.merge_onto(Map::new());
        assert_eq!(merged["score"], 0.93);
    }

    #[test]
    fn missing_status_does_not_deserialize() {
        let r: Result<Enrichment, _> = serde_json::from_value(json!({"explanation": "x"}));
        assert!(r.is_err());
        let r: Result<Enrichment, _> =
            serde_json::from_value(json!({"status": 3, "explanation": "x"}));
        assert!(r.is_err());
    }
}
