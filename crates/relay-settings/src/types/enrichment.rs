use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Anomaly classification service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichmentSettings {
    /// Classification endpoint. `None` disables enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl EnrichmentSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 3_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        let s = EnrichmentSettings::default();
        assert!(s.url.is_none());
        assert_eq!(s.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn url_omitted_when_none() {
        let v = serde_json::to_value(EnrichmentSettings::default()).unwrap();
        assert!(v.get("url").is_none());
    }
}
