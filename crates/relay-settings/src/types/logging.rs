use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Log output settings. `RUST_LOG` takes precedence when set.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
    /// Per-module overrides, e.g. `{"relay_enrich": "debug"}`.
    pub module_levels: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
            module_levels: BTreeMap::new(),
        }
    }
}
