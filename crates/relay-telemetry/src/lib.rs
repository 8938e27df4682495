use relay_settings::LoggingSettings;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "relay_enrich" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// JSON lines when true, compact text otherwise.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: true,
        }
    }
}

impl TelemetryConfig {
    /// Build from settings. Unparseable level names fall back to INFO.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        let module_levels = settings
            .module_levels
            .iter()
            .filter_map(|(module, level)| Some((module.clone(), level.parse().ok()?)))
            .collect();
        Self {
            log_level: settings.level.parse().unwrap_or(Level::INFO),
            module_levels,
            json: settings.json,
        }
    }

    /// Filter directive string, e.g. `info,relay_enrich=debug`.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Initialize the global tracing subscriber. Call once at startup.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().compact().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn directives_include_module_levels() {
        let config = TelemetryConfig {
            log_level: Level::WARN,
            module_levels: vec![("relay_server".into(), Level::DEBUG)],
            json: false,
        };
        assert_eq!(config.filter_directives(), "warn,relay_server=debug");
    }

    #[test]
    fn from_settings_parses_levels() {
        let mut module_levels = BTreeMap::new();
        let _ = module_levels.insert("relay_enrich".to_string(), "trace".to_string());
        let _ = module_levels.insert("noisy".to_string(), "loud".to_string());
        let settings = LoggingSettings {
            level: "debug".into(),
            json: false,
            module_levels,
        };
        let config = TelemetryConfig::from_settings(&settings);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.module_levels, vec![("relay_enrich".to_string(), Level::TRACE)]);
        assert!(!config.json);
    }

    #[test]
    fn bad_level_falls_back_to_info() {
        let settings = LoggingSettings {
            level: "chatty".into(),
            ..LoggingSettings::default()
        };
        assert_eq!(TelemetryConfig::from_settings(&settings).log_level, Level::INFO);
    }

    #[test]
    fn second_init_reports_false() {
        let config = TelemetryConfig::default();
        let _ = init_telemetry(&config);
        assert!(!init_telemetry(&config));
    }
}
