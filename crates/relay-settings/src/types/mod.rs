//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a partial
//! JSON file only needs the fields it changes.

mod enrichment;
mod logging;
mod server;

pub use enrichment::*;
pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Paths served over plain HTTP; WebSocket endpoints may not reuse them.
pub const RESERVED_PATHS: &[&str] = &["/", "/health", "/devices", "/led"];

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "enrichment": { "url": "http://127.0.0.1:5000/classify" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    pub server: ServerSettings,
    pub devices: DeviceSettings,
    pub enrichment: EnrichmentSettings,
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject combinations serde cannot catch on its own.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for endpoint in &self.server.endpoints {
            if !endpoint.path.starts_with('/') {
                return Err(SettingsError::InvalidValue(format!(
                    "endpoint path must start with '/': {:?}",
                    endpoint.path
                )));
            }
            if RESERVED_PATHS.contains(&endpoint.path.as_str()) {
                return Err(SettingsError::InvalidValue(format!(
                    "endpoint path is reserved for HTTP: {}",
                    endpoint.path
                )));
            }
            if !seen.insert(endpoint.path.as_str()) {
                return Err(SettingsError::InvalidValue(format!(
                    "duplicate endpoint path: {}",
                    endpoint.path
                )));
            }
        }
        if self.server.max_send_queue == 0 {
            return Err(SettingsError::InvalidValue("maxSendQueue must be > 0".into()));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "heartbeatIntervalSecs must be > 0".into(),
            ));
        }
        if self.enrichment.timeout_ms == 0 {
            return Err(SettingsError::InvalidValue("enrichment timeoutMs must be > 0".into()));
        }
        if self.devices.identity_prefix.is_empty() {
            return Err(SettingsError::InvalidValue(
                "identityPrefix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RelaySettings::default().validate().is_ok());
    }

    #[test]
    fn reserved_path_rejected() {
        let mut s = RelaySettings::default();
        s.server.endpoints[0].path = "/health".into();
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn zero_enrichment_timeout_rejected() {
        let mut s = RelaySettings::default();
        s.enrichment.timeout_ms = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn zero_heartbeat_rejected() {
        let mut s = RelaySettings::default();
        s.server.heartbeat_interval_secs = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn duplicate_paths_rejected() {
        let mut s = RelaySettings::default();
        s.server.endpoints.push(EndpointSettings {
            path: "/ws".into(),
            handshake: HandshakeMode::Lazy,
        });
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn relative_path_rejected() {
        let mut s = RelaySettings::default();
        s.server.endpoints = vec![EndpointSettings {
            path: "device".into(),
            handshake: HandshakeMode::EagerDevice,
        }];
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_queue_rejected() {
        let mut s = RelaySettings::default();
        s.server.max_send_queue = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let v = serde_json::to_value(RelaySettings::default()).unwrap();
        assert!(v["server"].get("maxSendQueue").is_some());
        assert!(v["devices"].get("identityPrefix").is_some());
        assert!(v["enrichment"].get("timeoutMs").is_some());
    }
}
