//! Listener, endpoint, and device identity settings.

use serde::{Deserialize, Serialize};

/// How a listening endpoint decides the role of a new connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HandshakeMode {
    /// Register as an anonymous device with a fresh identity on connect.
    EagerDevice,
    /// Register as an observer on connect.
    EagerObserver,
    /// Stay unclassified until a handshake message is recognised.
    Lazy,
}

/// One WebSocket accept point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSettings {
    pub path: String,
    pub handshake: HandshakeMode,
}

/// Server network and connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` picks a free port).
    pub port: u16,
    /// Per-connection outbound queue capacity.
    pub max_send_queue: usize,
    /// WebSocket ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Connections silent for longer than this are closed.
    pub client_timeout_secs: u64,
    /// WebSocket accept points.
    pub endpoints: Vec<EndpointSettings>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_send_queue: 256,
            heartbeat_interval_secs: 30,
            client_timeout_secs: 90,
            endpoints: vec![
                EndpointSettings {
                    path: "/device".into(),
                    handshake: HandshakeMode::EagerDevice,
                },
                EndpointSettings {
                    path: "/observer".into(),
                    handshake: HandshakeMode::EagerObserver,
                },
                EndpointSettings {
                    path: "/ws".into(),
                    handshake: HandshakeMode::Lazy,
                },
            ],
        }
    }
}

/// Device identity settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSettings {
    /// Prefix for server-assigned identities (`dev` → `dev1`, `dev2`, ...).
    pub identity_prefix: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            identity_prefix: "dev".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_cover_all_modes() {
        let s = ServerSettings::default();
        let modes: Vec<HandshakeMode> = s.endpoints.iter().map(|e| e.handshake).collect();
        assert_eq!(
            modes,
            vec![
                HandshakeMode::EagerDevice,
                HandshakeMode::EagerObserver,
                HandshakeMode::Lazy
            ]
        );
    }

    #[test]
    fn handshake_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&HandshakeMode::EagerDevice).unwrap(),
            "\"eagerDevice\""
        );
        let m: HandshakeMode = serde_json::from_str("\"lazy\"").unwrap();
        assert_eq!(m, HandshakeMode::Lazy);
    }

    #[test]
    fn partial_server_json_uses_defaults() {
        let s: ServerSettings = serde_json::from_str(r#"{"port": 8080}"#).unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.endpoints.len(), 3);
    }

    #[test]
    fn default_identity_prefix() {
        assert_eq!(DeviceSettings::default().identity_prefix, "dev");
    }
}
