use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::RelayError;

/// Longest identity a device may announce for itself.
pub const MAX_DEVICE_ID_LEN: usize = 64;

/// Identifier of one transport connection, unique for the process lifetime.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry key of a device.
///
/// Either announced by the device itself (validated by [`DeviceId::parse`])
/// or assigned by the registry from its monotonic counter.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate a self-announced identity: 1..=64 chars of `[A-Za-z0-9_.-]`.
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_DEVICE_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if valid {
            Ok(Self(raw.to_owned()))
        } else {
            Err(RelayError::InvalidIdentity(raw.to_owned()))
        }
    }

    /// Server-assigned identity, e.g. `dev3`.
    pub fn assigned(prefix: &str, seq: u64) -> Self {
        Self(format!("{prefix}{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = RelayError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_has_prefix() {
        let id = ConnectionId::new();
        assert!(id.as_str().starts_with("conn_"), "got: {id}");
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn assigned_device_id_uses_prefix_and_sequence() {
        assert_eq!(DeviceId::assigned("dev", 1).as_str(), "dev1");
        assert_eq!(DeviceId::assigned("esp", 12).as_str(), "esp12");
    }

    #[test]
    fn parse_accepts_reasonable_names() {
        for raw in ["kitchen", "esp-32.a", "node_7", "A"] {
            assert_eq!(DeviceId::parse(raw).unwrap().as_str(), raw);
        }
    }

    #[test]
    fn parse_rejects_empty_spaces_and_overlong() {
        assert!(DeviceId::parse("").is_err());
        assert!(DeviceId::parse("two words").is_err());
        assert!(DeviceId::parse("slash/y").is_err());
        assert!(DeviceId::parse(&"x".repeat(MAX_DEVICE_ID_LEN + 1)).is_err());
        assert!(DeviceId::parse(&"x".repeat(MAX_DEVICE_ID_LEN)).is_ok());
    }

    #[test]
    fn from_str_goes_through_validation() {
        let ok: Result<DeviceId, _> = "dev1".parse();
        assert!(ok.is_ok());
        let bad: Result<DeviceId, _> = "dev 1".parse();
        assert!(matches!(bad, Err(RelayError::InvalidIdentity(_))));
    }

    #[test]
    fn device_id_serializes_transparently() {
        let id = DeviceId::assigned("dev", 4);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dev4\"");
    }
}
