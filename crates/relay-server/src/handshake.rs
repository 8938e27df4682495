//! Role classification of new connections.
//!
//! Eager endpoints decide the role at accept time. Lazy endpoints wait for
//! a handshake message:
//!
//! | message | role |
//! |---|---|
//! | `{"type":"hello","role":"device","id":"kitchen"}` | device `kitchen` |
//! | `{"type":"hello","role":"device"}` | device, server-assigned identity |
//! | `DEVICE:kitchen` / `DEVICE` | same, text form |
//! | `{"type":"hello","role":"observer"}` / `OBSERVER` | observer |

use std::sync::Arc;

use relay_core::messages::RelayEvent;
use relay_core::{DeviceId, RelayError, Role};
use relay_settings::HandshakeMode;
use serde::Deserialize;
use tracing::{info, warn};

use crate::connection::Connection;
use crate::registry::ConnectionRegistry;

/// A recognised announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Announcement {
    /// `None` asks the registry to assign an identity.
    Device(Option<DeviceId>),
    Observer,
}

#[derive(Deserialize)]
struct Hello {
    #[serde(rename = "type")]
    kind: String,
    role: String,
    #[serde(default, alias = "identity")]
    id: Option<String>,
}

/// Recognise a handshake message.
///
/// `Ok(None)` means the message is not a handshake at all; an announcement
/// with an unusable identity is an error.
pub fn parse_announcement(text: &str) -> Result<Option<Announcement>, RelayError> {
    let text = text.trim();
    if text.starts_with('{') {
        let Ok(hello) = serde_json::from_str::<Hello>(text) else {
            return Ok(None);
        };
        if !hello.kind.eq_ignore_ascii_case("hello") {
            return Ok(None);
        }
        return announcement_for(&hello.role, hello.id.as_deref());
    }

    match text.split_once(':') {
        Some((keyword, id)) => announcement_for(keyword, Some(id.trim())),
        None => announcement_for(text, None),
    }
}

fn announcement_for(role: &str, id: Option<&str>) -> Result<Option<Announcement>, RelayError> {
    if role.eq_ignore_ascii_case("device") {
        let id = id.map(DeviceId::parse).transpose()?;
        Ok(Some(Announcement::Device(id)))
    } else if role.eq_ignore_ascii_case("observer") && id.is_none() {
        Ok(Some(Announcement::Observer))
    } else {
        Ok(None)
    }
}

/// Role decided at accept time for `mode`, registering the connection.
pub fn accept(registry: &ConnectionRegistry, conn: &Arc<Connection>, mode: HandshakeMode) -> Role {
    let role = match mode {
        HandshakeMode::EagerDevice => Role::Device(registry.register_anonymous_device(conn)),
        HandshakeMode::EagerObserver => {
            let _ = registry.register(conn, Role::Observer);
            Role::Observer
        }
        HandshakeMode::Lazy => Role::Unclassified,
    };
    info!(conn_id = %conn.id, role = %role, ?mode, "connection accepted");
    role
}

/// Lazy classification of one inbound message from an unclassified connection.
///
/// On success the connection is registered and greeted. On failure the
/// message is dropped and the connection stays unclassified.
pub fn classify(registry: &ConnectionRegistry, conn: &Arc<Connection>, text: &str) -> Role {
    let announcement = match parse_announcement(text) {
        Ok(Some(a)) => a,
        Ok(None) => {
            warn!(conn_id = %conn.id, len = text.len(), "unrecognised handshake, dropping message");
            return Role::Unclassified;
        }
        Err(e) => {
            warn!(conn_id = %conn.id, error = %e, "rejected handshake, dropping message");
            let _ = conn.send_event(&RelayEvent::error(&e));
            return Role::Unclassified;
        }
    };

    let role = match announcement {
        Announcement::Device(Some(id)) => {
            let _ = registry.register(conn, Role::Device(id.clone()));
            Role::Device(id)
        }
        Announcement::Device(None) => Role::Device(registry.register_anonymous_device(conn)),
        Announcement::Observer => {
            let _ = registry.register(conn, Role::Observer);
            Role::Observer
        }
    };
    info!(conn_id = %conn.id, role = %role, "connection classified");

    let _ = conn.send_event(&RelayEvent::Welcome {
        role: role.label(),
        device_id: role.device_id().cloned(),
    });
    role
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(raw: &str) -> DeviceId {
        DeviceId::parse(raw).unwrap()
    }

    #[test]
    fn json_device_hello_with_id() {
        let a = parse_announcement(r#"{"type":"hello","role":"device","id":"kitchen"}"#).unwrap();
        assert_eq!(a, Some(Announcement::Device(Some(dev("kitchen")))));
    }

    #[test]
    fn json_device_hello_without_id() {
        let a = parse_announcement(r#"{"type":"hello","role":"device"}"#).unwrap();
        assert_eq!(a, Some(Announcement::Device(None)));
    }

    #[test]
    fn json_observer_hello() {
        let a = parse_announcement(r#" {"type":"Hello","role":"OBSERVER"} "#).unwrap();
        assert_eq!(a, Some(Announcement::Observer));
    }

    #[test]
    fn text_tokens() {
        assert_eq!(
            parse_announcement("DEVICE:porch").unwrap(),
            Some(Announcement::Device(Some(dev("porch"))))
        );
        assert_eq!(parse_announcement("device").unwrap(), Some(Announcement::Device(None)));
        assert_eq!(parse_announcement("OBSERVER\n").unwrap(), Some(Announcement::Observer));
    }

    #[test]
    fn non_handshakes_are_not_recognised() {
        for text in ["42", "hello", r#"{"temp": 3}"#, r#"{"type":"data","role":"device"}"#, "OBSERVER:x", ""] {
            assert_eq!(parse_announcement(text).unwrap(), None, "text: {text:?}");
        }
    }

    #[test]
    fn bad_identity_is_an_error() {
        assert!(matches!(
            parse_announcement("DEVICE:has space"),
            Err(RelayError::InvalidIdentity(_))
        ));
        assert!(parse_announcement("DEVICE:").is_err());
    }

    #[test]
    fn eager_device_gets_fresh_identity() {
        let reg = ConnectionRegistry::new("dev", 8);
        let (c1, _r1) = reg.connect();
        let (c2, _r2) = reg.connect();
        assert_eq!(accept(&reg, &c1, HandshakeMode::EagerDevice), Role::Device(dev("dev1")));
        assert_eq!(accept(&reg, &c2, HandshakeMode::EagerDevice), Role::Device(dev("dev2")));
        assert_eq!(reg.device_count(), 2);
    }

    #[test]
    fn eager_observer_registers_immediately() {
        let reg = ConnectionRegistry::new("dev", 8);
        let (c, _r) = reg.connect();
        assert_eq!(accept(&reg, &c, HandshakeMode::EagerObserver), Role::Observer);
        assert_eq!(reg.observer_count(), 1);
    }

    #[test]
    fn lazy_accept_stays_pending() {
        let reg = ConnectionRegistry::new("dev", 8);
        let (c, _r) = reg.connect();
        assert_eq!(accept(&reg, &c, HandshakeMode::Lazy), Role::Unclassified);
        assert_eq!(reg.pending_count(), 1);
    }

    #[tokio::test]
    async fn classify_registers_and_welcomes() {
        let reg = ConnectionRegistry::new("dev", 8);
        let (c, mut rx) = reg.connect();
        let role = classify(&reg, &c, "DEVICE");
        assert_eq!(role, Role::Device(dev("dev1")));
        assert_eq!(reg.lookup_device(&dev("dev1")).unwrap().id, c.id);

        let welcome: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(welcome["type"], "welcome");
        assert_eq!(welcome["role"], "device");
        assert_eq!(welcome["deviceId"], "dev1");
    }

    #[test]
    fn lazy_anonymous_device_avoids_announced_identity() {
        let reg = ConnectionRegistry::new("dev", 8);
        let (named, _r1) = reg.connect();
        let (anon, _r2) = reg.connect();
        assert_eq!(classify(&reg, &named, "DEVICE:dev1"), Role::Device(dev("dev1")));
        assert_eq!(classify(&reg, &anon, "DEVICE"), Role::Device(dev("dev2")));
        assert_eq!(reg.lookup_device(&dev("dev1")).unwrap().id, named.id);
    }

    #[test]
    fn classify_failure_keeps_connection_pending() {
        let reg = ConnectionRegistry::new("dev", 8);
        let (c, mut rx) = reg.connect();
        assert_eq!(classify(&reg, &c, "random chatter"), Role::Unclassified);
        assert_eq!(reg.pending_count(), 1);
        assert!(rx.try_recv().is_err());

        // retried on the next message
        assert_eq!(classify(&reg, &c, "OBSERVER"), Role::Observer);
        assert_eq!(reg.pending_count(), 0);
    }

    #[test]
    fn rejected_identity_is_reported_to_peer() {
        let reg = ConnectionRegistry::new("dev", 8);
        let (c, mut rx) = reg.connect();
        assert_eq!(classify(&reg, &c, "DEVICE:bad id"), Role::Unclassified);
        let msg: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(msg["code"], "INVALID_IDENTITY");
    }
}
