//! Wire formats exchanged with devices and observers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::RelayError;
use crate::ids::DeviceId;

/// JSON envelopes the relay sends to peers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RelayEvent {
    /// Unstructured device output, forwarded verbatim.
    Sensor { device_id: DeviceId, message: String },
    /// Structured device output merged with its classification.
    Telemetry {
        device_id: DeviceId,
        data: Map<String, Value>,
    },
    /// Handshake acknowledgement.
    Welcome {
        role: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        device_id: Option<DeviceId>,
    },
    /// An addressed command reached its device queue.
    CommandAck { device_id: DeviceId, command: String },
    Error { code: &'static str, message: String },
}

impl RelayEvent {
    pub fn error(err: &RelayError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Desired actuator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandState {
    On,
    Off,
}

impl CommandState {
    /// Text the device firmware understands.
    pub fn wire(self) -> &'static str {
        match self {
            Self::On => "LED_ON",
            Self::Off => "LED_OFF",
        }
    }
}

impl FromStr for CommandState {
    type Err = RelayError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(RelayError::InvalidCommand(format!(
                "state must be \"on\" or \"off\", got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
        })
    }
}

/// A command addressed to exactly one device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCommand {
    pub target: DeviceId,
    pub state: CommandState,
}

impl DeviceCommand {
    pub fn new(target: DeviceId, state: CommandState) -> Self {
        Self { target, state }
    }

    /// Recognise an addressed command in an observer message.
    ///
    /// `None` means the message is not addressed (no `identity`/`id` field,
    /// or not a JSON object) and should be broadcast to all devices.
    pub fn from_observer_message(text: &str) -> Option<Result<Self, RelayError>> {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) else {
            return None;
        };
        let target = map.get("identity").or_else(|| map.get("id"))?;
        Some(Self::from_fields(target, map.get("state")))
    }

    fn from_fields(target: &Value, state: Option<&Value>) -> Result<Self, RelayError> {
        let target = target
            .as_str()
            .ok_or_else(|| RelayError::InvalidCommand("identity must be a string".into()))?;
        let target = DeviceId::parse(target)?;
        let state = state
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::InvalidCommand("missing state".into()))?
            .parse()?;
        Ok(Self { target, state })
    }
}
