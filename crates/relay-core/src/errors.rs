use crate::ids::DeviceId;

/// Outcomes the relay core reports back to a command originator.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("invalid device identity: {0:?}")]
    InvalidIdentity(String),
    #[error("device unavailable: {0}")]
    Undeliverable(DeviceId),
}

impl RelayError {
    /// Stable code used in error envelopes sent to observers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            Self::InvalidCommand(_) => "INVALID_COMMAND",
            Self::InvalidIdentity(_) => "INVALID_IDENTITY",
            Self::Undeliverable(_) => "DEVICE_UNAVAILABLE",
        }
    }
}

/// A send to one recipient failed. Never aborts a fan-out.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("send queue full")]
    QueueFull,
    #[error("connection closed")]
    Closed,
    #[error("failed to encode message")]
    Encode,
}
