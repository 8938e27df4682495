use std::fmt;

use crate::ids::DeviceId;

/// Classification of a connection.
///
/// Only `Device` carries an identity, so "identity without device role"
/// cannot be expressed.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Unclassified,
    Device(DeviceId),
    Observer,
}

impl Role {
    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }

    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            Self::Device(id) => Some(id),
            _ => None,
        }
    }

    /// Short label for logs and wire acknowledgements.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Device(_) => "device",
            Self::Observer => "observer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(id) => write!(f, "device({id})"),
            other => f.write_str(other.label()),
        }
    }
}
