//! Device status: the type-dependent operational state of a device.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operational status of a device.
///
/// Which variants are valid depends on the [`DeviceKind`](super::DeviceKind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    On,
    Off,
    Locked,
    Unlocked,
    Open,
    Closed,
}

impl DeviceStatus {
    /// Statuses counted as "in use" by the usage analytics.
    #[must_use]
    pub fn is_on_like(self) -> bool {
        matches!(self, Self::On | Self::Locked | Self::Closed)
    }

    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name any known status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for DeviceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "locked" => Ok(Self::Locked),
            "unlocked" => Ok(Self::Unlocked),
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
