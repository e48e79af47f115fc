//! Device kind: which family of appliance a device belongs to.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DeviceStatus;

/// The appliance family of a device. Determines its statuses and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Light,
    WaterHeater,
    AirConditioner,
    DoorLock,
    Curtain,
}

impl DeviceKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Light,
        Self::WaterHeater,
        Self::AirConditioner,
        Self::DoorLock,
        Self::Curtain,
    ];

    /// Wire representation, as stored in the `type` field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::WaterHeater => "water_heater",
            Self::AirConditioner => "air_conditioner",
            Self::DoorLock => "door_lock",
            Self::Curtain => "curtain",
        }
    }

    /// Statuses a device of this kind may take.
    #[must_use]
    pub fn statuses(self) -> &'static [DeviceStatus] {
        match self {
            Self::Light | Self::WaterHeater | Self::AirConditioner => {
                &[DeviceStatus::On, DeviceStatus::Off]
            }
            Self::DoorLock => &[DeviceStatus::Locked, DeviceStatus::Unlocked],
            Self::Curtain => &[DeviceStatus::Open, DeviceStatus::Closed],
        }
    }

    /// The status a device of this kind falls back to when it stops being used.
    #[must_use]
    pub fn resting_status(self) -> DeviceStatus {
        match self {
            Self::Light | Self::WaterHeater | Self::AirConditioner => DeviceStatus::Off,
            Self::DoorLock => DeviceStatus::Unlocked,
            Self::Curtain => DeviceStatus::Open,
        }
    }

    /// Whether `status` is valid for this kind.
    #[must_use]
    pub fn accepts(self, status: DeviceStatus) -> bool {
        self.statuses().contains(&status)
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name any known kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device type '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for DeviceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_every_kind_from_its_wire_name() {
        for kind in DeviceKind::ALL {
            assert_eq!(kind.as_str().parse::<DeviceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn should_reject_unknown_kind() {
        assert!("microwave".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn should_restrict_door_lock_to_lock_statuses() {
        assert!(DeviceKind::DoorLock.accepts(DeviceStatus::Locked));
        assert!(!DeviceKind::DoorLock.accepts(DeviceStatus::On));
    }

    #[test]
    fn should_rest_in_a_status_that_is_not_on_like() {
        for kind in DeviceKind::ALL {
            let resting = kind.resting_status();
            assert!(kind.accepts(resting));
            assert!(!resting.is_on_like());
        }
    }

    #[test]
    fn should_offer_exactly_one_on_like_status_per_kind() {
        for kind in DeviceKind::ALL {
            let on_like = kind.statuses().iter().filter(|s| s.is_on_like()).count();
            assert_eq!(on_like, 1, "{kind}");
        }
    }

    #[test]
    fn should_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&DeviceKind::AirConditioner).unwrap(),
            "\"air_conditioner\""
        );
    }
}
