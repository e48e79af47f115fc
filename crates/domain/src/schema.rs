//! Schema registry: per-kind status and parameter rule tables.
//!
//! The registry is built once at startup from a [`SchemaConfig`] and is
//! immutable afterwards. Validation and metrics both read from it, so a
//! parameter is checked and recorded according to the same rule.

use serde::Deserialize;

use crate::device::{DeviceKind, DeviceStatus};
use crate::metric::MetricBinding;

/// Inclusive integer bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Bounds {
    pub min: i64,
    pub max: i64,
}

impl Bounds {
    #[must_use]
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Startup-configurable numeric bounds (`[schema]` config section).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub light_brightness: Bounds,
    pub water_heater_temperature: Bounds,
    pub water_heater_target_temperature: Bounds,
    pub air_conditioner_temperature: Bounds,
    pub door_lock_battery_level: Bounds,
    pub curtain_position: Bounds,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            light_brightness: Bounds::new(0, 100),
            water_heater_temperature: Bounds::new(0, 100),
            water_heater_target_temperature: Bounds::new(49, 60),
            air_conditioner_temperature: Bounds::new(16, 30),
            door_lock_battery_level: Bounds::new(0, 100),
            curtain_position: Bounds::new(0, 100),
        }
    }
}

impl SchemaConfig {
    /// Check that every range is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaConfigError::InvertedBounds`] for the first range whose
    /// `min` exceeds its `max`.
    pub fn validate(&self) -> Result<(), SchemaConfigError> {
        let ranges = [
            ("light_brightness", self.light_brightness),
            ("water_heater_temperature", self.water_heater_temperature),
            (
                "water_heater_target_temperature",
                self.water_heater_target_temperature,
            ),
            (
                "air_conditioner_temperature",
                self.air_conditioner_temperature,
            ),
            ("door_lock_battery_level", self.door_lock_battery_level),
            ("curtain_position", self.curtain_position),
        ];
        match ranges.iter().find(|(_, bounds)| bounds.min > bounds.max) {
            Some(&(range, Bounds { min, max })) => {
                Err(SchemaConfigError::InvertedBounds { range, min, max })
            }
            None => Ok(()),
        }
    }
}

/// A `[schema]` section that cannot produce a usable registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaConfigError {
    #[error("schema.{range}: min ({min}) must not exceed max ({max})")]
    InvertedBounds {
        range: &'static str,
        min: i64,
        max: i64,
    },
}

pub const AC_MODES: &[&str] = &["cool", "heat", "fan"];
pub const AC_FAN_SPEEDS: &[&str] = &["off", "low", "medium", "high"];
pub const AC_SWING_MODES: &[&str] = &["off", "on", "auto"];

/// Shape a parameter value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer(Bounds),
    Boolean,
    OneOf(&'static [&'static str]),
    TimeOfDay,
    HexColor,
}

/// Rule for a single parameter of a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterRule {
    pub key: &'static str,
    pub value: ValueKind,
    pub metric: MetricBinding,
}

impl ParameterRule {
    const fn new(key: &'static str, value: ValueKind, metric: MetricBinding) -> Self {
        Self { key, value, metric }
    }
}

/// Statuses and parameter rules of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSchema {
    pub kind: DeviceKind,
    pub parameters: Vec<ParameterRule>,
}

impl KindSchema {
    /// Statuses a device of this kind may take.
    #[must_use]
    pub fn statuses(&self) -> &'static [DeviceStatus] {
        self.kind.statuses()
    }

    /// Look up the rule for a parameter key.
    #[must_use]
    pub fn rule(&self, key: &str) -> Option<&ParameterRule> {
        self.parameters.iter().find(|rule| rule.key == key)
    }

    /// Allowed parameter keys, sorted.
    #[must_use]
    pub fn allowed_keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.parameters.iter().map(|rule| rule.key).collect();
        keys.sort_unstable();
        keys
    }
}

/// Rule tables for every kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    light: KindSchema,
    water_heater: KindSchema,
    air_conditioner: KindSchema,
    door_lock: KindSchema,
    curtain: KindSchema,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(&SchemaConfig::default())
    }
}

impl SchemaRegistry {
    /// Build the rule tables with the configured bounds.
    #[must_use]
    pub fn new(config: &SchemaConfig) -> Self {
        use MetricBinding as M;
        use ValueKind as V;

        let light = KindSchema {
            kind: DeviceKind::Light,
            parameters: vec![
                ParameterRule::new(
                    "brightness",
                    V::Integer(config.light_brightness),
                    M::Gauge {
                        metric: "light_brightness",
                        label_from: Some("is_dimmable"),
                    },
                ),
                ParameterRule::new(
                    "color",
                    V::HexColor,
                    M::Color {
                        metric: "light_color",
                        label_from: Some("dynamic_color"),
                    },
                ),
                ParameterRule::new("is_dimmable", V::Boolean, M::Untracked),
                ParameterRule::new("dynamic_color", V::Boolean, M::Untracked),
            ],
        };
        let water_heater = KindSchema {
            kind: DeviceKind::WaterHeater,
            parameters: vec![
                ParameterRule::new(
                    "temperature",
                    V::Integer(config.water_heater_temperature),
                    M::Gauge {
                        metric: "water_heater_temperature",
                        label_from: None,
                    },
                ),
                ParameterRule::new(
                    "target_temperature",
                    V::Integer(config.water_heater_target_temperature),
                    M::Gauge {
                        metric: "water_heater_target_temperature",
                        label_from: None,
                    },
                ),
                ParameterRule::new(
                    "is_heating",
                    V::Boolean,
                    M::Flag("water_heater_is_heating_status"),
                ),
                ParameterRule::new(
                    "timer_enabled",
                    V::Boolean,
                    M::Flag("water_heater_timer_enabled_status"),
                ),
                ParameterRule::new(
                    "scheduled_on",
                    V::TimeOfDay,
                    M::Schedule("water_heater_schedule_info"),
                ),
                ParameterRule::new(
                    "scheduled_off",
                    V::TimeOfDay,
                    M::Schedule("water_heater_schedule_info"),
                ),
            ],
        };
        let air_conditioner = KindSchema {
            kind: DeviceKind::AirConditioner,
            parameters: vec![
                ParameterRule::new(
                    "temperature",
                    V::Integer(config.air_conditioner_temperature),
                    M::Gauge {
                        metric: "ac_temperature",
                        label_from: None,
                    },
                ),
                ParameterRule::new("mode", V::OneOf(AC_MODES), M::OneHot("ac_mode_status")),
                ParameterRule::new(
                    "fan_speed",
                    V::OneOf(AC_FAN_SPEEDS),
                    M::OneHot("ac_fan_status"),
                ),
                ParameterRule::new(
                    "swing",
                    V::OneOf(AC_SWING_MODES),
                    M::OneHot("ac_swing_status"),
                ),
            ],
        };
        let door_lock = KindSchema {
            kind: DeviceKind::DoorLock,
            parameters: vec![
                ParameterRule::new("auto_lock_enabled", V::Boolean, M::Untracked),
                ParameterRule::new(
                    "battery_level",
                    V::Integer(config.door_lock_battery_level),
                    M::Gauge {
                        metric: "lock_battery_level",
                        label_from: None,
                    },
                ),
            ],
        };
        let curtain = KindSchema {
            kind: DeviceKind::Curtain,
            parameters: vec![ParameterRule::new(
                "position",
                V::Integer(config.curtain_position),
                M::Untracked,
            )],
        };

        Self {
            light,
            water_heater,
            air_conditioner,
            door_lock,
            curtain,
        }
    }

    /// Rule table of a kind.
    #[must_use]
    pub fn schema(&self, kind: DeviceKind) -> &KindSchema {
        match kind {
            DeviceKind::Light => &self.light,
            DeviceKind::WaterHeater => &self.water_heater,
            DeviceKind::AirConditioner => &self.air_conditioner,
            DeviceKind::DoorLock => &self.door_lock,
            DeviceKind::Curtain => &self.curtain,
        }
    }
}
