//! Metric vocabulary: counters, gauges and how parameters map onto them.
//!
//! The functions here only compute samples; writing them is the job of the
//! metrics port in the application layer.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::device::{Device, DeviceKind, DeviceStatus};
use crate::schema::{ParameterRule, ValueKind};
use crate::validation::parse_integer;

pub const DEVICE_STATUS: &str = "device_status";
pub const DEVICE_METADATA: &str = "device_metadata";
pub const LIGHT_COLOR_INFO: &str = "light_color_info";

/// Monotonic per-device counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageCounter {
    OnEvents,
    UsageSeconds,
}

impl UsageCounter {
    #[must_use]
    pub fn metric_name(self) -> &'static str {
        match self {
            Self::OnEvents => "device_on_events_total",
            Self::UsageSeconds => "device_usage_seconds_total",
        }
    }
}

/// How a parameter is exposed as gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricBinding {
    /// Numeric value, optionally labelled with a sibling parameter.
    Gauge {
        metric: &'static str,
        label_from: Option<&'static str>,
    },
    /// Boolean flag, one series per state with the current one at 1.
    Flag(&'static str),
    /// Enumerated value, one series per option with the current one at 1.
    OneHot(&'static str),
    /// Hex color exposed as an integer plus an info series.
    Color {
        metric: &'static str,
        label_from: Option<&'static str>,
    },
    /// Time-of-day schedule exposed as an info series.
    Schedule(&'static str),
    Untracked,
}

/// A single gauge write.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeSample {
    pub name: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

impl GaugeSample {
    fn new(name: &'static str, labels: Vec<(&'static str, String)>, value: f64) -> Self {
        Self {
            name,
            labels,
            value,
        }
    }
}

/// A stored series as read back from the metrics store.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesValue {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

/// Current value of every recorded series, for exposition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Latest value of each gauge series.
    pub gauges: Vec<SeriesValue>,
    /// Running total of each counter series since it was first seeded.
    pub counters: Vec<SeriesValue>,
}

/// Labels attached to the per-device counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLabels {
    pub device_id: String,
    pub device_type: DeviceKind,
}

impl DeviceLabels {
    #[must_use]
    pub fn of(device: &Device) -> Self {
        Self {
            device_id: device.id.to_string(),
            device_type: device.kind,
        }
    }
}

/// Status gauge: 1 while on-like, 0 otherwise.
#[must_use]
pub fn status_sample(device: &Device, status: DeviceStatus) -> GaugeSample {
    GaugeSample::new(
        DEVICE_STATUS,
        vec![
            ("device_id", device.id.to_string()),
            ("device_type", device.kind.to_string()),
        ],
        if status.is_on_like() { 1.0 } else { 0.0 },
    )
}

/// Metadata gauges for a `name`/`room` change: old value at 0, new value at 1.
///
/// When the value did not change only the current series is written.
#[must_use]
pub fn metadata_samples(device: &Device, key: &str, old: &str, new: &str) -> Vec<GaugeSample> {
    let series = |value: &str, level: f64| {
        GaugeSample::new(
            DEVICE_METADATA,
            vec![
                ("device_id", device.id.to_string()),
                ("key", key.to_string()),
                ("value", value.to_string()),
            ],
            level,
        )
    };
    if old == new {
        vec![series(new, 1.0)]
    } else {
        vec![series(old, 0.0), series(new, 1.0)]
    }
}

/// Gauges for one parameter of `device`, whose other parameters provide labels.
///
/// Values that do not fit the binding produce no sample.
#[must_use]
pub fn parameter_samples(device: &Device, rule: &ParameterRule, value: &Value) -> Vec<GaugeSample> {
    let device_id = || ("device_id", device.id.to_string());
    let sibling = |key: Option<&'static str>| {
        key.map(|key| {
            let label = device.parameter(key).map(label_text).unwrap_or_default();
            (key, label)
        })
    };

    match rule.metric {
        MetricBinding::Gauge { metric, label_from } => {
            let Some(number) = parse_integer(value) else {
                return Vec::new();
            };
            let mut labels = vec![device_id()];
            labels.extend(sibling(label_from));
            #[allow(clippy::cast_precision_loss)]
            let level = number as f64;
            vec![GaugeSample::new(metric, labels, level)]
        }
        MetricBinding::Flag(metric) => {
            let Some(flag) = value.as_bool() else {
                return Vec::new();
            };
            vec![
                GaugeSample::new(metric, vec![device_id(), ("state", bool_label(flag))], 1.0),
                GaugeSample::new(metric, vec![device_id(), ("state", bool_label(!flag))], 0.0),
            ]
        }
        MetricBinding::OneHot(metric) => {
            let (ValueKind::OneOf(options), Some(current)) = (rule.value, value.as_str()) else {
                return Vec::new();
            };
            options
                .iter()
                .map(|option| {
                    let level = if *option == current { 1.0 } else { 0.0 };
                    GaugeSample::new(metric, vec![device_id(), ("mode", (*option).to_string())], level)
                })
                .collect()
        }
        MetricBinding::Color { metric, label_from } => {
            let Some(raw) = value.as_str() else {
                return Vec::new();
            };
            let Some(rgb) = color_to_integer(raw) else {
                return Vec::new();
            };
            let mut labels = vec![device_id()];
            labels.extend(sibling(label_from));
            let mut info_labels = labels.clone();
            info_labels.push(("color", raw.to_string()));
            vec![
                GaugeSample::new(metric, labels, f64::from(rgb)),
                GaugeSample::new(LIGHT_COLOR_INFO, info_labels, 1.0),
            ]
        }
        MetricBinding::Schedule(metric) => {
            let current = |key: &str| {
                if key == rule.key {
                    label_text(value)
                } else {
                    device.parameter(key).map(label_text).unwrap_or_default()
                }
            };
            vec![GaugeSample::new(
                metric,
                vec![
                    device_id(),
                    ("scheduled_on", current("scheduled_on")),
                    ("scheduled_off", current("scheduled_off")),
                ],
                1.0,
            )]
        }
        MetricBinding::Untracked => Vec::new(),
    }
}

/// Convert `#RGB` or `#RRGGBB` into its 24-bit integer value.
#[must_use]
pub fn color_to_integer(raw: &str) -> Option<u32> {
    let digits = raw.strip_prefix('#')?;
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return None,
    };
    u32::from_str_radix(&expanded, 16).ok()
}

fn bool_label(flag: bool) -> String {
    String::from(if flag { "True" } else { "False" })
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => bool_label(*flag),
        other => other.to_string(),
    }
}
