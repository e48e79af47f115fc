//! Usage analytics: merging durable counters with live interval state.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::interval::OnInterval;
use crate::time::Timestamp;

/// Half-open time range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageWindow {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl UsageWindow {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `from` is not strictly before `to`.
    pub fn new(from: Timestamp, to: Timestamp) -> Result<Self, ValidationError> {
        if from >= to {
            return Err(ValidationError::single(format!(
                "analytics window start ({from}) must be before its end ({to})"
            )));
        }
        Ok(Self { from, to })
    }
}

/// Usage of a single device over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DeviceUsage {
    pub usage_minutes: f64,
    pub on_events: u64,
}

/// Aggregates over every device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub usage_minutes: f64,
    pub on_events: u64,
    pub known_devices: usize,
}

/// Result of an analytics query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub window: UsageWindow,
    pub devices: BTreeMap<DeviceId, DeviceUsage>,
    pub totals: UsageTotals,
}

/// Raw inputs of a report, as read from the counter and interval stores.
#[derive(Debug, Clone, Default)]
pub struct UsageInputs {
    /// Increase of the usage-seconds counter over the window, per device.
    pub usage_seconds: Vec<(DeviceId, f64)>,
    /// Increase of the on-events counter over the window, per device.
    pub on_events: Vec<(DeviceId, f64)>,
    /// Devices whose last interval is still open.
    pub open_intervals: Vec<(DeviceId, OnInterval)>,
    /// Number of devices with initialised metrics.
    pub known_devices: usize,
}

impl UsageReport {
    /// Combine counter increases with the not-yet-flushed time of open intervals.
    #[must_use]
    pub fn assemble(window: UsageWindow, inputs: UsageInputs, now: Timestamp) -> Self {
        let mut seconds: BTreeMap<DeviceId, f64> = BTreeMap::new();
        let mut events: BTreeMap<DeviceId, f64> = BTreeMap::new();

        for (id, increase) in inputs.usage_seconds {
            *seconds.entry(id).or_default() += increase.max(0.0);
        }
        for (id, increase) in inputs.on_events {
            *events.entry(id).or_default() += increase.max(0.0);
        }
        for (id, interval) in inputs.open_intervals {
            let live = interval.overlap_seconds(window.from, window.to, now);
            *seconds.entry(id).or_default() += live;
        }

        let mut devices: BTreeMap<DeviceId, DeviceUsage> = BTreeMap::new();
        for (id, total) in seconds {
            devices.entry(id).or_default().usage_minutes = total / 60.0;
        }
        for (id, total) in events {
            devices.entry(id).or_default().on_events = round_count(total);
        }

        let totals = UsageTotals {
            usage_minutes: devices.values().map(|usage| usage.usage_minutes).sum(),
            on_events: devices.values().map(|usage| usage.on_events).sum(),
            known_devices: inputs.known_devices,
        };

        Self {
            window,
            devices,
            totals,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_count(total: f64) -> u64 {
    total.round().max(0.0) as u64
}
