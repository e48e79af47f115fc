//! Usage ports: interval lists, seen-device markers, counters and gauges.
//!
//! These are the durable side of the metrics recorder and the analytics
//! engine. A single backing store usually implements all of them, which the
//! [`UsageStore`] umbrella trait captures.

use std::future::Future;

use smarthub_domain::error::SmartHubError;
use smarthub_domain::id::DeviceId;
use smarthub_domain::metric::{DeviceLabels, GaugeSample, MetricsSnapshot, UsageCounter};
use smarthub_domain::time::Timestamp;
use smarthub_domain::usage::UsageWindow;

/// Ordered list of encoded on-intervals per device.
///
/// Entries are opaque strings here; mutations are whole-entry replacements.
pub trait IntervalStore {
    /// Append an entry at the end of the device's list.
    fn push_interval(
        &self,
        device_id: &DeviceId,
        entry: String,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send;

    /// Every entry of the device's list, oldest first.
    fn intervals(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Vec<String>, SmartHubError>> + Send;

    /// Every device with at least one entry, ordered by id.
    fn devices_with_intervals(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceId>, SmartHubError>> + Send;

    /// Replace the last entry of the device's list.
    ///
    /// Returns `false` when the list is empty.
    fn replace_last_interval(
        &self,
        device_id: &DeviceId,
        entry: String,
    ) -> impl Future<Output = Result<bool, SmartHubError>> + Send;
}

/// Set of devices whose baseline metrics have been initialised.
pub trait SeenDevices {
    fn is_seen(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<bool, SmartHubError>> + Send;

    fn mark_seen(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send;

    fn forget(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send;

    fn seen_devices(&self) -> impl Future<Output = Result<Vec<DeviceId>, SmartHubError>> + Send;
}

/// Write side of the per-device counters and gauges.
pub trait MetricsSink {
    /// Add `amount` to a counter. An amount of zero only makes the series exist.
    fn increment_counter(
        &self,
        counter: UsageCounter,
        labels: &DeviceLabels,
        amount: f64,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send;

    /// Overwrite the current value of each gauge series.
    fn set_gauges(
        &self,
        samples: Vec<GaugeSample>,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send;
}

/// Read side of the counters: increase over a time window.
pub trait CounterHistory {
    /// Increase of `counter` within `window`, per device, ordered by device id.
    fn increase(
        &self,
        counter: UsageCounter,
        window: UsageWindow,
    ) -> impl Future<Output = Result<Vec<(DeviceId, f64)>, SmartHubError>> + Send;
}

/// Read side of the counters and gauges: their current values.
pub trait MetricsSource {
    fn snapshot(&self) -> impl Future<Output = Result<MetricsSnapshot, SmartHubError>> + Send;
}

/// Everything the metrics recorder and the analytics engine need.
pub trait UsageStore:
    IntervalStore + SeenDevices + MetricsSink + CounterHistory + MetricsSource
{
}

impl<T> UsageStore for T where
    T: IntervalStore + SeenDevices + MetricsSink + CounterHistory + MetricsSource
{
}
