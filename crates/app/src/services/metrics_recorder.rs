//! Metrics recorder: turns device changes into counters, gauges and intervals.

use std::sync::Arc;

use serde_json::Value;
use smarthub_domain::device::{Device, DeviceChanges, DeviceStatus};
use smarthub_domain::error::SmartHubError;
use smarthub_domain::id::DeviceId;
use smarthub_domain::metric::{
    self, DeviceLabels, GaugeSample, UsageCounter, metadata_samples, status_sample,
};
use smarthub_domain::schema::SchemaRegistry;
use smarthub_domain::time::Timestamp;

use crate::ports::UsageStore;
use crate::services::interval_tracker::IntervalTracker;

/// Records usage metrics for every device mutation.
pub struct MetricsRecorder<S> {
    store: Arc<S>,
    intervals: IntervalTracker<S>,
    schema: Arc<SchemaRegistry>,
}

impl<S> Clone for MetricsRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            intervals: self.intervals.clone(),
            schema: Arc::clone(&self.schema),
        }
    }
}

impl<S: UsageStore> MetricsRecorder<S> {
    pub fn new(store: Arc<S>, schema: Arc<SchemaRegistry>) -> Self {
        Self {
            intervals: IntervalTracker::new(Arc::clone(&store)),
            store,
            schema,
        }
    }

    /// Interval tracker sharing this recorder's store.
    pub fn intervals(&self) -> &IntervalTracker<S> {
        &self.intervals
    }

    /// Initialise the baseline metrics of a device the first time it is seen.
    ///
    /// Seeds both counters at zero, records the current status with the
    /// device as its own previous state, records every parameter, then marks
    /// the device as seen. Returns `false` if it was already seen.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the usage store.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id))]
    pub async fn initialize(&self, device: &Device, at: Timestamp) -> Result<bool, SmartHubError> {
        if self.store.is_seen(&device.id).await? {
            return Ok(false);
        }
        tracing::info!("device read for the first time, seeding its metrics");

        let labels = DeviceLabels::of(device);
        for counter in [UsageCounter::OnEvents, UsageCounter::UsageSeconds] {
            self.store.increment_counter(counter, &labels, 0.0, at).await?;
        }

        let mut samples = metadata_samples(device, "name", &device.name, &device.name);
        samples.extend(metadata_samples(device, "room", &device.room, &device.room));
        self.store.set_gauges(samples, at).await?;

        self.record_status_transition(device, device.status, at)
            .await?;
        for (key, value) in &device.parameters {
            self.record_parameter(device, key, value, at).await?;
        }

        self.store.mark_seen(&device.id).await?;
        Ok(true)
    }

    /// Record the metrics of an update, comparing `old` against `changes`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the usage store.
    #[tracing::instrument(skip(self, old, changes), fields(device_id = %old.id))]
    pub async fn record_update(
        &self,
        old: &Device,
        changes: &DeviceChanges,
        at: Timestamp,
    ) -> Result<(), SmartHubError> {
        let mut samples = Vec::new();
        if let Some(name) = &changes.name {
            samples.extend(metadata_samples(old, "name", &old.name, name));
        }
        if let Some(room) = &changes.room {
            samples.extend(metadata_samples(old, "room", &old.room, room));
        }
        if !samples.is_empty() {
            self.store.set_gauges(samples, at).await?;
        }

        if let Some(status) = changes.status {
            self.record_status_transition(old, status, at).await?;
        }

        if !changes.parameters.is_empty() {
            let merged = old.with_changes(changes);
            for (key, value) in &changes.parameters {
                self.record_parameter(&merged, key, value, at).await?;
            }
        }
        Ok(())
    }

    /// Record a status change of `device` (holding its previous status).
    ///
    /// Entering an on-like status from a resting one (or on first sight)
    /// opens an interval, and counts an on-event if the device was already
    /// seen. Leaving an on-like status closes the open interval and adds its
    /// duration to the usage counter.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the usage store.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id, from = %device.status))]
    pub async fn record_status_transition(
        &self,
        device: &Device,
        new_status: DeviceStatus,
        at: Timestamp,
    ) -> Result<(), SmartHubError> {
        let seen = self.store.is_seen(&device.id).await?;
        let was_on = device.status.is_on_like();
        let labels = DeviceLabels::of(device);

        if new_status.is_on_like() && (!seen || !was_on) {
            self.intervals.open(&device.id, at).await?;
            if seen {
                self.store
                    .increment_counter(UsageCounter::OnEvents, &labels, 1.0, at)
                    .await?;
            }
        }

        if !new_status.is_on_like()
            && was_on
            && let Some(closed) = self.intervals.close(&device.id, at).await?
            && let Some(seconds) = closed.seconds()
            && seconds > 0.0
        {
            self.store
                .increment_counter(UsageCounter::UsageSeconds, &labels, seconds, at)
                .await?;
        }

        self.store
            .set_gauges(vec![status_sample(device, new_status)], at)
            .await
    }

    /// Drop the seen marker of a removed device.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the usage store.
    pub async fn forget(&self, device_id: &DeviceId) -> Result<(), SmartHubError> {
        self.store.forget(device_id).await
    }

    async fn record_parameter(
        &self,
        device: &Device,
        key: &str,
        value: &Value,
        at: Timestamp,
    ) -> Result<(), SmartHubError> {
        let Some(rule) = self.schema.schema(device.kind).rule(key) else {
            tracing::warn!(device_id = %device.id, kind = %device.kind, key, "unknown parameter, not recorded");
            return Ok(());
        };
        let samples: Vec<GaugeSample> = metric::parameter_samples(device, rule, value);
        if samples.is_empty() {
            return Ok(());
        }
        self.store.set_gauges(samples, at).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use smarthub_domain::device::DeviceKind;
    use smarthub_domain::interval::OnInterval;

    use super::*;
    use crate::test_support::InMemoryUsageStore;

    fn at(hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn recorder() -> (Arc<InMemoryUsageStore>, MetricsRecorder<InMemoryUsageStore>) {
        let store = Arc::new(InMemoryUsageStore::default());
        let recorder = MetricsRecorder::new(Arc::clone(&store), Arc::new(SchemaRegistry::default()));
        (store, recorder)
    }

    fn lamp(status: DeviceStatus) -> Device {
        Device::builder()
            .id("lamp")
            .kind(DeviceKind::Light)
            .room("Office")
            .name("Desk lamp")
            .status(status)
            .parameter("brightness", 40)
            .parameter("is_dimmable", true)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_seed_counters_and_mark_seen_on_first_read() {
        let (store, recorder) = recorder();

        assert!(recorder.initialize(&lamp(DeviceStatus::Off), at(8)).await.unwrap());

        assert!(store.has_counter(UsageCounter::OnEvents, "lamp"));
        assert!(store.has_counter(UsageCounter::UsageSeconds, "lamp"));
        assert!(store.counter_total(UsageCounter::OnEvents, "lamp").abs() < f64::EPSILON);
        assert!(store.is_marked_seen("lamp"));
        assert_eq!(
            store.gauge("light_brightness", &[("device_id", "lamp"), ("is_dimmable", "True")]),
            Some(40.0)
        );
        assert_eq!(
            store.gauge("device_metadata", &[("device_id", "lamp"), ("key", "room"), ("value", "Office")]),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn should_initialize_only_once() {
        let (_, recorder) = recorder();
        let device = lamp(DeviceStatus::Off);

        assert!(recorder.initialize(&device, at(8)).await.unwrap());
        assert!(!recorder.initialize(&device, at(9)).await.unwrap());
    }

    #[tokio::test]
    async fn should_open_interval_without_event_when_first_seen_on() {
        let (store, recorder) = recorder();

        recorder.initialize(&lamp(DeviceStatus::On), at(8)).await.unwrap();

        assert_eq!(store.raw_intervals("lamp"), vec![OnInterval::open(at(8)).encode()]);
        assert!(store.counter_total(UsageCounter::OnEvents, "lamp").abs() < f64::EPSILON);
        assert_eq!(
            store.gauge("device_status", &[("device_id", "lamp"), ("device_type", "light")]),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn should_count_usage_of_on_off_cycle() {
        let (store, recorder) = recorder();
        let off = lamp(DeviceStatus::Off);
        recorder.initialize(&off, at(8)).await.unwrap();

        recorder
            .record_status_transition(&off, DeviceStatus::On, at(9))
            .await
            .unwrap();
        recorder
            .record_status_transition(&lamp(DeviceStatus::On), DeviceStatus::Off, at(11))
            .await
            .unwrap();

        assert!((store.counter_total(UsageCounter::OnEvents, "lamp") - 1.0).abs() < f64::EPSILON);
        assert!(
            (store.counter_total(UsageCounter::UsageSeconds, "lamp") - 7200.0).abs() < f64::EPSILON
        );
        assert_eq!(
            store.gauge("device_status", &[("device_id", "lamp"), ("device_type", "light")]),
            Some(0.0)
        );
    }

    #[tokio::test]
    async fn should_ignore_repeated_on() {
        let (store, recorder) = recorder();
        let on = lamp(DeviceStatus::On);
        recorder.initialize(&on, at(8)).await.unwrap();

        recorder
            .record_status_transition(&on, DeviceStatus::On, at(9))
            .await
            .unwrap();

        assert_eq!(store.raw_intervals("lamp").len(), 1);
        assert!(store.counter_total(UsageCounter::OnEvents, "lamp").abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn should_record_changed_parameters_with_merged_labels() {
        let (store, recorder) = recorder();
        let old = lamp(DeviceStatus::Off);
        let changes = DeviceChanges::from_document(&json!({
            "parameters": { "brightness": 90, "is_dimmable": false }
        }))
        .unwrap();

        recorder.record_update(&old, &changes, at(10)).await.unwrap();

        assert_eq!(
            store.gauge("light_brightness", &[("device_id", "lamp"), ("is_dimmable", "False")]),
            Some(90.0)
        );
    }

    #[tokio::test]
    async fn should_retire_old_metadata_value() {
        let (store, recorder) = recorder();
        let old = lamp(DeviceStatus::Off);
        let changes = DeviceChanges::from_document(&json!({ "room": "Kitchen" })).unwrap();

        recorder.record_update(&old, &changes, at(10)).await.unwrap();

        assert_eq!(
            store.gauge("device_metadata", &[("device_id", "lamp"), ("key", "room"), ("value", "Office")]),
            Some(0.0)
        );
        assert_eq!(
            store.gauge("device_metadata", &[("device_id", "lamp"), ("key", "room"), ("value", "Kitchen")]),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn should_skip_unknown_parameters() {
        let (store, recorder) = recorder();
        let mut device = lamp(DeviceStatus::Off);
        device.parameters.insert("legacy".to_string(), json!(1));

        assert!(recorder.initialize(&device, at(8)).await.unwrap());
        assert!(store.is_marked_seen("lamp"));
    }

    #[tokio::test]
    async fn should_forget_seen_marker() {
        let (store, recorder) = recorder();
        recorder.initialize(&lamp(DeviceStatus::Off), at(8)).await.unwrap();

        recorder.forget(&DeviceId::from("lamp")).await.unwrap();

        assert!(!store.is_marked_seen("lamp"));
    }
}
