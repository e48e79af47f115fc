//! In-memory port implementations shared by the service tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use smarthub_domain::device::{Device, DeviceChanges};
use smarthub_domain::error::SmartHubError;
use smarthub_domain::id::DeviceId;
use smarthub_domain::metric::{
    DeviceLabels, GaugeSample, MetricsSnapshot, SeriesValue, UsageCounter,
};
use smarthub_domain::time::Timestamp;
use smarthub_domain::usage::UsageWindow;

use crate::ports::{
    BusTransport, CounterHistory, DeviceRepository, IntervalStore, MetricsSink, MetricsSource,
    OutboundMessage, SeenDevices, SendError,
};

#[derive(Default)]
pub struct InMemoryDeviceRepo {
    store: Mutex<BTreeMap<DeviceId, Device>>,
}

impl DeviceRepository for InMemoryDeviceRepo {
    fn insert(&self, device: Device) -> impl Future<Output = Result<Device, SmartHubError>> + Send {
        self.store
            .lock()
            .unwrap()
            .insert(device.id.clone(), device.clone());
        async { Ok(device) }
    }

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, SmartHubError>> + Send {
        let result = self.store.lock().unwrap().get(id).cloned();
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, SmartHubError>> + Send {
        let result: Vec<Device> = self.store.lock().unwrap().values().cloned().collect();
        async { Ok(result) }
    }

    fn list_ids(&self) -> impl Future<Output = Result<Vec<DeviceId>, SmartHubError>> + Send {
        let result: Vec<DeviceId> = self.store.lock().unwrap().keys().cloned().collect();
        async { Ok(result) }
    }

    fn merge(
        &self,
        id: &DeviceId,
        changes: DeviceChanges,
    ) -> impl Future<Output = Result<Option<Device>, SmartHubError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = store.get_mut(id).map(|device| {
            *device = device.with_changes(&changes);
            device.clone()
        });
        async { Ok(result) }
    }

    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<bool, SmartHubError>> + Send {
        let removed = self.store.lock().unwrap().remove(id).is_some();
        async move { Ok(removed) }
    }
}

#[derive(Default)]
pub struct InMemoryUsageStore {
    intervals: Mutex<HashMap<DeviceId, Vec<String>>>,
    seen: Mutex<BTreeSet<DeviceId>>,
    counters: Mutex<Vec<(UsageCounter, DeviceLabels, f64, Timestamp)>>,
    gauges: Mutex<HashMap<(&'static str, Vec<(&'static str, String)>), f64>>,
}

impl InMemoryUsageStore {
    pub fn raw_intervals(&self, id: &str) -> Vec<String> {
        self.intervals
            .lock()
            .unwrap()
            .get(&DeviceId::from(id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_raw_intervals(&self, id: &str, entries: Vec<String>) {
        self.intervals
            .lock()
            .unwrap()
            .insert(DeviceId::from(id), entries);
    }

    pub fn counter_total(&self, counter: UsageCounter, id: &str) -> f64 {
        self.counters
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, labels, _, _)| *c == counter && labels.device_id == id)
            .map(|(_, _, amount, _)| amount)
            .sum()
    }

    pub fn has_counter(&self, counter: UsageCounter, id: &str) -> bool {
        self.counters
            .lock()
            .unwrap()
            .iter()
            .any(|(c, labels, _, _)| *c == counter && labels.device_id == id)
    }

    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.gauges
            .lock()
            .unwrap()
            .iter()
            .find(|((gauge, series), _)| {
                *gauge == name
                    && series.len() == labels.len()
                    && series
                        .iter()
                        .zip(labels)
                        .all(|((k, v), (ek, ev))| k == ek && v == ev)
            })
            .map(|(_, value)| *value)
    }

    pub fn is_marked_seen(&self, id: &str) -> bool {
        self.seen.lock().unwrap().contains(&DeviceId::from(id))
    }
}

impl IntervalStore for InMemoryUsageStore {
    fn push_interval(
        &self,
        device_id: &DeviceId,
        entry: String,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send {
        self.intervals
            .lock()
            .unwrap()
            .entry(device_id.clone())
            .or_default()
            .push(entry);
        async { Ok(()) }
    }

    fn intervals(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Vec<String>, SmartHubError>> + Send {
        let result = self
            .intervals
            .lock()
            .unwrap()
            .get(device_id)
            .cloned()
            .unwrap_or_default();
        async { Ok(result) }
    }

    fn devices_with_intervals(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceId>, SmartHubError>> + Send {
        let mut result: Vec<DeviceId> = self
            .intervals
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        result.sort();
        async { Ok(result) }
    }

    fn replace_last_interval(
        &self,
        device_id: &DeviceId,
        entry: String,
    ) -> impl Future<Output = Result<bool, SmartHubError>> + Send {
        let mut intervals = self.intervals.lock().unwrap();
        let replaced = match intervals.get_mut(device_id).and_then(|list| list.last_mut()) {
            Some(last) => {
                *last = entry;
                true
            }
            None => false,
        };
        async move { Ok(replaced) }
    }
}

impl SeenDevices for InMemoryUsageStore {
    fn is_seen(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<bool, SmartHubError>> + Send {
        let seen = self.seen.lock().unwrap().contains(device_id);
        async move { Ok(seen) }
    }

    fn mark_seen(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send {
        self.seen.lock().unwrap().insert(device_id.clone());
        async { Ok(()) }
    }

    fn forget(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send {
        self.seen.lock().unwrap().remove(device_id);
        async { Ok(()) }
    }

    fn seen_devices(&self) -> impl Future<Output = Result<Vec<DeviceId>, SmartHubError>> + Send {
        let result: Vec<DeviceId> = self.seen.lock().unwrap().iter().cloned().collect();
        async { Ok(result) }
    }
}

impl MetricsSink for InMemoryUsageStore {
    fn increment_counter(
        &self,
        counter: UsageCounter,
        labels: &DeviceLabels,
        amount: f64,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send {
        self.counters
            .lock()
            .unwrap()
            .push((counter, labels.clone(), amount, at));
        async { Ok(()) }
    }

    fn set_gauges(
        &self,
        samples: Vec<GaugeSample>,
        _at: Timestamp,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send {
        let mut gauges = self.gauges.lock().unwrap();
        for sample in samples {
            gauges.insert((sample.name, sample.labels), sample.value);
        }
        async { Ok(()) }
    }
}

impl CounterHistory for InMemoryUsageStore {
    fn increase(
        &self,
        counter: UsageCounter,
        window: UsageWindow,
    ) -> impl Future<Output = Result<Vec<(DeviceId, f64)>, SmartHubError>> + Send {
        let mut totals: BTreeMap<DeviceId, f64> = BTreeMap::new();
        for (c, labels, amount, at) in self.counters.lock().unwrap().iter() {
            if *c == counter && *at >= window.from && *at < window.to {
                *totals
                    .entry(DeviceId::from(labels.device_id.as_str()))
                    .or_default() += amount;
            }
        }
        async { Ok(totals.into_iter().collect()) }
    }
}

impl MetricsSource for InMemoryUsageStore {
    fn snapshot(&self) -> impl Future<Output = Result<MetricsSnapshot, SmartHubError>> + Send {
        let gauges = self
            .gauges
            .lock()
            .unwrap()
            .iter()
            .map(|((name, labels), value)| SeriesValue {
                name: (*name).to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.clone()))
                    .collect(),
                value: *value,
            })
            .collect();
        let mut totals: BTreeMap<(&'static str, String, String), f64> = BTreeMap::new();
        for (counter, labels, amount, _) in self.counters.lock().unwrap().iter() {
            let key = (
                counter.metric_name(),
                labels.device_id.clone(),
                labels.device_type.to_string(),
            );
            *totals.entry(key).or_default() += amount;
        }
        let counters = totals
            .into_iter()
            .map(|((name, device_id, device_type), value)| SeriesValue {
                name: name.to_string(),
                labels: BTreeMap::from([
                    ("device_id".to_string(), device_id),
                    ("device_type".to_string(), device_type),
                ]),
                value,
            })
            .collect();
        async { Ok(MetricsSnapshot { gauges, counters }) }
    }
}

/// Bus transport that records what it sends and can be switched off.
pub struct RecordingBus {
    connected: AtomicBool,
    failing: AtomicBool,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl Default for RecordingBus {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingBus {
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make every send fail with a transport error while still connected.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl BusTransport for RecordingBus {
    fn send(&self, message: &OutboundMessage) -> impl Future<Output = Result<(), SendError>> + Send {
        let result = if !self.connected.load(Ordering::SeqCst) {
            Err(SendError::Disconnected)
        } else if self.failing.load(Ordering::SeqCst) {
            Err(SendError::Transport("broker refused the publish".into()))
        } else {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        };
        async { result }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
