//! Port stubs for the router tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use smarthub_app::ports::{
    BusTransport, CounterHistory, DeviceRepository, IntervalStore, MetricsSink, MetricsSource,
    OutboundMessage, SeenDevices, SendError,
};
use smarthub_app::services::analytics_service::AnalyticsService;
use smarthub_app::services::device_service::DeviceService;
use smarthub_app::services::sync_service::SyncService;
use smarthub_domain::device::{Device, DeviceChanges};
use smarthub_domain::error::SmartHubError;
use smarthub_domain::id::DeviceId;
use smarthub_domain::metric::{
    DeviceLabels, GaugeSample, MetricsSnapshot, SeriesValue, UsageCounter,
};
use smarthub_domain::schema::SchemaRegistry;
use smarthub_domain::sync::Origin;
use smarthub_domain::time::Timestamp;
use smarthub_domain::usage::UsageWindow;

use crate::metrics::HttpMetrics;
use crate::state::AppState;

#[derive(Default)]
pub struct StubDeviceRepo(Mutex<BTreeMap<DeviceId, Device>>);

impl DeviceRepository for StubDeviceRepo {
    async fn insert(&self, device: Device) -> Result<Device, SmartHubError> {
        self.0
            .lock()
            .unwrap()
            .insert(device.id.clone(), device.clone());
        Ok(device)
    }

    async fn get_by_id(&self, id: &DeviceId) -> Result<Option<Device>, SmartHubError> {
        Ok(self.0.lock().unwrap().get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Device>, SmartHubError> {
        Ok(self.0.lock().unwrap().values().cloned().collect())
    }

    async fn list_ids(&self) -> Result<Vec<DeviceId>, SmartHubError> {
        Ok(self.0.lock().unwrap().keys().cloned().collect())
    }

    async fn merge(
        &self,
        id: &DeviceId,
        changes: DeviceChanges,
    ) -> Result<Option<Device>, SmartHubError> {
        let mut store = self.0.lock().unwrap();
        Ok(store.get_mut(id).map(|device| {
            *device = device.with_changes(&changes);
            device.clone()
        }))
    }

    async fn delete(&self, id: &DeviceId) -> Result<bool, SmartHubError> {
        Ok(self.0.lock().unwrap().remove(id).is_some())
    }
}

/// Accepts every write and remembers nothing; its snapshot is canned.
pub struct NoopUsageStore;

impl IntervalStore for NoopUsageStore {
    async fn push_interval(&self, _device_id: &DeviceId, _entry: String) -> Result<(), SmartHubError> {
        Ok(())
    }

    async fn intervals(&self, _device_id: &DeviceId) -> Result<Vec<String>, SmartHubError> {
        Ok(vec![])
    }

    async fn devices_with_intervals(&self) -> Result<Vec<DeviceId>, SmartHubError> {
        Ok(vec![])
    }

    async fn replace_last_interval(
        &self,
        _device_id: &DeviceId,
        _entry: String,
    ) -> Result<bool, SmartHubError> {
        Ok(false)
    }
}

impl SeenDevices for NoopUsageStore {
    async fn is_seen(&self, _device_id: &DeviceId) -> Result<bool, SmartHubError> {
        Ok(false)
    }

    async fn mark_seen(&self, _device_id: &DeviceId) -> Result<(), SmartHubError> {
        Ok(())
    }

    async fn forget(&self, _device_id: &DeviceId) -> Result<(), SmartHubError> {
        Ok(())
    }

    async fn seen_devices(&self) -> Result<Vec<DeviceId>, SmartHubError> {
        Ok(vec![])
    }
}

impl MetricsSink for NoopUsageStore {
    async fn increment_counter(
        &self,
        _counter: UsageCounter,
        _labels: &DeviceLabels,
        _amount: f64,
        _at: Timestamp,
    ) -> Result<(), SmartHubError> {
        Ok(())
    }

    async fn set_gauges(&self, _samples: Vec<GaugeSample>, _at: Timestamp) -> Result<(), SmartHubError> {
        Ok(())
    }
}

impl CounterHistory for NoopUsageStore {
    async fn increase(
        &self,
        _counter: UsageCounter,
        _window: UsageWindow,
    ) -> Result<Vec<(DeviceId, f64)>, SmartHubError> {
        Ok(vec![])
    }
}

impl MetricsSource for NoopUsageStore {
    async fn snapshot(&self) -> Result<MetricsSnapshot, SmartHubError> {
        let labels = BTreeMap::from([
            ("device_id".to_string(), "light-1".to_string()),
            ("device_type".to_string(), "light".to_string()),
        ]);
        Ok(MetricsSnapshot {
            gauges: vec![SeriesValue {
                name: "device_status".to_string(),
                labels: labels.clone(),
                value: 1.0,
            }],
            counters: vec![SeriesValue {
                name: "device_on_events_total".to_string(),
                labels,
                value: 3.0,
            }],
        })
    }
}

pub struct StubBus {
    pub connected: AtomicBool,
    pub sent: Mutex<Vec<OutboundMessage>>,
}

impl StubBus {
    pub fn topics(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|message| message.topic.clone())
            .collect()
    }
}

impl BusTransport for StubBus {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::Disconnected);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

pub type TestState = AppState<StubDeviceRepo, NoopUsageStore, StubBus>;

pub fn test_state(connected: bool) -> (TestState, Arc<StubBus>) {
    let repo = Arc::new(StubDeviceRepo::default());
    let usage = Arc::new(NoopUsageStore);
    let bus = Arc::new(StubBus {
        connected: AtomicBool::new(connected),
        sent: Mutex::new(vec![]),
    });
    let devices = Arc::new(DeviceService::new(
        repo,
        Arc::clone(&usage),
        Arc::new(SchemaRegistry::default()),
    ));
    let sync = Arc::new(SyncService::new(
        Arc::clone(&devices),
        Arc::clone(&bus),
        Origin::new("backend-test", "backend"),
        "home/devices",
    ));
    let analytics = Arc::new(AnalyticsService::new(usage));
    let metrics = Arc::new(HttpMetrics::new().unwrap());
    (AppState::new(devices, sync, analytics, metrics), bus)
}
