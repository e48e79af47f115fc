//! Shared application state for axum handlers.

use std::sync::Arc;

use smarthub_app::services::analytics_service::AnalyticsService;
use smarthub_app::services::device_service::DeviceService;
use smarthub_app::services::sync_service::SyncService;

use crate::metrics::HttpMetrics;

/// Application state shared across all axum handlers.
///
/// Generic over the device store, usage store and bus transport to avoid
/// dynamic dispatch. `Clone` is implemented manually so the underlying types
/// themselves do not need to be `Clone`; only the `Arc` wrappers are cloned.
pub struct AppState<DR, US, BT> {
    /// Validated device CRUD.
    pub devices: Arc<DeviceService<DR, US>>,
    /// Bus publishing for accepted changes.
    pub sync: Arc<SyncService<DR, US, BT>>,
    /// Usage reports and the stored metric series.
    pub analytics: Arc<AnalyticsService<US>>,
    /// Request metrics, shared with the tracking middleware.
    pub metrics: Arc<HttpMetrics>,
}

impl<DR, US, BT> Clone for AppState<DR, US, BT> {
    fn clone(&self) -> Self {
        Self {
            devices: Arc::clone(&self.devices),
            sync: Arc::clone(&self.sync),
            analytics: Arc::clone(&self.analytics),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<DR, US, BT> AppState<DR, US, BT> {
    /// Create a new application state from services already shared with
    /// background tasks.
    pub fn new(
        devices: Arc<DeviceService<DR, US>>,
        sync: Arc<SyncService<DR, US, BT>>,
        analytics: Arc<AnalyticsService<US>>,
        metrics: Arc<HttpMetrics>,
    ) -> Self {
        Self {
            devices,
            sync,
            analytics,
            metrics,
        }
    }
}
