//! Storage port: the device document store.

use std::future::Future;

use smarthub_domain::device::{Device, DeviceChanges};
use smarthub_domain::error::SmartHubError;
use smarthub_domain::id::DeviceId;

/// Repository for persisting and querying [`Device`] documents.
///
/// Each method is atomic on a single document; there are no multi-document
/// transactions.
pub trait DeviceRepository {
    /// Persist a new device.
    fn insert(&self, device: Device) -> impl Future<Output = Result<Device, SmartHubError>> + Send;

    /// Get a device by id.
    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, SmartHubError>> + Send;

    /// Get every device.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, SmartHubError>> + Send;

    /// Get every device id.
    fn list_ids(&self) -> impl Future<Output = Result<Vec<DeviceId>, SmartHubError>> + Send;

    /// Merge `changes` into the stored device, parameters key by key.
    ///
    /// Returns the merged device, or `None` if it does not exist.
    fn merge(
        &self,
        id: &DeviceId,
        changes: DeviceChanges,
    ) -> impl Future<Output = Result<Option<Device>, SmartHubError>> + Send;

    /// Remove a device. Returns whether a document was removed.
    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<bool, SmartHubError>> + Send;
}
