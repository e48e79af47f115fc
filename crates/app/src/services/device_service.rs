//! Device service: validated device mutations and their metrics.

use std::sync::Arc;

use serde_json::Value;
use smarthub_domain::device::{Device, DeviceChanges};
use smarthub_domain::error::{ConflictError, NotFoundError, SmartHubError};
use smarthub_domain::id::DeviceId;
use smarthub_domain::schema::SchemaRegistry;
use smarthub_domain::time::now;
use smarthub_domain::validation::ValidationMode;

use crate::context::Context;
use crate::ports::{DeviceRepository, UsageStore};
use crate::services::metrics_recorder::MetricsRecorder;

/// Application service for device CRUD operations.
///
/// Every mutation is validated against the schema registry, written to the
/// store, then recorded in the usage metrics. Publishing on the bus is left
/// to the caller, since bus-originated mutations must not be echoed.
pub struct DeviceService<DR, US> {
    repo: Arc<DR>,
    recorder: MetricsRecorder<US>,
    schema: Arc<SchemaRegistry>,
}

impl<DR: DeviceRepository, US: UsageStore> DeviceService<DR, US> {
    /// Create a new service backed by the given stores.
    pub fn new(repo: Arc<DR>, usage: Arc<US>, schema: Arc<SchemaRegistry>) -> Self {
        Self {
            repo,
            recorder: MetricsRecorder::new(usage, Arc::clone(&schema)),
            schema,
        }
    }

    /// Create the service from an initialised [`Context`].
    ///
    /// # Errors
    ///
    /// Returns [`SmartHubError::NotInitialized`] if the context lacks a store.
    pub fn from_context<BT>(context: &Context<DR, US, BT>) -> Result<Self, SmartHubError> {
        Ok(Self::new(
            Arc::clone(context.device_store()?),
            Arc::clone(context.usage_store()?),
            Arc::clone(context.schema()),
        ))
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn recorder(&self) -> &MetricsRecorder<US> {
        &self.recorder
    }

    /// Validate and insert a new device, then initialise its metrics.
    ///
    /// # Errors
    ///
    /// Returns [`SmartHubError::Validation`] if the document breaks the schema,
    /// [`SmartHubError::Conflict`] if the id is taken, or a storage error.
    #[tracing::instrument(skip(self, document))]
    pub async fn create_device(&self, document: &Value) -> Result<Device, SmartHubError> {
        self.schema
            .validate(document, ValidationMode::New)
            .into_result()?;
        let device = Device::from_document(document.clone())?;
        if self.repo.get_by_id(&device.id).await?.is_some() {
            return Err(ConflictError::AlreadyExists {
                id: device.id.to_string(),
            }
            .into());
        }
        let device = self.repo.insert(device).await?;
        self.recorder.initialize(&device, now()).await?;
        tracing::info!(device_id = %device.id, kind = %device.kind, "device added");
        Ok(device)
    }

    /// Look up a device by id, initialising its metrics if unseen.
    ///
    /// # Errors
    ///
    /// Returns [`SmartHubError::NotFound`] when no device with `id` exists,
    /// or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn get_device(&self, id: &DeviceId) -> Result<Device, SmartHubError> {
        let device = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| NotFoundError::device(id))?;
        self.recorder.initialize(&device, now()).await?;
        Ok(device)
    }

    /// List every device, initialising the metrics of unseen ones.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the stores.
    #[tracing::instrument(skip(self))]
    pub async fn list_devices(&self) -> Result<Vec<Device>, SmartHubError> {
        let devices = self.repo.get_all().await?;
        let at = now();
        for device in &devices {
            self.recorder.initialize(device, at).await?;
        }
        Ok(devices)
    }

    /// List every device id.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_ids(&self) -> Result<Vec<DeviceId>, SmartHubError> {
        self.repo.list_ids().await
    }

    /// Validate and merge a partial update into an existing device.
    ///
    /// # Errors
    ///
    /// Returns [`SmartHubError::Conflict`] if the document carries another id,
    /// [`SmartHubError::NotFound`] if the device does not exist,
    /// [`SmartHubError::Validation`] if the update breaks the schema, or a
    /// storage error.
    #[tracing::instrument(skip(self, document))]
    pub async fn update_device(
        &self,
        id: &DeviceId,
        document: &Value,
    ) -> Result<Device, SmartHubError> {
        ensure_same_id(id, document)?;
        let existing = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| NotFoundError::device(id))?;
        self.schema
            .validate(
                document,
                ValidationMode::Update {
                    id,
                    kind: existing.kind,
                },
            )
            .into_result()?;
        let changes = DeviceChanges::from_document(document)?;
        let updated = self
            .repo
            .merge(id, changes.clone())
            .await?
            .ok_or_else(|| NotFoundError::device(id))?;
        self.recorder.record_update(&existing, &changes, now()).await?;
        tracing::info!(device_id = %id, "device updated");
        Ok(updated)
    }

    /// Remove a device.
    ///
    /// An on-like device has its interval closed and its transition recorded
    /// first. The seen marker is cleared whether or not the device existed.
    ///
    /// # Errors
    ///
    /// Returns [`SmartHubError::NotFound`] if the device does not exist, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_device(&self, id: &DeviceId) -> Result<Device, SmartHubError> {
        let Some(existing) = self.repo.get_by_id(id).await? else {
            self.recorder.forget(id).await?;
            return Err(NotFoundError::device(id).into());
        };
        if existing.status.is_on_like() {
            self.recorder
                .record_status_transition(&existing, existing.kind.resting_status(), now())
                .await?;
        }
        self.repo.delete(id).await?;
        self.recorder.forget(id).await?;
        tracing::info!(device_id = %id, "device deleted");
        Ok(existing)
    }
}

/// Fail when `document` carries an `id` other than `id`.
///
/// # Errors
///
/// Returns [`ConflictError::IdMismatch`] on a mismatch.
pub fn ensure_same_id(id: &DeviceId, document: &Value) -> Result<(), ConflictError> {
    match document.get("id") {
        Some(Value::String(other)) if other == id.as_str() => Ok(()),
        Some(other) => Err(ConflictError::IdMismatch {
            expected: id.to_string(),
            actual: other.as_str().map_or_else(|| other.to_string(), str::to_string),
        }),
        None => Ok(()),
    }
}
