//! Device: a smart-home appliance registered in the hub.

mod kind;
mod status;

pub use kind::{DeviceKind, UnknownKind};
pub use status::{DeviceStatus, UnknownStatus};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::id::DeviceId;

/// Kind-specific parameters, keyed by parameter name.
pub type Parameters = serde_json::Map<String, Value>;

/// A registered device.
///
/// The `parameters` keys are always a subset of what the device's kind allows
/// once the document went through validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub room: String,
    pub name: String,
    pub status: DeviceStatus,
    #[serde(default)]
    pub parameters: Parameters,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Decode a device from a JSON document that already passed validation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the document does not have the shape of a device.
    pub fn from_document(document: Value) -> Result<Self, ValidationError> {
        serde_json::from_value(document)
            .map_err(|err| ValidationError::single(format!("Malformed device document: {err}")))
    }

    /// Encode the device as the JSON document exchanged over HTTP and the bus.
    #[must_use]
    pub fn to_document(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "type": self.kind,
            "room": self.room,
            "name": self.name,
            "status": self.status,
            "parameters": self.parameters,
        })
    }

    /// Look up a parameter by key.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    /// Return a copy of the device with `changes` merged in.
    ///
    /// Parameters are merged key by key; untouched keys keep their value.
    #[must_use]
    pub fn with_changes(&self, changes: &DeviceChanges) -> Self {
        let mut next = self.clone();
        if let Some(room) = &changes.room {
            next.room.clone_from(room);
        }
        if let Some(name) = &changes.name {
            next.name.clone_from(name);
        }
        if let Some(status) = changes.status {
            next.status = status;
        }
        for (key, value) in &changes.parameters {
            next.parameters.insert(key.clone(), value.clone());
        }
        next
    }
}

/// A partial update to a device. Only supplied fields change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeviceStatus>,
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
}

impl DeviceChanges {
    /// Decode a partial update from a JSON document that already passed validation.
    ///
    /// Fields outside the writable set (`id`, `type`) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if a supplied field has the wrong shape.
    pub fn from_document(document: &Value) -> Result<Self, ValidationError> {
        Self::deserialize(document)
            .map_err(|err| ValidationError::single(format!("Malformed device update: {err}")))
    }

    /// Whether the update carries no change at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.room.is_none()
            && self.name.is_none()
            && self.status.is_none()
            && self.parameters.is_empty()
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    kind: Option<DeviceKind>,
    room: String,
    name: String,
    status: Option<DeviceStatus>,
    parameters: Parameters,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn status(mut self, status: DeviceStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Consume the builder and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the id or the kind is missing, or if the
    /// status does not belong to the kind.
    pub fn build(self) -> Result<Device, ValidationError> {
        let id = self
            .id
            .filter(|id| !id.as_str().is_empty())
            .ok_or_else(|| ValidationError::single("device id must not be empty"))?;
        let kind = self
            .kind
            .ok_or_else(|| ValidationError::single("device type is required"))?;
        let status = self.status.unwrap_or_else(|| kind.resting_status());
        if !kind.accepts(status) {
            return Err(ValidationError::single(format!(
                "status '{status}' is not valid for {kind}"
            )));
        }
        Ok(Device {
            id,
            kind,
            room: self.room,
            name: self.name,
            status,
            parameters: self.parameters,
        })
    }
}
