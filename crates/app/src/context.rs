//! Dependency context: the stores and transport a process was started with.
//!
//! Components take what they need from the context when they are built. A
//! missing dependency is reported as [`SmartHubError::NotInitialized`] at that
//! point instead of surfacing later in the middle of a request.

use std::sync::Arc;

use smarthub_domain::error::SmartHubError;
use smarthub_domain::schema::SchemaRegistry;

/// Holds the process-wide dependencies.
pub struct Context<DR, US, BT> {
    schema: Arc<SchemaRegistry>,
    device_store: Option<Arc<DR>>,
    usage_store: Option<Arc<US>>,
    bus: Option<Arc<BT>>,
}

impl<DR, US, BT> Context<DR, US, BT> {
    /// Start an empty context around the schema rules.
    pub fn new(schema: SchemaRegistry) -> Self {
        Self {
            schema: Arc::new(schema),
            device_store: None,
            usage_store: None,
            bus: None,
        }
    }

    #[must_use]
    pub fn with_device_store(mut self, store: Arc<DR>) -> Self {
        self.device_store = Some(store);
        self
    }

    #[must_use]
    pub fn with_usage_store(mut self, store: Arc<US>) -> Self {
        self.usage_store = Some(store);
        self
    }

    #[must_use]
    pub fn with_bus(mut self, bus: Arc<BT>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// # Errors
    ///
    /// Returns [`SmartHubError::NotInitialized`] if no device store was set.
    pub fn device_store(&self) -> Result<&Arc<DR>, SmartHubError> {
        self.device_store
            .as_ref()
            .ok_or(SmartHubError::NotInitialized("device store"))
    }

    /// # Errors
    ///
    /// Returns [`SmartHubError::NotInitialized`] if no usage store was set.
    pub fn usage_store(&self) -> Result<&Arc<US>, SmartHubError> {
        self.usage_store
            .as_ref()
            .ok_or(SmartHubError::NotInitialized("usage store"))
    }

    /// # Errors
    ///
    /// Returns [`SmartHubError::NotInitialized`] if no bus was set.
    pub fn bus(&self) -> Result<&Arc<BT>, SmartHubError> {
        self.bus
            .as_ref()
            .ok_or(SmartHubError::NotInitialized("bus transport"))
    }
}
