//! Sync service: keeps replicas and peers consistent over the bus.
//!
//! Outbound changes are wrapped in an [`Envelope`] and tagged with this
//! process's [`Origin`]. Inbound messages from this process or its group are
//! discarded, the rest are validated and applied through the
//! [`DeviceService`] without being published again.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;
use smarthub_domain::error::SmartHubError;
use smarthub_domain::id::DeviceId;
use smarthub_domain::sync::{
    Envelope, Method, Origin, TopicPath, parse_topic, shared_subscription, topic_for,
};
use tokio::sync::Mutex;

use crate::context::Context;
use crate::ports::{
    BusHandler, BusTransport, DeviceRepository, InboundMessage, OutboundMessage, QoS, SendError,
    UsageStore,
};
use crate::services::device_service::{DeviceService, ensure_same_id};

/// Why an inbound message was dropped before reaching the device service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MalformedPayload,
    InvalidTopic,
    UnknownMethod,
}

/// What [`SyncService::on_receive`] did with a message.
#[derive(Debug)]
pub enum ReceiveOutcome {
    /// Published by this process or one of its replicas.
    Ignored,
    Dropped(DropReason),
    /// Well-formed but refused by the device service.
    Rejected(SmartHubError),
    Created(DeviceId),
    Updated(DeviceId),
    Deleted(DeviceId),
}

/// Publishes local changes and applies remote ones.
pub struct SyncService<DR, US, BT> {
    devices: Arc<DeviceService<DR, US>>,
    transport: Arc<BT>,
    origin: Origin,
    namespace: String,
    pending: Mutex<VecDeque<OutboundMessage>>,
}

impl<DR, US, BT> SyncService<DR, US, BT>
where
    DR: DeviceRepository,
    US: UsageStore,
    BT: BusTransport,
{
    pub fn new(
        devices: Arc<DeviceService<DR, US>>,
        transport: Arc<BT>,
        origin: Origin,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            devices,
            transport,
            origin,
            namespace: namespace.into(),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Build the service around the context's bus.
    ///
    /// # Errors
    ///
    /// Returns [`SmartHubError::NotInitialized`] if the context has no bus.
    pub fn from_context(
        context: &Context<DR, US, BT>,
        devices: Arc<DeviceService<DR, US>>,
        origin: Origin,
        namespace: impl Into<String>,
    ) -> Result<Self, SmartHubError> {
        Ok(Self::new(
            devices,
            Arc::clone(context.bus()?),
            origin,
            namespace,
        ))
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Whether the underlying transport is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Number of messages waiting for a reconnection.
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Publish a change of `device_id`. Never fails.
    ///
    /// Messages that cannot be sent because the bus is down are queued and
    /// retried on the next connection; other failures are logged and dropped.
    #[tracing::instrument(skip(self, change))]
    pub async fn publish(&self, change: &Value, device_id: &DeviceId, method: Method) {
        let envelope = Envelope {
            contents: change.clone(),
        };
        let payload = match serde_json::to_vec(&envelope) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode change envelope");
                return;
            }
        };
        let message = OutboundMessage {
            topic: topic_for(&self.namespace, device_id, method),
            payload,
            qos: QoS::ExactlyOnce,
            sender_id: self.origin.sender_id.clone(),
            sender_group: self.origin.sender_group.clone(),
        };

        match self.transport.send(&message).await {
            Ok(()) => tracing::debug!(topic = %message.topic, "change published"),
            Err(SendError::Disconnected) => {
                tracing::warn!(topic = %message.topic, "bus disconnected, queueing change for retry");
                self.pending.lock().await.push_back(message);
            }
            Err(err) => {
                tracing::error!(topic = %message.topic, error = %err, "failed to publish change");
            }
        }
    }

    /// Re-send queued messages, oldest first.
    ///
    /// Stops at the first message that still cannot be sent, leaving it and
    /// everything after it queued. Returns the number of messages delivered.
    pub async fn flush_pending(&self) -> usize {
        let mut pending = self.pending.lock().await;
        let mut delivered = 0;
        while let Some(message) = pending.front() {
            match self.transport.send(message).await {
                Ok(()) => {
                    delivered += 1;
                    pending.pop_front();
                }
                Err(SendError::Disconnected) => {
                    tracing::warn!(remaining = pending.len(), "bus still disconnected, keeping queue");
                    break;
                }
                Err(err) => {
                    tracing::error!(
                        topic = %message.topic,
                        remaining = pending.len(),
                        error = %err,
                        "queued change failed, keeping queue"
                    );
                    break;
                }
            }
        }
        if delivered > 0 {
            tracing::info!(delivered, "queued changes published");
        }
        delivered
    }

    /// Apply an inbound bus message.
    pub async fn on_receive(&self, message: InboundMessage) -> ReceiveOutcome {
        let sender_id = message.sender_id.as_deref();
        let sender_group = message.sender_group.as_deref();
        if sender_id.is_none() {
            tracing::error!(topic = %message.topic, "message missing sender id");
        }
        if sender_group.is_none() {
            tracing::error!(topic = %message.topic, "message missing sender group");
        }
        if self.origin.is_own(sender_id, sender_group) {
            tracing::trace!(topic = %message.topic, "ignoring message from own group");
            return ReceiveOutcome::Ignored;
        }
        tracing::info!(topic = %message.topic, "bus message received");

        let envelope: Envelope = match serde_json::from_slice(&message.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!(topic = %message.topic, error = %err, "failed to decode payload");
                return ReceiveOutcome::Dropped(DropReason::MalformedPayload);
            }
        };
        let TopicPath { device_id, method } = match parse_topic(&self.namespace, &message.topic) {
            Ok(path) => path,
            Err(err) => {
                tracing::error!(error = %err, "incorrect topic");
                return ReceiveOutcome::Dropped(DropReason::InvalidTopic);
            }
        };
        let method = match method.parse::<Method>() {
            Ok(method) => method,
            Err(err) => {
                tracing::error!(%device_id, error = %err, "unknown method");
                return ReceiveOutcome::Dropped(DropReason::UnknownMethod);
            }
        };

        let result = match method {
            Method::Post => self
                .apply_post(&device_id, &envelope.contents)
                .await
                .map(|()| ReceiveOutcome::Created(device_id.clone())),
            Method::Update => self
                .devices
                .update_device(&device_id, &envelope.contents)
                .await
                .map(|_| ReceiveOutcome::Updated(device_id.clone())),
            Method::Delete => self
                .devices
                .delete_device(&device_id)
                .await
                .map(|_| ReceiveOutcome::Deleted(device_id.clone())),
        };
        match result {
            Ok(outcome) => {
                tracing::info!(%device_id, %method, "bus change applied");
                outcome
            }
            Err(err) => {
                tracing::error!(%device_id, %method, error = %err, "bus change rejected");
                ReceiveOutcome::Rejected(err)
            }
        }
    }

    async fn apply_post(&self, device_id: &DeviceId, contents: &Value) -> Result<(), SmartHubError> {
        ensure_same_id(device_id, contents)?;
        self.devices.create_device(contents).await?;
        Ok(())
    }
}

impl<DR, US, BT> BusHandler for SyncService<DR, US, BT>
where
    DR: DeviceRepository + Send + Sync,
    US: UsageStore + Send + Sync,
    BT: BusTransport + Send + Sync,
{
    fn subscription(&self) -> String {
        shared_subscription(&self.origin.sender_group, &self.namespace)
    }

    async fn on_connected(&self) {
        self.flush_pending().await;
    }

    async fn on_message(&self, message: InboundMessage) {
        self.on_receive(message).await;
    }
}
