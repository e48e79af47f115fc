//! Bus port: the message transport used by the sync protocol.
//!
//! The transport only moves bytes and tags; encoding, origin filtering and the
//! retry queue live in [`SyncService`](crate::services::sync_service::SyncService).

use std::future::Future;

/// Delivery guarantee requested from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// A message ready to be published, origin tags included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub sender_id: String,
    pub sender_group: String,
}

/// A message received from the bus. Tags are optional since peers may omit them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub sender_id: Option<String>,
    pub sender_group: Option<String>,
}

/// Why a publish did not go through.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("bus is disconnected")]
    Disconnected,

    #[error("bus transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Outbound side of the bus.
pub trait BusTransport {
    /// Hand a message to the bus.
    ///
    /// Must fail with [`SendError::Disconnected`] rather than block while the
    /// broker is unreachable.
    fn send(&self, message: &OutboundMessage) -> impl Future<Output = Result<(), SendError>> + Send;

    /// Whether the broker connection is currently up.
    fn is_connected(&self) -> bool;
}

/// Inbound side of the bus, driven by the transport's event loop.
pub trait BusHandler: Send + Sync {
    /// Topic filter to (re)subscribe to after every connection.
    fn subscription(&self) -> String;

    /// Called once per successful (re)connection, after subscribing.
    fn on_connected(&self) -> impl Future<Output = ()> + Send;

    /// Called for every received message, one at a time.
    fn on_message(&self, message: InboundMessage) -> impl Future<Output = ()> + Send;
}
