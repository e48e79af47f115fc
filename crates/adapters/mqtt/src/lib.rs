//! # smarthub-adapter-mqtt
//!
//! MQTT v5 adapter: carries the sync protocol between backend replicas and
//! peer processes.
//!
//! ## Responsibilities
//! - Connect to the broker and keep reconnecting while the process runs
//! - Implement `BusTransport` (publish with origin tags as user properties)
//! - Drive a `BusHandler`: (re)subscribe and notify it on every `ConnAck`,
//!   hand it every received publish, one at a time
//! - Track the connection state for readiness probes
//!
//! ## Dependency rule
//! Same as other adapters: depends on `smarthub-app` and `smarthub-domain`.

mod config;
mod error;
mod event_loop;
mod transport;

pub use config::MqttConfig;
pub use error::MqttError;
pub use event_loop::{MqttEventLoop, connect};
pub use transport::MqttTransport;
