//! # smarthub-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceRepository`: the device document store
//!   - `IntervalStore`, `SeenDevices`, `MetricsSink`, `CounterHistory`: usage state
//!   - `BusTransport`: outbound bus messages
//! - Define **driving/inbound ports** as use-case structs/traits:
//!   - `DeviceService`: validated create, read, update, delete
//!   - `SyncService`: bus publish, retry queue, inbound apply (`BusHandler`)
//!   - `AnalyticsService`: usage reports
//! - Provide the dependency `Context` and the `retry` helper
//!
//! ## Dependency rule
//! Depends on `smarthub-domain` only (plus `tokio` for locks and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod context;
pub mod ports;
pub mod retry;
pub mod services;

#[cfg(test)]
mod test_support;
