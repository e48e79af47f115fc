//! # smarthub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **JSON device API** (`/api/ids`, `/api/devices`,
//!   `/api/devices/{id}`, `/api/devices/analytics`)
//! - Serve liveness and readiness probes (`/health`, `/ready`)
//! - Expose request metrics and the stored device series to Prometheus
//!   (`/metrics`)
//! - Map HTTP requests into application service calls (driving adapter) and
//!   publish every accepted change on the bus
//! - Map application errors into HTTP status codes
//!
//! ## Dependency rule
//! Depends on `smarthub-app` (for port traits and services) and `smarthub-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod metrics;
pub mod router;
pub mod state;

#[cfg(test)]
mod test_support;
