//! # smarthub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement `DeviceRepository` from `smarthub-app::ports::storage`
//! - Implement the usage ports (`IntervalStore`, `SeenDevices`, `MetricsSink`,
//!   `CounterHistory`) from `smarthub-app::ports::usage`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//!
//! ## Dependency rule
//! Depends on `smarthub-app` (for port traits) and `smarthub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod device_repo;
mod error;
mod pool;
mod usage_store;

pub use device_repo::SqliteDeviceRepository;
pub use error::StorageError;
pub use pool::{Config, Database};
pub use usage_store::SqliteUsageStore;
