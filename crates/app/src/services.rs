//! Application services: driving ports / use-case orchestrators.

pub mod analytics_service;
pub mod device_service;
pub mod interval_tracker;
pub mod metrics_recorder;
pub mod sync_service;
