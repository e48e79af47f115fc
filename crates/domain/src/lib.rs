//! # smarthub-domain
//!
//! Pure domain model for the smarthub device registry.
//!
//! ## Responsibilities
//! - Foundational types: device identifiers, error conventions, timestamps
//! - Define **Devices** (kind, status, kind-specific parameters)
//! - Define the **Schema Registry** and the **Validation Engine** that guard
//!   every mutation
//! - Define the **metric vocabulary** shared by the recorder and analytics
//! - Define **on-intervals** and the usage report arithmetic
//! - Define the **bus synchronization vocabulary** (topics, envelopes, origins)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod interval;
pub mod metric;
pub mod schema;
pub mod sync;
pub mod usage;
pub mod validation;
