//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`SmartHubError`] via `#[from]` or an explicit `From` impl.

use std::fmt;

/// Top-level error shared by the domain, the services and the adapters.
#[derive(Debug, thiserror::Error)]
pub enum SmartHubError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("{0} has not been initialized")]
    NotInitialized(&'static str),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A document was rejected by the schema rules.
///
/// Carries every violation found, in the order they were detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl ValidationError {
    /// Build an error from a list of violations.
    #[must_use]
    pub fn new(violations: Vec<String>) -> Self {
        Self { violations }
    }

    /// Build an error holding a single violation.
    #[must_use]
    pub fn single(violation: impl Into<String>) -> Self {
        Self {
            violations: vec![violation.into()],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.violations.join("; "))
    }
}

/// The identity of a device clashes with what is stored or addressed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("device with id '{id}' already exists")]
    AlreadyExists { id: String },

    #[error("device id mismatch: addressed '{expected}', document carries '{actual}'")]
    IdMismatch { expected: String, actual: String },
}

/// A lookup by id found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} with id {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

impl NotFoundError {
    /// Shorthand for a missing device.
    #[must_use]
    pub fn device(id: impl fmt::Display) -> Self {
        Self {
            entity: "device",
            id: id.to_string(),
        }
    }
}
