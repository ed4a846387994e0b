//! Domain and engine error types
//!
//! Two layers, mirroring where failures originate:
//! - [`DomainError`] - malformed values caught at construction or at the
//!   Change Driver boundary, before the engine runs.
//! - [`EngineError`] - failures raised by the propagation flow itself:
//!   conflicts, integrity violations, and storage errors from the
//!   repository seam. All of them abort the whole batch.

use thiserror::Error;

use super::conflict::Conflict;
use super::newtypes::OwnerId;

/// Errors that can occur when constructing or validating domain values
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid entity name (empty, too long)
    #[error("Invalid entity name: {0}")]
    InvalidName(String),

    /// Invalid item key (empty, contains whitespace)
    #[error("Invalid item key: {0}")]
    InvalidKey(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Entity has no component references
    #[error("Entity \"{0}\" has no component references")]
    MissingComponents(String),

    /// A required field is missing or inconsistent
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors raised by the synchronization engine and the Change Driver
///
/// Every variant is fatal to the batch: the Change Driver rolls the
/// enclosing transaction back, so no partial application is observable.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A name collision or structural mismatch was detected on a target host
    #[error("Conflict on host \"{}\": entity \"{}\" ({})", .0.host_name, .0.entity_name, .0.reason)]
    Conflict(Conflict),

    /// Cyclic linkage or a propagation that fails to reach a fixpoint
    /// within the configured depth bound; a data-integrity bug, never
    /// worked around silently
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// A referenced entity or owner does not exist
    #[error("Unknown {kind}: {id}")]
    NotFound {
        /// What was being looked up ("owner", "entity", "template")
        kind: &'static str,
        id: String,
    },

    /// Input rejected before propagation started
    #[error(transparent)]
    Validation(#[from] DomainError),

    /// Storage error from the repository adapter
    #[error("Repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl EngineError {
    /// Shorthand for a cycle detected while walking the linkage relation
    pub fn cycle(owner: &OwnerId) -> Self {
        Self::Integrity(format!("cyclic linkage detected at owner {owner}"))
    }

    /// Returns the conflict record if this error is a conflict
    pub fn as_conflict(&self) -> Option<&Conflict> {
        match self {
            Self::Conflict(c) => Some(c),
            _ => None,
        }
    }
}
