//! Conflict records
//!
//! A [`Conflict`] is an ephemeral value describing why a candidate entity
//! cannot be applied to a host. It is produced by the conflict detector,
//! carried inside `EngineError::Conflict`, and surfaced verbatim to the
//! caller so operators can resolve the collision manually.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::newtypes::{EntityId, EntityName, OwnerId};

/// Why a candidate entity collides with existing state on a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// An entity with the same name is already inherited from a different
    /// template; two inheritance sources cannot claim one name on one host
    InheritedFromOther,
    /// An entity with the same name was authored directly on the host;
    /// inheritance never overwrites a host-authored definition
    LocalEntityExists,
    /// Two template entities in the same batch resolve to the same
    /// `(host, name)` slot; the first one seen wins, this one is rejected
    DuplicateSource,
    /// The resolved component set does not match the existing host entity
    /// (differing cardinality), so the update would be ambiguous
    StructuralMismatch,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InheritedFromOther => "already inherited from another template",
            Self::LocalEntityExists => "a host-authored entity with this name exists",
            Self::DuplicateSource => "duplicate name within one propagation batch",
            Self::StructuralMismatch => "component sets are not identical",
        };
        write!(f, "{text}")
    }
}

/// A detected name or structural conflict on a single host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Host where the collision was found
    pub host_id: OwnerId,
    /// Human-readable host name, for operator-facing messages
    pub host_name: String,
    /// The colliding entity name
    pub entity_name: EntityName,
    /// The existing entity that blocks the candidate, when known
    pub conflicting_entity_id: Option<EntityId>,
    /// Why the candidate was rejected
    pub reason: ConflictReason,
}

impl Conflict {
    /// Creates a new conflict record
    pub fn new(
        host_id: OwnerId,
        host_name: impl Into<String>,
        entity_name: EntityName,
        conflicting_entity_id: Option<EntityId>,
        reason: ConflictReason,
    ) -> Self {
        Self {
            host_id,
            host_name: host_name.into(),
            entity_name,
            conflicting_entity_id,
            reason,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entity \"{}\" on host \"{}\": {}",
            self.entity_name, self.host_name, self.reason
        )
    }
}
