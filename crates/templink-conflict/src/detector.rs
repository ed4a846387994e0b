//! Conflict detection logic
//!
//! Determines whether applying a candidate entity to a host would collide
//! with existing, differently-sourced state. All checks are pure functions
//! of the data handed in; the engine gathers repository state and decides
//! what to do with a detection.

use templink_core::domain::{
    conflict::{Conflict, ConflictReason},
    entity::{Entity, Owner},
    newtypes::{EntityId, EntityName},
};
use tracing::{debug, info};

/// Result of a conflict check
#[derive(Debug, Clone)]
pub enum Detection {
    /// No conflict: safe to apply the candidate
    Clear,
    /// Conflict detected: the whole batch must abort
    Conflicted(Box<Conflict>),
}

impl Detection {
    /// Returns the conflict, consuming the detection
    pub fn into_conflict(self) -> Option<Conflict> {
        match self {
            Self::Clear => None,
            Self::Conflicted(c) => Some(*c),
        }
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }
}

/// Detects name and structural conflicts on propagation targets
pub struct ConflictDetector;

impl ConflictDetector {
    /// Checks whether `name` can be claimed on `host` by the template
    /// entity `candidate_source`
    ///
    /// `existing` is the full entity list of the host. A same-named entity
    /// is harmless only when it is the candidate's own projection (same
    /// `source_id`); any other origin conflicts:
    ///
    /// - inherited from a different template: two inheritance sources can
    ///   never claim one name on one host
    /// - no source at all: the entity was authored on the host directly,
    ///   and inheritance must not overwrite it, even when the component
    ///   sets happen to be identical
    pub fn check_name_conflict(
        host: &Owner,
        existing: &[Entity],
        name: &EntityName,
        candidate_source: &EntityId,
    ) -> Detection {
        let Some(colliding) = existing.iter().find(|e| e.name() == name) else {
            return Detection::Clear;
        };

        match colliding.source_id() {
            Some(source) if source == candidate_source => {
                debug!(
                    host = %host.name(),
                    entity = %name,
                    "Same-named entity is our own projection, no conflict"
                );
                Detection::Clear
            }
            Some(_) => {
                info!(
                    host = %host.name(),
                    entity = %name,
                    "Name conflict: already inherited from another template"
                );
                Detection::Conflicted(Box::new(Conflict::new(
                    *host.id(),
                    host.name(),
                    name.clone(),
                    Some(*colliding.id()),
                    ConflictReason::InheritedFromOther,
                )))
            }
            None => {
                info!(
                    host = %host.name(),
                    entity = %name,
                    "Name conflict: host-authored entity with this name exists"
                );
                Detection::Conflicted(Box::new(Conflict::new(
                    *host.id(),
                    host.name(),
                    name.clone(),
                    Some(*colliding.id()),
                    ConflictReason::LocalEntityExists,
                )))
            }
        }
    }

    /// Checks that a fresh projection structurally matches the host entity
    /// it is about to replace
    ///
    /// A differing component cardinality means item resolution produced
    /// fewer (or more) host-side equivalents than the template references;
    /// applying it would silently truncate or pad the entity, so it is
    /// rejected instead.
    pub fn check_structural_match(
        host: &Owner,
        existing: &Entity,
        projection: &Entity,
    ) -> Detection {
        if existing.components().len() == projection.components().len() {
            return Detection::Clear;
        }

        info!(
            host = %host.name(),
            entity = %projection.name(),
            existing = existing.components().len(),
            resolved = projection.components().len(),
            "Structural mismatch between existing entity and fresh projection"
        );

        Detection::Conflicted(Box::new(Conflict::new(
            *host.id(),
            host.name(),
            projection.name().clone(),
            Some(*existing.id()),
            ConflictReason::StructuralMismatch,
        )))
    }
}
