//! Fan-in claim tracking
//!
//! When one batch carries several template entities that resolve to the
//! same `(host, name)` slot - independent templates linked to a shared
//! host, or renames converging on one name - exactly one of them may win.
//! The contract is first-seen-wins in the caller-supplied batch order:
//! the first claimant registers the slot, every later claimant with a
//! different source is rejected with a conflict naming the host and name.
//! A winner is never picked silently.

use std::collections::HashMap;

use templink_core::domain::{
    conflict::{Conflict, ConflictReason},
    entity::Owner,
    newtypes::{EntityId, EntityName, OwnerId},
};
use tracing::info;

use crate::detector::Detection;

/// Tracks which template entity has claimed each `(host, name)` slot
/// within one propagation batch
#[derive(Debug, Default)]
pub struct ClaimTable {
    claims: HashMap<(OwnerId, EntityName), EntityId>,
}

impl ClaimTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `name` on `host` for `source`
    ///
    /// Re-claiming a slot with the same source is a no-op (the same
    /// template entity may be classified for a host more than once across
    /// recursion levels). A different source yields a
    /// [`ConflictReason::DuplicateSource`] detection.
    pub fn claim(&mut self, host: &Owner, name: &EntityName, source: &EntityId) -> Detection {
        match self.claims.get(&(*host.id(), name.clone())) {
            None => {
                self.claims.insert((*host.id(), name.clone()), *source);
                Detection::Clear
            }
            Some(holder) if holder == source => Detection::Clear,
            Some(_) => {
                info!(
                    host = %host.name(),
                    entity = %name,
                    "Duplicate name within one batch, rejecting the later claimant"
                );
                Detection::Conflicted(Box::new(Conflict::new(
                    *host.id(),
                    host.name(),
                    name.clone(),
                    None,
                    ConflictReason::DuplicateSource,
                )))
            }
        }
    }

    /// Number of registered claims
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
