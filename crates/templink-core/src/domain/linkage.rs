//! Template linkage
//!
//! A [`Linkage`] is a directed edge recording that a host (or a lower-level
//! template) inherits from a template. The relation is nominally acyclic,
//! but nothing in the data model enforces that structurally, so traversal
//! code must detect cycles defensively.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::newtypes::OwnerId;

/// A directed inheritance edge `template -> child`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Linkage {
    /// The template being inherited from
    pub template_id: OwnerId,
    /// The inheriting host or lower-level template
    pub host_id: OwnerId,
}

impl Linkage {
    pub fn new(template_id: OwnerId, host_id: OwnerId) -> Self {
        Self {
            template_id,
            host_id,
        }
    }
}

/// Adjacency view over a set of linkage edges
///
/// Built once per traversal from the edges the repository returns; keeps
/// children in insertion order so propagation is deterministic.
#[derive(Debug, Default, Clone)]
pub struct LinkageSet {
    children: HashMap<OwnerId, Vec<OwnerId>>,
}

impl LinkageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an edge, ignoring exact duplicates
    pub fn add(&mut self, edge: Linkage) {
        let children = self.children.entry(edge.template_id).or_default();
        if !children.contains(&edge.host_id) {
            children.push(edge.host_id);
        }
    }

    /// Direct children of a template, in insertion order
    pub fn children_of(&self, template_id: &OwnerId) -> &[OwnerId] {
        self.children
            .get(template_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns true if the owner has at least one child edge, i.e. acts
    /// as a template for someone
    pub fn is_template_for_any(&self, owner_id: &OwnerId) -> bool {
        !self.children_of(owner_id).is_empty()
    }

    /// All owners that appear as a template in this set
    pub fn templates(&self) -> impl Iterator<Item = &OwnerId> {
        self.children.keys()
    }

    /// All owners referenced by any edge, template or child side
    pub fn owners(&self) -> HashSet<OwnerId> {
        let mut owners: HashSet<OwnerId> = self.children.keys().copied().collect();
        for children in self.children.values() {
            owners.extend(children.iter().copied());
        }
        owners
    }
}

impl FromIterator<Linkage> for LinkageSet {
    fn from_iter<T: IntoIterator<Item = Linkage>>(iter: T) -> Self {
        let mut set = Self::new();
        for edge in iter {
            set.add(edge);
        }
        set
    }
}
