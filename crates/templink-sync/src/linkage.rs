//! Linkage traversal
//!
//! The linkage table is a DAG from templates down to hosts. The engine
//! walks it one level at a time via [`LinkageResolver::direct_children`];
//! [`LinkageResolver::linked_hosts`] flattens a template's whole subtree to
//! the concrete hosts underneath it, which is what a full resync targets.
//! A cycle in the table is a data integrity fault and aborts the walk.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::warn;

use templink_core::domain::entity::Owner;
use templink_core::domain::errors::EngineError;
use templink_core::domain::linkage::{Linkage, LinkageSet};
use templink_core::domain::newtypes::OwnerId;
use templink_core::ports::EntityRepository;

/// Walks the template-to-host linkage graph
pub struct LinkageResolver {
    repository: Arc<dyn EntityRepository>,
}

impl LinkageResolver {
    pub fn new(repository: Arc<dyn EntityRepository>) -> Self {
        Self { repository }
    }

    /// Loads the direct children of `template_id` as full owners
    ///
    /// Children may be hosts or lower-level templates; the caller decides
    /// what to do with each kind. Order follows the linkage table.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` when a linkage row points at an
    /// owner that does not exist.
    pub async fn direct_children(&self, template_id: &OwnerId) -> Result<Vec<Owner>, EngineError> {
        let child_ids = self.repository.linkage_children(template_id).await?;
        let mut children = Vec::with_capacity(child_ids.len());

        for child_id in child_ids {
            let owner = self
                .repository
                .get_owner(&child_id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    kind: "owner",
                    id: child_id.to_string(),
                })?;
            children.push(owner);
        }

        Ok(children)
    }

    /// Flattens the subtree under `template_id` to the set of concrete
    /// hosts it ultimately reaches, through any number of intermediate
    /// template levels
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Integrity` if the linkage graph contains a
    /// cycle reachable from `template_id`.
    pub async fn linked_hosts(
        &self,
        template_id: &OwnerId,
    ) -> Result<HashSet<OwnerId>, EngineError> {
        let (edges, owners) = self.load_subgraph(template_id).await?;
        let mut hosts = HashSet::new();
        let mut on_path = HashSet::new();
        Self::collect_hosts(&edges, &owners, template_id, &mut on_path, &mut hosts)?;
        Ok(hosts)
    }

    /// Fetches every linkage edge reachable from `root` into an adjacency
    /// view, one repository round trip per template
    async fn load_subgraph(
        &self,
        root: &OwnerId,
    ) -> Result<(LinkageSet, HashMap<OwnerId, Owner>), EngineError> {
        let mut edges = LinkageSet::new();
        let mut owners = HashMap::new();
        let mut queue = VecDeque::from([*root]);
        let mut seen = HashSet::from([*root]);

        while let Some(owner_id) = queue.pop_front() {
            for child in self.direct_children(&owner_id).await? {
                edges.add(Linkage::new(owner_id, *child.id()));
                if seen.insert(*child.id()) {
                    if child.is_template() {
                        queue.push_back(*child.id());
                    }
                    owners.insert(*child.id(), child);
                }
            }
        }

        Ok((edges, owners))
    }

    /// Depth-first descent over the adjacency view, tracking the current
    /// path for cycle detection
    fn collect_hosts(
        edges: &LinkageSet,
        owners: &HashMap<OwnerId, Owner>,
        owner_id: &OwnerId,
        on_path: &mut HashSet<OwnerId>,
        hosts: &mut HashSet<OwnerId>,
    ) -> Result<(), EngineError> {
        on_path.insert(*owner_id);

        for child_id in edges.children_of(owner_id) {
            if on_path.contains(child_id) {
                warn!(owner = %child_id, "Linkage cycle detected");
                return Err(EngineError::cycle(child_id));
            }
            if owners.get(child_id).is_some_and(Owner::is_template) {
                Self::collect_hosts(edges, owners, child_id, on_path, hosts)?;
            } else {
                hosts.insert(*child_id);
            }
        }

        on_path.remove(owner_id);
        Ok(())
    }
}
