//! Propagation engine
//!
//! Pushes template-level entity definitions down the linkage graph one
//! level at a time. Each level resolves item identities per target,
//! classifies every (entity, target) pair as create, update, or no-op,
//! checks the whole level for conflicts, applies the writes, and then
//! recurses: host-side copies landing on an intermediate template become
//! the next level's input. The loop reaches a fixpoint when a level
//! produces no template-owned copies.
//!
//! Any conflict aborts the run with the first offending pair; the Change
//! Driver owns the transaction and rolls everything back, so a partially
//! propagated batch is never observable.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use templink_conflict::{ClaimTable, ConflictDetector, Detection};
use templink_core::domain::context::SyncScope;
use templink_core::domain::entity::{Entity, Owner};
use templink_core::domain::errors::EngineError;
use templink_core::domain::newtypes::{EntityId, OwnerId};
use templink_core::ports::EntityRepository;

use crate::items::ItemResolver;
use crate::linkage::LinkageResolver;

/// Phase of a propagation run, advanced strictly forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    /// Loading linkage children and resolving item identities
    Resolving,
    /// Classifying each (entity, target) pair as create, update, or no-op
    Classifying,
    /// Checking the whole level for conflicts before any write
    Checking,
    /// Issuing batched inserts and updates
    Applying,
    /// Collecting template-owned copies for the next level
    Recursing,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::Classifying => "classifying",
            Self::Checking => "checking",
            Self::Applying => "applying",
            Self::Recursing => "recursing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Counters reported after a successful propagation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationSummary {
    /// Host-side entities created
    pub created: usize,
    /// Host-side entities rewritten from a fresh projection
    pub updated: usize,
    /// Targets already carrying the exact projection
    pub unchanged: usize,
    /// (entity, target) pairs skipped because an item had no equivalent
    pub skipped_targets: usize,
    /// Linkage levels traversed
    pub levels: u16,
}

/// A create classified for one target, held until the level-wide conflict
/// check passes
struct PlannedCreate {
    target: Owner,
    projection: Entity,
    source: EntityId,
}

/// An update classified for one target
struct PlannedUpdate {
    target: Owner,
    existing: Entity,
    projection: Entity,
    source: EntityId,
}

/// The template inheritance propagation engine
///
/// Stateless between runs; every invocation carries its own claim table,
/// visited set, and state machine.
pub struct SyncEngine {
    repository: Arc<dyn EntityRepository>,
    items: ItemResolver,
    linkage: LinkageResolver,
    max_chain_depth: u16,
}

impl SyncEngine {
    pub fn new(repository: Arc<dyn EntityRepository>, max_chain_depth: u16) -> Self {
        Self {
            items: ItemResolver::new(Arc::clone(&repository)),
            linkage: LinkageResolver::new(Arc::clone(&repository)),
            repository,
            max_chain_depth,
        }
    }

    /// Propagates `seeds` (template-level definitions, already persisted)
    /// to every linked target within `scope`
    ///
    /// The scope restricts the first linkage level only; recursion below an
    /// intermediate template always covers all of its children, matching
    /// what a full resync of that template would do.
    ///
    /// # Errors
    ///
    /// Any conflict, integrity violation, or storage failure aborts the
    /// whole run. The caller owns the transaction and must roll back.
    #[instrument(skip(self, seeds, scope), fields(seeds = seeds.len()))]
    pub async fn propagate(
        &self,
        seeds: Vec<Entity>,
        scope: &SyncScope,
    ) -> Result<PropagationSummary, EngineError> {
        let mut state = RunState::Pending;
        let mut visited: HashSet<OwnerId> = HashSet::new();
        let mut claims = ClaimTable::new();
        let mut summary = PropagationSummary::default();

        let mut frontier = seeds;
        let mut level: u16 = 0;

        while !frontier.is_empty() {
            if level >= self.max_chain_depth {
                advance(&mut state, RunState::Aborted);
                return Err(EngineError::Integrity(format!(
                    "propagation exceeded {} linkage levels without reaching a fixpoint",
                    self.max_chain_depth
                )));
            }

            advance(&mut state, RunState::Resolving);
            let owners = self.guard_revisit(&frontier, &mut visited, &mut state)?;
            let children = self
                .load_children(&owners, if level == 0 { Some(scope) } else { None })
                .await?;

            advance(&mut state, RunState::Classifying);
            let mut existing_cache: HashMap<OwnerId, Vec<Entity>> = HashMap::new();
            let mut creates: Vec<PlannedCreate> = Vec::new();
            let mut updates: Vec<PlannedUpdate> = Vec::new();
            let mut next_frontier: Vec<Entity> = Vec::new();

            for seed in &frontier {
                let Some(targets) = children.get(seed.owner_id()) else {
                    continue;
                };
                for target in targets {
                    match self
                        .classify(seed, target, &mut existing_cache, &mut summary)
                        .await?
                    {
                        Classified::Create(planned) => creates.push(planned),
                        Classified::Update(planned) => updates.push(planned),
                        Classified::Unchanged(copy) => {
                            if target.is_template() {
                                next_frontier.push(copy);
                            }
                        }
                        Classified::Skipped => {}
                    }
                }
            }

            advance(&mut state, RunState::Checking);
            self.check_level(&creates, &updates, &existing_cache, &mut claims)
                .map_err(|conflict| {
                    advance(&mut state, RunState::Aborted);
                    EngineError::Conflict(conflict)
                })?;

            advance(&mut state, RunState::Applying);
            let mut create_batch = Vec::with_capacity(creates.len());
            for planned in creates {
                if planned.target.is_template() {
                    next_frontier.push(planned.projection.clone());
                }
                create_batch.push(planned.projection);
            }
            let mut update_batch = Vec::with_capacity(updates.len());
            for planned in updates {
                let mut entity = planned.existing;
                entity.apply_projection(planned.projection);
                if planned.target.is_template() {
                    next_frontier.push(entity.clone());
                }
                update_batch.push(entity);
            }

            if !create_batch.is_empty() {
                self.repository.insert_entities(&create_batch).await?;
            }
            if !update_batch.is_empty() {
                self.repository.update_entities(&update_batch).await?;
            }
            summary.created += create_batch.len();
            summary.updated += update_batch.len();

            advance(&mut state, RunState::Recursing);
            debug!(
                level,
                created = create_batch.len(),
                updated = update_batch.len(),
                next = next_frontier.len(),
                "Level applied"
            );
            frontier = next_frontier;
            level += 1;
        }

        advance(&mut state, RunState::Done);
        summary.levels = level;
        info!(
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            skipped = summary.skipped_targets,
            levels = summary.levels,
            "Propagation complete"
        );
        Ok(summary)
    }

    /// Rejects a frontier whose owner was already processed in this run
    ///
    /// Within one level several entities share an owner; across levels a
    /// repeated owner means the linkage walk is circular.
    fn guard_revisit(
        &self,
        frontier: &[Entity],
        visited: &mut HashSet<OwnerId>,
        state: &mut RunState,
    ) -> Result<Vec<OwnerId>, EngineError> {
        let mut owners = Vec::new();
        for entity in frontier {
            let owner_id = *entity.owner_id();
            if owners.contains(&owner_id) {
                continue;
            }
            if !visited.insert(owner_id) {
                advance(state, RunState::Aborted);
                return Err(EngineError::cycle(&owner_id));
            }
            owners.push(owner_id);
        }
        Ok(owners)
    }

    /// Loads direct linkage children per frontier owner, applying the
    /// caller scope on the first level
    async fn load_children(
        &self,
        owners: &[OwnerId],
        scope: Option<&SyncScope>,
    ) -> Result<HashMap<OwnerId, Vec<Owner>>, EngineError> {
        let mut children = HashMap::new();
        for owner_id in owners {
            let mut targets = self.linkage.direct_children(owner_id).await?;
            if let Some(scope) = scope {
                targets.retain(|t| scope.includes(t.id()));
            }
            children.insert(*owner_id, targets);
        }
        Ok(children)
    }

    /// Classifies one (seed, target) pair
    async fn classify(
        &self,
        seed: &Entity,
        target: &Owner,
        existing_cache: &mut HashMap<OwnerId, Vec<Entity>>,
        summary: &mut PropagationSummary,
    ) -> Result<Classified, EngineError> {
        let Some(item_map) = self.items.resolve_for(seed, target.id()).await? else {
            summary.skipped_targets += 1;
            return Ok(Classified::Skipped);
        };
        let projection = seed.project(*target.id(), &item_map)?;

        let existing = self.existing_entities(target.id(), existing_cache).await?;
        let current = existing
            .iter()
            .find(|e| e.source_id() == Some(seed.id()))
            .cloned();

        match current {
            Some(entity) if projection.matches_projection(&entity) => {
                summary.unchanged += 1;
                Ok(Classified::Unchanged(entity))
            }
            Some(entity) => Ok(Classified::Update(PlannedUpdate {
                target: target.clone(),
                existing: entity,
                projection,
                source: *seed.id(),
            })),
            None => Ok(Classified::Create(PlannedCreate {
                target: target.clone(),
                projection,
                source: *seed.id(),
            })),
        }
    }

    async fn existing_entities<'a>(
        &self,
        owner_id: &OwnerId,
        cache: &'a mut HashMap<OwnerId, Vec<Entity>>,
    ) -> Result<&'a Vec<Entity>, EngineError> {
        if !cache.contains_key(owner_id) {
            let entities = self.repository.entities_by_owner(owner_id).await?;
            cache.insert(*owner_id, entities);
        }
        // Just inserted above when absent
        Ok(&cache[owner_id])
    }

    /// Runs every conflict check for one level before anything is written
    ///
    /// Returns the first conflict found; creates are checked in batch
    /// order, then updates, so error reporting is deterministic for a
    /// given input order.
    fn check_level(
        &self,
        creates: &[PlannedCreate],
        updates: &[PlannedUpdate],
        existing_cache: &HashMap<OwnerId, Vec<Entity>>,
        claims: &mut ClaimTable,
    ) -> Result<(), templink_core::domain::conflict::Conflict> {
        let no_entities = Vec::new();
        let existing_of =
            |owner: &OwnerId| existing_cache.get(owner).unwrap_or(&no_entities).as_slice();

        for planned in creates {
            let detections = [
                ConflictDetector::check_name_conflict(
                    &planned.target,
                    existing_of(planned.target.id()),
                    planned.projection.name(),
                    &planned.source,
                ),
                claims.claim(&planned.target, planned.projection.name(), &planned.source),
            ];
            for detection in detections {
                if let Detection::Conflicted(conflict) = detection {
                    return Err(*conflict);
                }
            }
        }

        for planned in updates {
            let mut detections = vec![ConflictDetector::check_structural_match(
                &planned.target,
                &planned.existing,
                &planned.projection,
            )];
            if planned.projection.name() != planned.existing.name() {
                // Rename: the new name must be free on the target
                detections.push(ConflictDetector::check_name_conflict(
                    &planned.target,
                    existing_of(planned.target.id()),
                    planned.projection.name(),
                    &planned.source,
                ));
            }
            detections.push(claims.claim(
                &planned.target,
                planned.projection.name(),
                &planned.source,
            ));
            for detection in detections {
                if let Detection::Conflicted(conflict) = detection {
                    return Err(*conflict);
                }
            }
        }

        Ok(())
    }
}

/// Outcome of classifying one (seed, target) pair
enum Classified {
    Create(PlannedCreate),
    Update(PlannedUpdate),
    /// Target already carries this exact projection; recursion still
    /// descends through it
    Unchanged(Entity),
    /// An item had no equivalent on the target
    Skipped,
}

fn advance(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "Run state");
    *state = next;
}
