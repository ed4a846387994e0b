//! Change Driver (driving/primary adapter)
//!
//! The only write entry point into the system. Callers hand it raw drafts;
//! it validates them at the boundary (unknown fields rejected by serde,
//! values checked by the domain constructors), opens the transaction,
//! persists the template-level change, invokes the propagation engine, and
//! commits or rolls back as one unit.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use templink_core::config::Config;
use templink_core::domain::context::{CallerContext, SyncScope};
use templink_core::domain::entity::{AxisConfig, ComponentRef, DisplayAttrs, Entity};
use templink_core::domain::errors::{DomainError, EngineError};
use templink_core::domain::newtypes::{EntityId, EntityName, ItemId, OwnerId};
use templink_core::ports::EntityRepository;

use crate::engine::{PropagationSummary, SyncEngine};
use crate::linkage::LinkageResolver;

/// One component reference as submitted by a caller
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentDraft {
    pub item_id: ItemId,
    /// Rendering position; defaults to the position within the draft list
    #[serde(default)]
    pub ordinal: Option<u32>,
    #[serde(default)]
    pub display: Option<DisplayAttrs>,
}

/// A new entity as submitted by a caller
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDraft {
    pub owner_id: OwnerId,
    pub name: String,
    pub components: Vec<ComponentDraft>,
    /// Defaults to calculated bounds on both ends
    #[serde(default)]
    pub axes: Option<AxisConfig>,
}

impl EntityDraft {
    /// Validates the draft into a domain entity, filling defaults
    fn into_entity(self) -> Result<Entity, DomainError> {
        let name = EntityName::new(self.name)?;
        let components = self
            .components
            .into_iter()
            .enumerate()
            .map(|(position, draft)| {
                ComponentRef::new(
                    draft.item_id,
                    draft.ordinal.unwrap_or(position as u32),
                    draft.display.unwrap_or_default(),
                )
            })
            .collect();
        Entity::new(self.owner_id, name, components, self.axes.unwrap_or_default())
    }
}

/// A partial update of an existing template-level entity
///
/// Absent fields keep their current value.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityUpdate {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub components: Option<Vec<ComponentDraft>>,
    #[serde(default)]
    pub axes: Option<AxisConfig>,
}

/// Write entry point: create, update, and full template resync
pub struct ChangeDriver {
    repository: Arc<dyn EntityRepository>,
    engine: SyncEngine,
    linkage: LinkageResolver,
    max_batch: usize,
}

impl ChangeDriver {
    pub fn new(repository: Arc<dyn EntityRepository>, config: &Config) -> Self {
        Self {
            engine: SyncEngine::new(Arc::clone(&repository), config.engine.max_chain_depth),
            linkage: LinkageResolver::new(Arc::clone(&repository)),
            repository,
            max_batch: config.engine.max_batch,
        }
    }

    /// Creates entities from drafts and propagates template-owned ones to
    /// linked hosts
    ///
    /// Returns the ids of the created template-level entities, in input
    /// order. All-or-nothing: any validation failure, conflict, or storage
    /// error leaves the store untouched.
    #[instrument(skip(self, drafts, ctx), fields(caller = %ctx, count = drafts.len()))]
    pub async fn create(
        &self,
        drafts: Vec<EntityDraft>,
        ctx: &CallerContext,
    ) -> Result<Vec<EntityId>, EngineError> {
        self.check_batch_size(drafts.len())?;

        self.repository.begin().await?;
        match self.create_inner(drafts, ctx).await {
            Ok(ids) => {
                self.repository.commit().await?;
                Ok(ids)
            }
            Err(err) => {
                self.roll_back().await;
                Err(err)
            }
        }
    }

    async fn create_inner(
        &self,
        drafts: Vec<EntityDraft>,
        ctx: &CallerContext,
    ) -> Result<Vec<EntityId>, EngineError> {
        let mut entities = Vec::with_capacity(drafts.len());
        let mut batch_names: HashSet<(OwnerId, EntityName)> = HashSet::new();

        for draft in drafts {
            let owner_id = draft.owner_id;
            self.repository
                .get_owner(&owner_id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    kind: "owner",
                    id: owner_id.to_string(),
                })?;

            let entity = draft.into_entity()?;

            if !batch_names.insert((owner_id, entity.name().clone())) {
                return Err(duplicate_name(entity.name(), &owner_id));
            }
            let existing = self.repository.entities_by_owner(&owner_id).await?;
            if existing.iter().any(|e| e.name() == entity.name()) {
                return Err(duplicate_name(entity.name(), &owner_id));
            }

            entities.push(entity);
        }

        let ids: Vec<EntityId> = entities.iter().map(|e| *e.id()).collect();
        self.repository.insert_entities(&entities).await?;

        let summary = self.engine.propagate(entities, ctx.scope()).await?;
        info!(created = summary.created, "Create propagated");
        Ok(ids)
    }

    /// Applies partial updates to template-level entities and propagates
    /// the result
    ///
    /// Inherited copies cannot be updated directly; change the definition
    /// on the owning template instead.
    #[instrument(skip(self, updates, ctx), fields(caller = %ctx, count = updates.len()))]
    pub async fn update(
        &self,
        updates: Vec<EntityUpdate>,
        ctx: &CallerContext,
    ) -> Result<Vec<EntityId>, EngineError> {
        self.check_batch_size(updates.len())?;

        self.repository.begin().await?;
        match self.update_inner(updates, ctx).await {
            Ok(ids) => {
                self.repository.commit().await?;
                Ok(ids)
            }
            Err(err) => {
                self.roll_back().await;
                Err(err)
            }
        }
    }

    async fn update_inner(
        &self,
        updates: Vec<EntityUpdate>,
        ctx: &CallerContext,
    ) -> Result<Vec<EntityId>, EngineError> {
        let mut entities = Vec::with_capacity(updates.len());
        let mut dirty = Vec::new();

        for update in updates {
            let mut entity = self
                .repository
                .get_entity(&update.id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    kind: "entity",
                    id: update.id.to_string(),
                })?;
            if entity.is_inherited() {
                return Err(EngineError::Validation(DomainError::ValidationFailed(
                    format!(
                        "entity \"{}\" is inherited; update the template definition instead",
                        entity.name()
                    ),
                )));
            }

            let before = entity.clone();

            if let Some(name) = update.name {
                let name = EntityName::new(name)?;
                if name != *entity.name() {
                    let siblings = self.repository.entities_by_owner(entity.owner_id()).await?;
                    if siblings
                        .iter()
                        .any(|e| e.id() != entity.id() && e.name() == &name)
                    {
                        return Err(duplicate_name(&name, entity.owner_id()));
                    }
                }
                entity.set_name(name);
            }
            if let Some(components) = update.components {
                let components = components
                    .into_iter()
                    .enumerate()
                    .map(|(position, draft)| {
                        ComponentRef::new(
                            draft.item_id,
                            draft.ordinal.unwrap_or(position as u32),
                            draft.display.unwrap_or_default(),
                        )
                    })
                    .collect();
                entity.set_components(components)?;
            }
            if let Some(axes) = update.axes {
                entity.set_axes(axes);
            }

            // A no-change update issues no template-level write
            if entity != before {
                dirty.push(entity.clone());
            }
            entities.push(entity);
        }

        let ids: Vec<EntityId> = entities.iter().map(|e| *e.id()).collect();
        if !dirty.is_empty() {
            self.repository.update_entities(&dirty).await?;
        }

        let summary = self.engine.propagate(entities, ctx.scope()).await?;
        info!(updated = summary.updated, "Update propagated");
        Ok(ids)
    }

    /// Re-propagates everything the given templates own, typically after a
    /// host was newly linked
    ///
    /// `host_ids` narrows the first linkage level to the listed hosts;
    /// `None` covers every linked child within the caller's scope.
    #[instrument(skip(self, template_ids, host_ids, ctx), fields(caller = %ctx, templates = template_ids.len()))]
    pub async fn sync_to_hosts(
        &self,
        template_ids: &[OwnerId],
        host_ids: Option<&[OwnerId]>,
        ctx: &CallerContext,
    ) -> Result<PropagationSummary, EngineError> {
        let scope = match host_ids {
            Some(hosts) => SyncScope::Hosts(hosts.iter().copied().collect()),
            None => ctx.scope().clone(),
        };

        self.repository.begin().await?;
        match self.sync_inner(template_ids, &scope).await {
            Ok(summary) => {
                self.repository.commit().await?;
                Ok(summary)
            }
            Err(err) => {
                self.roll_back().await;
                Err(err)
            }
        }
    }

    async fn sync_inner(
        &self,
        template_ids: &[OwnerId],
        scope: &SyncScope,
    ) -> Result<PropagationSummary, EngineError> {
        let mut seeds = Vec::new();

        for template_id in template_ids {
            let owner = self
                .repository
                .get_owner(template_id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    kind: "template",
                    id: template_id.to_string(),
                })?;
            if !owner.is_template() {
                return Err(EngineError::Validation(DomainError::ValidationFailed(
                    format!("owner \"{}\" is a host, not a template", owner.name()),
                )));
            }
            // A cyclic linkage graph is rejected up front, before any write
            self.linkage.linked_hosts(template_id).await?;
            seeds.extend(self.repository.entities_by_owner(template_id).await?);
        }

        let summary = self.engine.propagate(seeds, scope).await?;
        info!(
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            "Resync complete"
        );
        Ok(summary)
    }

    fn check_batch_size(&self, len: usize) -> Result<(), EngineError> {
        if len > self.max_batch {
            return Err(EngineError::Validation(DomainError::ValidationFailed(
                format!("batch of {len} exceeds the limit of {}", self.max_batch),
            )));
        }
        Ok(())
    }

    /// Best-effort rollback; the original error stays the primary failure
    async fn roll_back(&self) {
        if let Err(err) = self.repository.rollback().await {
            warn!(error = %err, "Rollback failed");
        }
    }
}

fn duplicate_name(name: &EntityName, owner_id: &OwnerId) -> EngineError {
    EngineError::Validation(DomainError::ValidationFailed(format!(
        "entity \"{name}\" already exists on owner {owner_id}"
    )))
}
