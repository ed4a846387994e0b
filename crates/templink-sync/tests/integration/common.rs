//! Shared test helpers
//!
//! Provides an in-memory `EntityRepository` with snapshot-based
//! transactions, so tests can observe that a failed run leaves the store
//! byte-for-byte unchanged, plus small fixture builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use templink_core::config::Config;
use templink_core::domain::entity::{
    AxisConfig, ComponentRef, DisplayAttrs, Entity, Item, Owner, OwnerKind,
};
use templink_core::domain::linkage::{Linkage, LinkageSet};
use templink_core::domain::newtypes::{EntityId, EntityName, ItemId, ItemKey, OwnerId};
use templink_core::ports::EntityRepository;
use templink_sync::{ChangeDriver, ComponentDraft, EntityDraft};

/// Everything the repository holds; cloneable so `begin` can snapshot it
#[derive(Debug, Clone, Default)]
struct Tables {
    owners: HashMap<OwnerId, Owner>,
    entities: Vec<Entity>,
    items: Vec<Item>,
    links: LinkageSet,
}

/// In-memory repository with whole-store snapshot transactions
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    snapshot: Mutex<Option<Tables>>,
    writes: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // --- Seeding (outside any transaction) ---

    pub fn add_owner(&self, name: &str, kind: OwnerKind) -> OwnerId {
        let owner = Owner::new(name, kind);
        let id = *owner.id();
        self.tables.lock().unwrap().owners.insert(id, owner);
        id
    }

    pub fn add_host(&self, name: &str) -> OwnerId {
        self.add_owner(name, OwnerKind::Host)
    }

    pub fn add_template(&self, name: &str) -> OwnerId {
        self.add_owner(name, OwnerKind::Template)
    }

    pub fn add_item(&self, owner: OwnerId, key: &str) -> ItemId {
        let item = Item::new(owner, ItemKey::new(key).unwrap());
        let id = *item.id();
        self.tables.lock().unwrap().items.push(item);
        id
    }

    pub fn link(&self, template: OwnerId, child: OwnerId) {
        self.tables
            .lock()
            .unwrap()
            .links
            .add(Linkage::new(template, child));
    }

    pub fn add_entity(&self, entity: Entity) -> EntityId {
        let id = *entity.id();
        self.tables.lock().unwrap().entities.push(entity);
        id
    }

    // --- Assertion helpers ---

    pub fn entity_count(&self) -> usize {
        self.tables.lock().unwrap().entities.len()
    }

    pub fn entities_of(&self, owner: &OwnerId) -> Vec<Entity> {
        self.tables
            .lock()
            .unwrap()
            .entities
            .iter()
            .filter(|e| e.owner_id() == owner)
            .cloned()
            .collect()
    }

    pub fn entity(&self, id: &EntityId) -> Option<Entity> {
        self.tables
            .lock()
            .unwrap()
            .entities
            .iter()
            .find(|e| e.id() == id)
            .cloned()
    }

    /// Number of entities handed to `insert_entities` or `update_entities`,
    /// including writes that were later rolled back
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Canonical listing of every entity for before/after comparisons
    pub fn fingerprint(&self) -> Vec<(OwnerId, String, Option<EntityId>)> {
        let mut rows: Vec<_> = self
            .tables
            .lock()
            .unwrap()
            .entities
            .iter()
            .map(|e| (*e.owner_id(), e.name().to_string(), e.source_id().copied()))
            .collect();
        rows.sort();
        rows
    }
}

#[async_trait]
impl EntityRepository for MemoryRepository {
    async fn begin(&self) -> anyhow::Result<()> {
        let mut snapshot = self.snapshot.lock().unwrap();
        if snapshot.is_some() {
            anyhow::bail!("nested transaction");
        }
        *snapshot = Some(self.tables.lock().unwrap().clone());
        Ok(())
    }

    async fn commit(&self) -> anyhow::Result<()> {
        self.snapshot
            .lock()
            .unwrap()
            .take()
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("commit without transaction"))
    }

    async fn rollback(&self) -> anyhow::Result<()> {
        let restored = self
            .snapshot
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("rollback without transaction"))?;
        *self.tables.lock().unwrap() = restored;
        Ok(())
    }

    async fn get_owner(&self, id: &OwnerId) -> anyhow::Result<Option<Owner>> {
        Ok(self.tables.lock().unwrap().owners.get(id).cloned())
    }

    async fn get_entity(&self, id: &EntityId) -> anyhow::Result<Option<Entity>> {
        Ok(self.entity(id))
    }

    async fn entities_by_owner(&self, owner_id: &OwnerId) -> anyhow::Result<Vec<Entity>> {
        Ok(self.entities_of(owner_id))
    }

    async fn insert_entities(&self, batch: &[Entity]) -> anyhow::Result<()> {
        self.writes.fetch_add(batch.len(), Ordering::SeqCst);
        self.tables
            .lock()
            .unwrap()
            .entities
            .extend_from_slice(batch);
        Ok(())
    }

    async fn update_entities(&self, batch: &[Entity]) -> anyhow::Result<()> {
        self.writes.fetch_add(batch.len(), Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        for updated in batch {
            let slot = tables
                .entities
                .iter_mut()
                .find(|e| e.id() == updated.id())
                .ok_or_else(|| anyhow::anyhow!("update of unknown entity {}", updated.id()))?;
            *slot = updated.clone();
        }
        Ok(())
    }

    async fn linkage_children(&self, template_id: &OwnerId) -> anyhow::Result<Vec<OwnerId>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .links
            .children_of(template_id)
            .to_vec())
    }

    async fn get_item(&self, id: &ItemId) -> anyhow::Result<Option<Item>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .items
            .iter()
            .find(|i| i.id() == id)
            .cloned())
    }

    async fn item_by_key(&self, owner_id: &OwnerId, key: &ItemKey) -> anyhow::Result<Option<Item>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .items
            .iter()
            .find(|i| i.owner_id() == owner_id && i.key() == key)
            .cloned())
    }
}

// --- Fixture builders ---

/// A validated entity referencing the given items, ordinals by position
pub fn entity_on(owner: OwnerId, name: &str, item_ids: &[ItemId]) -> Entity {
    let components = item_ids
        .iter()
        .enumerate()
        .map(|(i, id)| ComponentRef::new(*id, i as u32, DisplayAttrs::default()))
        .collect();
    Entity::new(
        owner,
        EntityName::new(name).unwrap(),
        components,
        AxisConfig::default(),
    )
    .unwrap()
}

/// A draft as a caller would submit it
pub fn draft(owner_id: OwnerId, name: &str, item_ids: &[ItemId]) -> EntityDraft {
    EntityDraft {
        owner_id,
        name: name.to_string(),
        components: item_ids
            .iter()
            .map(|id| ComponentDraft {
                item_id: *id,
                ordinal: None,
                display: None,
            })
            .collect(),
        axes: None,
    }
}

pub fn driver(repo: &Arc<MemoryRepository>) -> ChangeDriver {
    ChangeDriver::new(
        Arc::clone(repo) as Arc<dyn EntityRepository>,
        &Config::default(),
    )
}
