//! Entity repository port (driven/secondary port)
//!
//! Interface to the persistent store holding owners, entities, items, and
//! the linkage table. The engine and its resolvers read through this trait
//! and issue batched writes; they never touch storage directly.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - The transaction methods exist because the abort-on-first-conflict
//!   guarantee lives at this seam: the Change Driver opens one transaction
//!   per invocation and rolls it back on any engine error, so a partially
//!   applied batch is never observable. The engine itself never calls
//!   `begin`/`commit`/`rollback`.
//! - Write operations take slices of domain entities; insertion preserves
//!   slice order so component ordinals survive round trips.

use crate::domain::{
    entity::{Entity, Item, Owner},
    newtypes::{EntityId, ItemId, ItemKey, OwnerId},
};

/// Port trait for the configuration store
#[async_trait::async_trait]
pub trait EntityRepository: Send + Sync {
    // --- Transaction boundary ---

    /// Opens the transaction for one engine invocation
    async fn begin(&self) -> anyhow::Result<()>;

    /// Commits all writes issued since `begin`
    async fn commit(&self) -> anyhow::Result<()>;

    /// Discards all writes issued since `begin`
    async fn rollback(&self) -> anyhow::Result<()>;

    // --- Owner operations ---

    /// Retrieves an owner (host or template) by id
    async fn get_owner(&self, id: &OwnerId) -> anyhow::Result<Option<Owner>>;

    // --- Entity operations ---

    /// Retrieves an entity by id
    async fn get_entity(&self, id: &EntityId) -> anyhow::Result<Option<Entity>>;

    /// Retrieves all entities owned by the given host or template
    async fn entities_by_owner(&self, owner_id: &OwnerId) -> anyhow::Result<Vec<Entity>>;

    /// Inserts a batch of new entities, preserving slice order
    async fn insert_entities(&self, batch: &[Entity]) -> anyhow::Result<()>;

    /// Applies updates to a batch of existing entities, preserving slice order
    async fn update_entities(&self, batch: &[Entity]) -> anyhow::Result<()>;

    // --- Linkage operations ---

    /// Direct children of a template in the linkage table: the hosts and
    /// lower-level templates inheriting from it
    async fn linkage_children(&self, template_id: &OwnerId) -> anyhow::Result<Vec<OwnerId>>;

    // --- Item operations ---

    /// Retrieves an item by id
    async fn get_item(&self, id: &ItemId) -> anyhow::Result<Option<Item>>;

    /// Finds the item on `owner_id` carrying the given symbolic key
    ///
    /// Keys are unique within one owner, so at most one item matches.
    async fn item_by_key(&self, owner_id: &OwnerId, key: &ItemKey)
        -> anyhow::Result<Option<Item>>;
}
