//! Item identity resolution
//!
//! Numeric item ids are owner-local: the same logical data source carries a
//! different id on every host. The [`ItemResolver`] translates a
//! template-scoped item reference into the equivalent host-scoped one by
//! matching the symbolic key. Pure lookups, no mutation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use templink_core::domain::entity::Entity;
use templink_core::domain::errors::EngineError;
use templink_core::domain::newtypes::{ItemId, OwnerId};
use templink_core::ports::EntityRepository;

/// Resolves template item references to host-local equivalents by key
pub struct ItemResolver {
    repository: Arc<dyn EntityRepository>,
}

impl ItemResolver {
    pub fn new(repository: Arc<dyn EntityRepository>) -> Self {
        Self { repository }
    }

    /// Finds the item on `host_id` sharing the symbolic key of
    /// `template_item_id`
    ///
    /// Returns `None` when the host has no item with that key; hosts are
    /// heterogeneous and missing equivalents are expected, so this is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` if the template item itself does not
    /// exist; an entity referencing a missing item is a data bug.
    pub async fn resolve(
        &self,
        template_item_id: &ItemId,
        host_id: &OwnerId,
    ) -> Result<Option<ItemId>, EngineError> {
        let item = self
            .repository
            .get_item(template_item_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                kind: "item",
                id: template_item_id.to_string(),
            })?;

        let equivalent = self.repository.item_by_key(host_id, item.key()).await?;
        Ok(equivalent.map(|i| *i.id()))
    }

    /// Resolves every item reference of `entity` (components and
    /// item-driven axis bounds) against one host
    ///
    /// Returns the full template-to-host item map, or `None` as soon as
    /// any single reference has no host equivalent - in which case the
    /// host is ineligible for this entity and the caller skips it.
    pub async fn resolve_for(
        &self,
        entity: &Entity,
        host_id: &OwnerId,
    ) -> Result<Option<HashMap<ItemId, ItemId>>, EngineError> {
        let mut map = HashMap::new();

        for item_id in entity.referenced_item_ids() {
            if map.contains_key(&item_id) {
                continue;
            }
            match self.resolve(&item_id, host_id).await? {
                Some(host_item_id) => {
                    map.insert(item_id, host_item_id);
                }
                None => {
                    debug!(
                        entity = %entity.name(),
                        item = %item_id,
                        host = %host_id,
                        "No equivalent item on host, entity not applicable"
                    );
                    return Ok(None);
                }
            }
        }

        Ok(Some(map))
    }
}
