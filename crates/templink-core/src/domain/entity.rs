//! Composite configuration entities
//!
//! An [`Entity`] is an ordered bundle of data-source references plus axis
//! parameters, owned either by a template (a definition to be inherited)
//! or by a host (the inherited projection, or a locally authored one).
//!
//! Ownership and origin are orthogonal:
//!
//! | owner kind | `source_id`  | meaning                              |
//! |------------|--------------|--------------------------------------|
//! | Template   | `None`       | template-level definition            |
//! | Template   | `Some(..)`   | inherited from a higher-level template |
//! | Host       | `Some(..)`   | projection maintained by the engine  |
//! | Host       | `None`       | locally authored, invisible to propagation |

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{ComponentId, EntityId, EntityName, ItemId, OwnerId};

// ============================================================================
// Owners
// ============================================================================

/// Kind of an entity owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    /// A concrete monitored endpoint
    Host,
    /// An owner of definitions meant to be inherited by linked hosts
    Template,
}

/// An owner of entities and items: a host or a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    id: OwnerId,
    name: String,
    kind: OwnerKind,
}

impl Owner {
    /// Creates an owner with a fresh id
    pub fn new(name: impl Into<String>, kind: OwnerKind) -> Self {
        Self {
            id: OwnerId::new(),
            name: name.into(),
            kind,
        }
    }

    /// Creates an owner with a known id
    pub fn with_id(id: OwnerId, name: impl Into<String>, kind: OwnerKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }

    pub fn id(&self) -> &OwnerId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OwnerKind {
        self.kind
    }

    /// Returns true if this owner is a template
    pub fn is_template(&self) -> bool {
        matches!(self.kind, OwnerKind::Template)
    }
}

// ============================================================================
// Data-source items
// ============================================================================

/// A data source belonging to exactly one owner
///
/// Items are looked up during propagation, never created or renamed by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    owner_id: OwnerId,
    key: super::newtypes::ItemKey,
}

impl Item {
    /// Creates an item with a fresh id
    pub fn new(owner_id: OwnerId, key: super::newtypes::ItemKey) -> Self {
        Self {
            id: ItemId::new(),
            owner_id,
            key,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn key(&self) -> &super::newtypes::ItemKey {
        &self.key
    }
}

// ============================================================================
// Component references
// ============================================================================

/// Line rendering style of a component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawStyle {
    #[default]
    Line,
    Filled,
    Bold,
    Dot,
    Dashed,
    Gradient,
}

/// Which vertical axis a component is plotted against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSide {
    #[default]
    Left,
    Right,
}

/// Rendering attributes carried by a component reference
///
/// Copied verbatim during propagation; the engine never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAttrs {
    /// Hex color without the leading `#`, e.g. `1A7C11`
    pub color: String,
    pub draw_style: DrawStyle,
    pub axis_side: AxisSide,
}

impl Default for DisplayAttrs {
    fn default() -> Self {
        Self {
            color: "1A7C11".to_string(),
            draw_style: DrawStyle::default(),
            axis_side: AxisSide::default(),
        }
    }
}

/// An ordered pointer from an entity to one of its data-source items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRef {
    id: ComponentId,
    item_id: ItemId,
    ordinal: u32,
    display: DisplayAttrs,
}

impl ComponentRef {
    /// Creates a component reference with a fresh id
    pub fn new(item_id: ItemId, ordinal: u32, display: DisplayAttrs) -> Self {
        Self {
            id: ComponentId::new(),
            item_id,
            ordinal,
            display,
        }
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn display(&self) -> &DisplayAttrs {
        &self.display
    }

    /// Returns a copy pointing at a different item, keeping ordinal and
    /// display attributes; used when projecting onto a host
    pub fn retargeted(&self, item_id: ItemId) -> Self {
        Self {
            id: ComponentId::new(),
            item_id,
            ordinal: self.ordinal,
            display: self.display.clone(),
        }
    }
}

// ============================================================================
// Axis configuration
// ============================================================================

/// One bound of the value axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum AxisBound {
    /// Derived from the plotted data
    Calculated,
    /// A fixed value
    Fixed(f64),
    /// Driven by an item's latest value; resolved per host like any
    /// component reference
    Item(ItemId),
}

impl Default for AxisBound {
    fn default() -> Self {
        Self::Calculated
    }
}

impl AxisBound {
    /// Returns the driving item id, if this bound is item-driven
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            Self::Item(id) => Some(id),
            _ => None,
        }
    }
}

/// Min/max bounds of the value axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub min: AxisBound,
    pub max: AxisBound,
}

impl AxisConfig {
    /// Item ids referenced by either bound
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.min.item_id().into_iter().chain(self.max.item_id())
    }
}

// ============================================================================
// Entity
// ============================================================================

/// A composite configuration entity
///
/// See the module docs for how `owner` kind and `source_id` combine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EntityData")]
pub struct Entity {
    id: EntityId,
    owner_id: OwnerId,
    name: EntityName,
    components: Vec<ComponentRef>,
    axes: AxisConfig,
    /// Id of the template-level entity this one was projected from;
    /// `None` for definitions and locally authored entities
    source_id: Option<EntityId>,
}

/// Wire form of [`Entity`]; revalidated on the way in so a decoded entity
/// upholds the same invariants as a constructed one
#[derive(Deserialize)]
struct EntityData {
    id: EntityId,
    owner_id: OwnerId,
    name: EntityName,
    components: Vec<ComponentRef>,
    axes: AxisConfig,
    source_id: Option<EntityId>,
}

impl TryFrom<EntityData> for Entity {
    type Error = DomainError;

    fn try_from(data: EntityData) -> Result<Self, Self::Error> {
        if data.components.is_empty() {
            return Err(DomainError::MissingComponents(data.name.to_string()));
        }
        let mut components = data.components;
        components.sort_by_key(ComponentRef::ordinal);

        Ok(Self {
            id: data.id,
            owner_id: data.owner_id,
            name: data.name,
            components,
            axes: data.axes,
            source_id: data.source_id,
        })
    }
}

impl Entity {
    /// Creates a template-level or locally authored entity
    ///
    /// Components are sorted by ordinal at construction so rendering order
    /// is stable regardless of input order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MissingComponents` if `components` is empty.
    pub fn new(
        owner_id: OwnerId,
        name: EntityName,
        mut components: Vec<ComponentRef>,
        axes: AxisConfig,
    ) -> Result<Self, DomainError> {
        if components.is_empty() {
            return Err(DomainError::MissingComponents(name.to_string()));
        }
        components.sort_by_key(ComponentRef::ordinal);

        Ok(Self {
            id: EntityId::new(),
            owner_id,
            name,
            components,
            axes,
            source_id: None,
        })
    }

    // --- Getters ---

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn name(&self) -> &EntityName {
        &self.name
    }

    pub fn components(&self) -> &[ComponentRef] {
        &self.components
    }

    pub fn axes(&self) -> &AxisConfig {
        &self.axes
    }

    pub fn source_id(&self) -> Option<&EntityId> {
        self.source_id.as_ref()
    }

    /// Returns true if this entity was projected from a template definition
    pub fn is_inherited(&self) -> bool {
        self.source_id.is_some()
    }

    // --- Setters (template-level update path) ---

    pub fn set_name(&mut self, name: EntityName) {
        self.name = name;
    }

    pub fn set_axes(&mut self, axes: AxisConfig) {
        self.axes = axes;
    }

    /// Replaces the component list, keeping ordinal order
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MissingComponents` if `components` is empty.
    pub fn set_components(&mut self, mut components: Vec<ComponentRef>) -> Result<(), DomainError> {
        if components.is_empty() {
            return Err(DomainError::MissingComponents(self.name.to_string()));
        }
        components.sort_by_key(ComponentRef::ordinal);
        self.components = components;
        Ok(())
    }

    // --- Propagation support ---

    /// Every item id this entity references: component items in ordinal
    /// order, then axis-driving items. Duplicates are kept; resolution maps
    /// them identically anyway.
    pub fn referenced_item_ids(&self) -> Vec<ItemId> {
        self.components
            .iter()
            .map(|c| *c.item_id())
            .chain(self.axes.item_ids().copied())
            .collect()
    }

    /// Projects this entity onto a host, re-pointing every item reference
    /// through `item_map` (template item id -> host item id)
    ///
    /// The caller guarantees `item_map` covers every referenced item;
    /// missing entries mean the host should have been skipped during
    /// classification.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationFailed` if an item id is missing
    /// from the map.
    pub fn project(
        &self,
        host_id: OwnerId,
        item_map: &HashMap<ItemId, ItemId>,
    ) -> Result<Entity, DomainError> {
        let map_item = |id: &ItemId| {
            item_map.get(id).copied().ok_or_else(|| {
                DomainError::ValidationFailed(format!(
                    "unresolved item {id} while projecting \"{}\"",
                    self.name
                ))
            })
        };

        let components = self
            .components
            .iter()
            .map(|c| Ok(c.retargeted(map_item(c.item_id())?)))
            .collect::<Result<Vec<_>, DomainError>>()?;

        let map_bound = |bound: &AxisBound| -> Result<AxisBound, DomainError> {
            Ok(match bound {
                AxisBound::Item(id) => AxisBound::Item(map_item(id)?),
                other => *other,
            })
        };

        Ok(Entity {
            id: EntityId::new(),
            owner_id: host_id,
            name: self.name.clone(),
            components,
            axes: AxisConfig {
                min: map_bound(&self.axes.min)?,
                max: map_bound(&self.axes.max)?,
            },
            source_id: Some(self.id),
        })
    }

    /// Returns true if `other` already carries exactly this projection:
    /// same name, same axes, and an ordinal-aligned component list with
    /// identical items and display attributes. Used to classify no-op
    /// updates as skips.
    pub fn matches_projection(&self, other: &Entity) -> bool {
        self.name == other.name
            && self.axes == other.axes
            && self.components.len() == other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| {
                    a.item_id() == b.item_id()
                        && a.ordinal() == b.ordinal()
                        && a.display() == b.display()
                })
    }

    /// Rewrites an existing host entity in place from a fresh projection,
    /// keeping the stable entity id
    pub fn apply_projection(&mut self, projection: Entity) {
        self.name = projection.name;
        self.components = projection.components;
        self.axes = projection.axes;
        self.source_id = projection.source_id;
    }
}
