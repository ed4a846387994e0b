//! Domain entities and business logic
//!
//! Core domain types for Templink:
//! - Newtypes for type-safe identifiers and validated symbolic keys
//! - Composite entities, component references, and axis configuration
//! - Linkage edges and the adjacency view used for traversal
//! - Conflict records
//! - Caller context
//! - Domain and engine error types

pub mod conflict;
pub mod context;
pub mod entity;
pub mod errors;
pub mod linkage;
pub mod newtypes;

// Re-export commonly used types
pub use conflict::{Conflict, ConflictReason};
pub use context::{CallerContext, SyncScope};
pub use entity::{
    AxisBound, AxisConfig, AxisSide, ComponentRef, DisplayAttrs, DrawStyle, Entity, Item, Owner,
    OwnerKind,
};
pub use errors::{DomainError, EngineError};
pub use linkage::{Linkage, LinkageSet};
pub use newtypes::*;
