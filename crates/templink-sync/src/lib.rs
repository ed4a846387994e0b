//! Templink Sync - Template inheritance propagation
//!
//! Orchestrates the flow from a template-level change to consistent copies
//! on every linked host:
//!
//! 1. **Change Driver** - validates caller input and owns the transaction
//! 2. **Linkage resolution** - walks the template-to-host graph level by level
//! 3. **Item resolution** - maps template item references to host equivalents
//!    by symbolic key
//! 4. **Engine** - classifies, conflict-checks, and applies each level,
//!    recursing through intermediate templates until a fixpoint
//!
//! All storage access goes through the `EntityRepository` port defined in
//! `templink-core`; conflict checks live in `templink-conflict`.

pub mod driver;
pub mod engine;
pub mod items;
pub mod linkage;

pub use driver::{ChangeDriver, ComponentDraft, EntityDraft, EntityUpdate};
pub use engine::{PropagationSummary, RunState, SyncEngine};
pub use items::ItemResolver;
pub use linkage::LinkageResolver;
