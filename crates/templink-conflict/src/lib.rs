//! Templink Conflict - Conflict detection for inheritance propagation
//!
//! Provides:
//! - Name collision checks against existing host state
//! - Structural match checks for updates of inherited entities
//! - Fan-in claim tracking with a documented first-seen-wins tie-break

pub mod claims;
pub mod detector;

pub use claims::ClaimTable;
pub use detector::{ConflictDetector, Detection};
