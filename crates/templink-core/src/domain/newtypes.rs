//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for identifiers and symbolic values used across
//! the propagation engine. Numeric ids are owner-local in the original data
//! model, so every id here is an opaque UUID; equivalence across owners is
//! established only through [`ItemKey`] matching.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random id
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an id from an existing UUID
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID value
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Create a nil (all zeros) id
            #[must_use]
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| DomainError::InvalidId(format!("Invalid UUID: {e}")))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id! {
    /// Identifier for composite entities (template-level or host-level)
    EntityId
}

uuid_id! {
    /// Identifier for entity owners: hosts and templates share one id space
    OwnerId
}

uuid_id! {
    /// Identifier for data-source items
    ItemId
}

uuid_id! {
    /// Identifier for a single component reference within an entity
    ComponentId
}

// ============================================================================
// EntityName
// ============================================================================

/// Maximum entity name length, matching the original schema column width.
const MAX_NAME_LEN: usize = 128;

/// Validated, non-empty name of a composite entity
///
/// `(owner, name)` is the sibling-uniqueness key and the collision key used
/// by conflict detection, so names are trimmed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityName(String);

impl EntityName {
    /// Creates a validated entity name
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidName` if the trimmed name is empty or
    /// exceeds the maximum length.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(DomainError::InvalidName("name must not be empty".into()));
        }
        if trimmed.len() > MAX_NAME_LEN {
            return Err(DomainError::InvalidName(format!(
                "name exceeds {MAX_NAME_LEN} characters"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntityName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// ============================================================================
// ItemKey
// ============================================================================

/// Symbolic key of a data-source item (e.g. `cpu.load` or `net.if.in[eth0]`)
///
/// Numeric item ids differ per owner; this key is the only value that
/// identifies equivalent items across a template and its linked hosts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    /// Creates a validated item key
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidKey` if the key is empty or contains
    /// whitespace.
    pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();

        if key.is_empty() {
            return Err(DomainError::InvalidKey("key must not be empty".into()));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidKey(format!(
                "key must not contain whitespace: {key:?}"
            )));
        }

        Ok(Self(key))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
