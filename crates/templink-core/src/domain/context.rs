//! Caller context
//!
//! Permission checks happen before the engine is invoked; the engine trusts
//! its input. What it still needs is an explicit record of who is calling
//! and how wide the call is allowed to reach, passed into every entry point
//! instead of read from ambient session state.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::newtypes::OwnerId;

/// How far a propagation call may reach
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    /// All transitively linked hosts
    #[default]
    AllLinked,
    /// Only the listed hosts (and only where actually linked)
    Hosts(HashSet<OwnerId>),
}

impl SyncScope {
    /// Returns true if `host` falls within this scope
    pub fn includes(&self, host: &OwnerId) -> bool {
        match self {
            Self::AllLinked => true,
            Self::Hosts(hosts) => hosts.contains(host),
        }
    }
}

/// Identity and scope of the caller invoking the Change Driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Authenticated user on whose behalf the call runs
    user: String,
    scope: SyncScope,
}

impl CallerContext {
    /// Context for a caller allowed to reach every linked host
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            scope: SyncScope::AllLinked,
        }
    }

    /// Context restricted to an explicit host subset
    pub fn scoped(user: impl Into<String>, hosts: HashSet<OwnerId>) -> Self {
        Self {
            user: user.into(),
            scope: SyncScope::Hosts(hosts),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn scope(&self) -> &SyncScope {
        &self.scope
    }
}

impl fmt::Display for CallerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user)
    }
}
