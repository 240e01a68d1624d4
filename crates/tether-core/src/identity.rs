//! Identity types for hooks, cells, owners, and listeners
//!
//! Endpoints never point at each other; they reference cells and owners by
//! id, so the fusion graph is a set of many-to-one index relations instead
//! of a pointer cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a hook (a typed endpoint bound to one cell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HookId(pub u64);

impl HookId {
    /// Create a new hook ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook:{}", self.0)
    }
}

/// Unique identifier for a nexus (the shared value cell of a fusion domain)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NexusId(pub u64);

impl NexusId {
    /// Create a new nexus ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NexusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nexus:{}", self.0)
    }
}

/// Unique identifier for an owner (a record of jointly validated components)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl OwnerId {
    /// Create a new owner ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner:{}", self.0)
    }
}

/// Identifier for a change listener registered on a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", HookId::new(42)), "hook:42");
        assert_eq!(format!("{}", NexusId::new(7)), "nexus:7");
        assert_eq!(format!("{}", OwnerId::new(1)), "owner:1");
        assert_eq!(format!("{}", ListenerId(3)), "listener:3");
    }

    #[test]
    fn test_id_raw() {
        assert_eq!(HookId::new(42).raw(), 42);
        assert_eq!(NexusId::new(7).raw(), 7);
    }
}
