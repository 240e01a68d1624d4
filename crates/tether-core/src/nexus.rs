//! The shared value cell
//!
//! A `Nexus` is the single source of truth for every hook fused to it. It is
//! only mutated by the engine's submission path, which keeps `previous` as
//! the rollback point for the transaction in flight.

use crate::identity::{HookId, NexusId};
use crate::value::Value;
use indexmap::IndexSet;

/// A value cell shared by one or more fused hooks
///
/// Invariant: `hooks` is never empty while the cell exists; every attached
/// hook, queried independently, reports exactly `current`.
#[derive(Debug, Clone)]
pub(crate) struct Nexus {
    /// This cell's identity
    pub(crate) id: NexusId,
    /// The authoritative value
    pub(crate) current: Value,
    /// The value before the most recent change, kept for rollback
    pub(crate) previous: Value,
    /// The fusion domain: every hook attached to this cell
    pub(crate) hooks: IndexSet<HookId>,
}

impl Nexus {
    /// Create a fresh cell holding `value` with a single attached hook
    pub(crate) fn singleton(id: NexusId, hook: HookId, value: Value) -> Self {
        let mut hooks = IndexSet::new();
        hooks.insert(hook);
        Self {
            id,
            previous: value.clone(),
            current: value,
            hooks,
        }
    }

    /// Check whether this cell has exactly one attached hook
    pub(crate) fn is_singleton(&self) -> bool {
        self.hooks.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_cell() {
        let nexus = Nexus::singleton(NexusId::new(0), HookId::new(1), Value::Int(5));
        assert!(nexus.is_singleton());
        assert!(nexus.hooks.contains(&HookId::new(1)));
        assert_eq!(nexus.current, Value::Int(5));
        assert_eq!(nexus.previous, Value::Int(5));
        assert_eq!(nexus.id, NexusId::new(0));
    }
}
