//! Hook records: typed endpoints bound to one cell at a time

use crate::identity::{HookId, ListenerId, NexusId, OwnerId};
use crate::value::Value;

/// A change listener registered on a hook
pub(crate) type Listener = Box<dyn FnMut(&Value) + Send>;

/// Whether a hook can be written from outside or only recomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Read-write: the value may be set from outside
    Owned,
    /// Read-only projection recomputed by its owner after each commit
    Derived,
}

/// The engine-side record backing one hook
///
/// State machine: `Inactive` (`nexus == None`) → active in a singleton cell →
/// optionally fused into a larger cell → back to inactive on deactivate.
pub(crate) struct HookRecord {
    /// This hook's identity
    pub(crate) id: HookId,
    /// The owner this hook belongs to (exactly one, for its whole lifetime)
    pub(crate) owner: OwnerId,
    /// The component key this hook fills in its owner's component map
    pub(crate) key: String,
    /// The cell this hook is attached to; `None` while inactive
    pub(crate) nexus: Option<NexusId>,
    /// Read-write or derived
    pub(crate) kind: HookKind,
    /// Set while a submission is visiting this hook's cell; guards against
    /// re-entrant cascades
    pub(crate) in_submission: bool,
    /// Change listeners, fired only on actual value changes
    pub(crate) listeners: Vec<(ListenerId, Listener)>,
    /// Next listener id for this hook
    pub(crate) next_listener: u64,
}

impl HookRecord {
    pub(crate) fn new(id: HookId, owner: OwnerId, key: String, kind: HookKind) -> Self {
        Self {
            id,
            owner,
            key,
            nexus: None,
            kind,
            in_submission: false,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Register a listener and return its id
    pub(crate) fn add_listener(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener; returns true if it was present
    pub(crate) fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Fire every listener with the new value
    pub(crate) fn notify(&mut self, value: &Value) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_listener_registration() {
        let mut record = HookRecord::new(
            HookId::new(0),
            OwnerId::new(0),
            "value".to_string(),
            HookKind::Owned,
        );

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = record.add_listener(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        record.notify(&Value::Int(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(record.remove_listener(id));
        assert!(!record.remove_listener(id));

        record.notify(&Value::Int(2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_record_is_inactive() {
        let record = HookRecord::new(
            HookId::new(0),
            OwnerId::new(0),
            "value".to_string(),
            HookKind::Owned,
        );
        assert!(record.nexus.is_none());
        assert!(!record.in_submission);
    }
}
