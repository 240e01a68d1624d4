//! The binding and transaction engine
//!
//! The `Engine` owns the whole fusion graph in three arenas (hooks, cells,
//! owners) and is the only place state is mutated. All operations are
//! synchronous and complete before returning; a submission transaction runs
//! completion, isolation validation, the per-cell commits, rollback on
//! rejection, derived recompute, and listener notification inside a single
//! `&mut self` borrow, so no caller can observe a partially-committed state.
//!
//! ## Transaction shape
//!
//! ```text
//! submit(owner, partial)
//!  │
//!  ├── complete(current, partial) → extra        (domain rules)
//!  ├── validate(candidate)                       (initiating owner)
//!  ├── for each changed component:
//!  │     cell submit, excluding the writing hook
//!  │      ├── validate at every other attached hook   (fused owners)
//!  │      └── write current, keep previous for rollback
//!  ├── on any rejection: restore every touched cell, propagate
//!  └── on success: notify listeners, recompute derived projections
//! ```

use crate::error::{Error, Result};
use crate::hook::{HookKind, HookRecord};
use crate::identity::{HookId, ListenerId, NexusId, OwnerId};
use crate::nexus::Nexus;
use crate::owner::{DerivedSlot, OwnerRecord, Schema, Validation};
use crate::sync::SyncMode;
use crate::value::{Value, ValueMap};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;

/// Rollback and notification bookkeeping for one transaction
#[derive(Default)]
struct Txn {
    /// Cells written so far: (cell, saved current, saved previous)
    touched: Vec<(NexusId, Value, Value)>,
    /// Cells whose value actually changed, with the hooks excluded from
    /// notification for that write
    changed: Vec<(NexusId, HashSet<HookId>)>,
    /// Hooks flagged `in_submission`, cleared when the transaction ends
    flagged: Vec<HookId>,
}

/// The reactive binding engine: arena of hooks, cells, and owners
///
/// Construct one explicitly and pass it where it is needed; there is no
/// process-wide default instance. For cross-thread sharing wrap it in a
/// [`SharedEngine`](crate::SharedEngine).
#[derive(Default)]
pub struct Engine {
    hooks: IndexMap<HookId, HookRecord>,
    nexuses: IndexMap<NexusId, Nexus>,
    owners: IndexMap<OwnerId, OwnerRecord>,
    next_hook: u64,
    next_nexus: u64,
    next_owner: u64,
}

impl Engine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Owner and hook lifecycle
    // ========================================================================

    /// Register an owner with its completion/validation schema
    pub fn register_owner(&mut self, schema: impl Schema + 'static) -> OwnerId {
        let id = OwnerId(self.next_owner);
        self.next_owner += 1;
        self.owners.insert(id, OwnerRecord::new(id, Box::new(schema)));
        id
    }

    /// Construct and activate an owned hook in a fresh singleton cell
    pub fn create_hook(
        &mut self,
        owner: OwnerId,
        key: impl Into<String>,
        initial: impl Into<Value>,
    ) -> Result<HookId> {
        let hook = self.add_inactive_hook(owner, key)?;
        self.activate(hook, initial)?;
        Ok(hook)
    }

    /// Construct an owned hook without attaching it to a cell yet
    pub fn add_inactive_hook(&mut self, owner: OwnerId, key: impl Into<String>) -> Result<HookId> {
        let key = key.into();
        let record = self
            .owners
            .get_mut(&owner)
            .ok_or(Error::UnknownOwner(owner))?;
        if record.has_key(&key) {
            return Err(Error::DuplicateComponent {
                owner: record.id,
                key,
            });
        }
        let id = HookId(self.next_hook);
        self.next_hook += 1;
        record.components.insert(key.clone(), id);
        self.hooks
            .insert(id, HookRecord::new(id, owner, key, HookKind::Owned));
        Ok(id)
    }

    /// Attach an inactive hook to a fresh singleton cell seeded with `initial`
    pub fn activate(&mut self, hook: HookId, initial: impl Into<Value>) -> Result<()> {
        let record = self.hooks.get(&hook).ok_or(Error::UnknownHook(hook))?;
        if record.nexus.is_some() {
            return Err(Error::AlreadyActive(record.id));
        }
        let nexus_id = NexusId(self.next_nexus);
        self.next_nexus += 1;
        self.nexuses
            .insert(nexus_id, Nexus::singleton(nexus_id, hook, initial.into()));
        if let Some(record) = self.hooks.get_mut(&hook) {
            record.nexus = Some(nexus_id);
        }
        Ok(())
    }

    /// Detach a hook if fused, then drop its cell and return it to Inactive
    ///
    /// Deactivating an already-inactive hook is a no-op. Former fusion
    /// partners keep their cell and stay fused to each other.
    pub fn deactivate(&mut self, hook: HookId) -> Result<()> {
        let record = self.hooks.get(&hook).ok_or(Error::UnknownHook(hook))?;
        let nexus_id = match record.nexus {
            Some(id) => id,
            None => return Ok(()),
        };
        if !self.nexuses[&nexus_id].is_singleton() {
            self.detach(hook)?;
        }
        if let Some(solo) = self.hooks.get_mut(&hook).and_then(|r| r.nexus.take()) {
            self.nexuses.shift_remove(&solo);
        }
        Ok(())
    }

    /// Register a derived (read-only) projection on an owner
    ///
    /// The projection is recomputed from the full primary component map after
    /// each successful commit touching this owner, and seeded immediately
    /// from the current map. Derived hooks live in private singleton cells,
    /// reject writes, and never veto a transaction.
    pub fn register_derived(
        &mut self,
        owner: OwnerId,
        key: impl Into<String>,
        compute: impl Fn(&ValueMap) -> Value + Send + 'static,
    ) -> Result<HookId> {
        let key = key.into();
        let current = self.component_values(owner)?;
        let initial = compute(&current);

        let record = self
            .owners
            .get_mut(&owner)
            .ok_or(Error::UnknownOwner(owner))?;
        if record.has_key(&key) {
            return Err(Error::DuplicateComponent {
                owner: record.id,
                key,
            });
        }
        let id = HookId(self.next_hook);
        self.next_hook += 1;
        record.derived.insert(
            key.clone(),
            DerivedSlot {
                hook: id,
                compute: Box::new(compute),
            },
        );
        self.hooks
            .insert(id, HookRecord::new(id, owner, key, HookKind::Derived));
        self.activate(id, initial)?;
        Ok(id)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get the value a hook currently observes
    pub fn value(&self, hook: HookId) -> Result<Value> {
        let record = self.hooks.get(&hook).ok_or(Error::UnknownHook(hook))?;
        let nexus = record.nexus.ok_or(Error::InactiveHook(record.id))?;
        Ok(self.nexuses[&nexus].current.clone())
    }

    /// Get the value a hook's cell held before its most recent change
    pub fn previous(&self, hook: HookId) -> Result<Value> {
        let record = self.hooks.get(&hook).ok_or(Error::UnknownHook(hook))?;
        let nexus = record.nexus.ok_or(Error::InactiveHook(record.id))?;
        Ok(self.nexuses[&nexus].previous.clone())
    }

    /// Check whether a hook is attached to a cell
    pub fn is_active(&self, hook: HookId) -> bool {
        self.hooks
            .get(&hook)
            .map(|r| r.nexus.is_some())
            .unwrap_or(false)
    }

    /// Every hook fused to the same cell as `hook`, in attachment order
    pub fn fusion_domain(&self, hook: HookId) -> Result<Vec<HookId>> {
        let record = self.hooks.get(&hook).ok_or(Error::UnknownHook(hook))?;
        let nexus = record.nexus.ok_or(Error::InactiveHook(record.id))?;
        Ok(self.nexuses[&nexus].hooks.iter().copied().collect())
    }

    /// The full primary component map of an owner at its current values
    pub fn component_values(&self, owner: OwnerId) -> Result<ValueMap> {
        let record = self.owners.get(&owner).ok_or(Error::UnknownOwner(owner))?;
        let mut map = ValueMap::new();
        for (key, hook) in &record.components {
            map.insert(key.clone(), self.value(*hook)?);
        }
        Ok(map)
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a change listener on a hook
    ///
    /// Listeners fire only on actual value changes, never for the hook a
    /// submission excluded, and receive the new value by reference. They
    /// cannot reach back into the engine.
    pub fn subscribe(
        &mut self,
        hook: HookId,
        listener: impl FnMut(&Value) + Send + 'static,
    ) -> Result<ListenerId> {
        let record = self.hooks.get_mut(&hook).ok_or(Error::UnknownHook(hook))?;
        Ok(record.add_listener(Box::new(listener)))
    }

    /// Remove a change listener; returns true if it was registered
    pub fn unsubscribe(&mut self, hook: HookId, listener: ListenerId) -> Result<bool> {
        let record = self.hooks.get_mut(&hook).ok_or(Error::UnknownHook(hook))?;
        Ok(record.remove_listener(listener))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write a single hook's value, excluding the hook itself from
    /// re-validation and re-notification
    ///
    /// This is the low-level poke; façade setters go through [`Engine::submit`],
    /// which also runs the owner's own completion and validation.
    pub fn set(&mut self, hook: HookId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let record = self.hooks.get(&hook).ok_or(Error::UnknownHook(hook))?;
        if record.kind == HookKind::Derived {
            return Err(Error::ReadOnlyHook(record.id));
        }
        let owner = record.owner;
        let nexus = record.nexus.ok_or(Error::InactiveHook(record.id))?;

        let mut excluding = HashSet::new();
        excluding.insert(hook);
        let mut txn = Txn::default();
        if let Err(err) = self.cell_submit(nexus, &value, &excluding, &mut txn) {
            self.rollback(txn);
            return Err(err);
        }
        self.finish(owner, txn);
        Ok(())
    }

    /// The atomic multi-component transaction entry point
    ///
    /// Completes the partial map via the owner's schema, validates the full
    /// candidate, then commits every changed component to its cell. Each cell
    /// write re-validates against every other attached hook's owner, so
    /// consistency holds transitively across the fusion graph. Any rejection
    /// unwinds every cell already written and propagates.
    pub fn submit(&mut self, owner: OwnerId, partial: ValueMap) -> Result<()> {
        let current = self.component_values(owner)?;
        let record = self.owners.get(&owner).ok_or(Error::UnknownOwner(owner))?;

        for key in partial.keys() {
            if !record.components.contains_key(key) {
                return Err(Error::UnknownComponent {
                    owner: record.id,
                    key: key.clone(),
                });
            }
        }

        // Completion: derive the rest of the target map from the partial one.
        let extra = record.schema.complete(&current, &partial)?;

        let mut candidate = current.clone();
        for (key, value) in &partial {
            candidate.insert(key.clone(), value.clone());
        }
        for (key, value) in &extra {
            if !record.components.contains_key(key) {
                return Err(Error::UnknownComponent {
                    owner: record.id,
                    key: key.clone(),
                });
            }
            candidate.insert(key.clone(), value.clone());
        }

        // Isolation validation by the initiating owner.
        if let Validation::Rejected(reason) = record.schema.validate(&candidate) {
            let (key, value) = offending(&current, &candidate, &partial);
            return Err(Error::InvalidValue { key, value, reason });
        }

        let mut writes: Vec<(HookId, Value)> = Vec::new();
        for (key, value) in &candidate {
            if current.get(key) != Some(value) {
                let hook = *record.components.get(key).ok_or(Error::UnknownComponent {
                    owner: record.id,
                    key: key.clone(),
                })?;
                writes.push((hook, value.clone()));
            }
        }

        let mut txn = Txn::default();
        for (hook, value) in &writes {
            let nexus = match self.hooks.get(hook).and_then(|r| r.nexus) {
                Some(id) => id,
                None => {
                    self.rollback(txn);
                    return Err(Error::InactiveHook(*hook));
                }
            };
            let mut excluding = HashSet::new();
            excluding.insert(*hook);
            if let Err(err) = self.cell_submit(nexus, value, &excluding, &mut txn) {
                self.rollback(txn);
                return Err(err);
            }
        }

        self.finish(owner, txn);
        Ok(())
    }

    /// Merge two hooks' cells into one fusion domain
    ///
    /// All-or-nothing: the resolved authoritative value is validated against
    /// every hook in both domains before any structural change. On success
    /// the caller's cell absorbs the target's hooks and the target cell is
    /// dropped.
    pub fn connect(&mut self, a: HookId, b: HookId, mode: SyncMode) -> Result<()> {
        let ra = self.hooks.get(&a).ok_or(Error::UnknownHook(a))?;
        let rb = self.hooks.get(&b).ok_or(Error::UnknownHook(b))?;
        if ra.kind == HookKind::Derived {
            return Err(Error::ReadOnlyHook(ra.id));
        }
        if rb.kind == HookKind::Derived {
            return Err(Error::ReadOnlyHook(rb.id));
        }
        let na = ra.nexus.ok_or(Error::InactiveHook(ra.id))?;
        let nb = rb.nexus.ok_or(Error::InactiveHook(rb.id))?;
        if na == nb {
            return Err(Error::DisjointnessViolation { a, b });
        }

        let va = self.nexuses[&na].current.clone();
        let vb = self.nexuses[&nb].current.clone();
        let value = match mode {
            SyncMode::Push => va.clone(),
            SyncMode::Pull => vb.clone(),
            SyncMode::AssertEqual => {
                if va != vb {
                    return Err(Error::DivergedValues {
                        left: va,
                        right: vb,
                    });
                }
                va.clone()
            }
        };

        let members_a: Vec<HookId> = self.nexuses[&na].hooks.iter().copied().collect();
        let members_b: Vec<HookId> = self.nexuses[&nb].hooks.iter().copied().collect();

        // Every owner in both domains must accept the resolved value before
        // anything moves.
        for hook in members_a.iter().chain(members_b.iter()) {
            self.validate_at(*hook, &value)?;
        }

        let changed_a = value != va;
        let changed_b = value != vb;

        if let Some(nexus) = self.nexuses.get_mut(&na) {
            if changed_a {
                nexus.previous = std::mem::replace(&mut nexus.current, value.clone());
            }
            for hook in &members_b {
                nexus.hooks.insert(*hook);
            }
        }
        self.nexuses.shift_remove(&nb);
        for hook in &members_b {
            if let Some(record) = self.hooks.get_mut(hook) {
                record.nexus = Some(na);
            }
        }

        // Post-condition: every endpoint in the merged domain reports the
        // resolved value.
        debug_assert!(self.nexuses[&na]
            .hooks
            .iter()
            .all(|h| self.value(*h).map(|v| v == value).unwrap_or(false)));

        if changed_a {
            for hook in &members_a {
                self.notify_hook(*hook, value.clone());
            }
        }
        if changed_b {
            for hook in &members_b {
                self.notify_hook(*hook, value.clone());
            }
        }

        let mut affected: Vec<OwnerId> = Vec::new();
        let moved = match (changed_a, changed_b) {
            (true, true) => members_a.iter().chain(members_b.iter()).collect::<Vec<_>>(),
            (true, false) => members_a.iter().collect(),
            (false, true) => members_b.iter().collect(),
            (false, false) => Vec::new(),
        };
        for hook in moved {
            if let Some(record) = self.hooks.get(hook) {
                if !affected.contains(&record.owner) {
                    affected.push(record.owner);
                }
            }
        }
        for owner in affected {
            let _ = self.recompute_derived(owner);
        }

        Ok(())
    }

    /// Split a hook out of a fused cell into its own singleton cell
    ///
    /// The new cell is seeded with the hook's last observed value; the
    /// remaining hooks keep the old cell and stay fused to each other.
    pub fn detach(&mut self, hook: HookId) -> Result<()> {
        let record = self.hooks.get(&hook).ok_or(Error::UnknownHook(hook))?;
        let old = record.nexus.ok_or(Error::InactiveHook(record.id))?;
        if self.nexuses[&old].is_singleton() {
            return Err(Error::AlreadyIsolated(hook));
        }
        let value = self.nexuses[&old].current.clone();
        if let Some(nexus) = self.nexuses.get_mut(&old) {
            nexus.hooks.shift_remove(&hook);
        }
        let id = NexusId(self.next_nexus);
        self.next_nexus += 1;
        self.nexuses
            .insert(id, Nexus::singleton(id, hook, value));
        if let Some(record) = self.hooks.get_mut(&hook) {
            record.nexus = Some(id);
        }
        Ok(())
    }

    // ========================================================================
    // Transaction internals
    // ========================================================================

    /// Submit a value to one cell: validate at every attached hook not in
    /// `excluding`, then write with rollback bookkeeping
    fn cell_submit(
        &mut self,
        nexus_id: NexusId,
        value: &Value,
        excluding: &HashSet<HookId>,
        txn: &mut Txn,
    ) -> Result<()> {
        // Equality short-circuit: change events must be minimal and exact.
        if self.nexuses[&nexus_id].current == *value {
            return Ok(());
        }

        let members: Vec<HookId> = self.nexuses[&nexus_id].hooks.iter().copied().collect();
        for hook in &members {
            if excluding.contains(hook) {
                continue;
            }
            if self.hooks[hook].in_submission {
                return Err(Error::CycleDetected(*hook));
            }
        }
        for hook in &members {
            if excluding.contains(hook) {
                continue;
            }
            self.validate_at(*hook, value)?;
        }

        for hook in &members {
            if let Some(record) = self.hooks.get_mut(hook) {
                record.in_submission = true;
                txn.flagged.push(*hook);
            }
        }
        if let Some(nexus) = self.nexuses.get_mut(&nexus_id) {
            debug_assert_eq!(nexus.id, nexus_id);
            txn.touched
                .push((nexus_id, nexus.current.clone(), nexus.previous.clone()));
            nexus.previous = std::mem::replace(&mut nexus.current, value.clone());
        }
        txn.changed.push((nexus_id, excluding.clone()));
        Ok(())
    }

    /// Ask a hook's owner to validate its full candidate map with this
    /// hook's component replaced by `value`
    fn validate_at(&self, hook: HookId, value: &Value) -> Result<()> {
        let record = self.hooks.get(&hook).ok_or(Error::UnknownHook(hook))?;
        if record.kind == HookKind::Derived {
            // Derived projections are informational; they never veto.
            return Ok(());
        }
        let owner = self
            .owners
            .get(&record.owner)
            .ok_or(Error::UnknownOwner(record.owner))?;
        let mut candidate = self.component_values(record.owner)?;
        candidate.insert(record.key.clone(), value.clone());
        match owner.schema.validate(&candidate) {
            Validation::Accepted => Ok(()),
            Validation::Rejected(reason) => Err(Error::InvalidValue {
                key: record.key.clone(),
                value: value.clone(),
                reason,
            }),
        }
    }

    /// Restore every cell touched by a failed transaction, newest first
    fn rollback(&mut self, txn: Txn) {
        for (nexus_id, current, previous) in txn.touched.into_iter().rev() {
            if let Some(nexus) = self.nexuses.get_mut(&nexus_id) {
                nexus.current = current;
                nexus.previous = previous;
            }
        }
        for hook in txn.flagged {
            if let Some(record) = self.hooks.get_mut(&hook) {
                record.in_submission = false;
            }
        }
    }

    /// Clear submission flags, notify listeners of actual changes, and
    /// recompute derived projections for every owner the commit touched
    fn finish(&mut self, initiator: OwnerId, txn: Txn) {
        for hook in &txn.flagged {
            if let Some(record) = self.hooks.get_mut(hook) {
                record.in_submission = false;
            }
        }

        for (nexus_id, excluded) in &txn.changed {
            let value = self.nexuses[nexus_id].current.clone();
            let members: Vec<HookId> = self.nexuses[nexus_id].hooks.iter().copied().collect();
            for hook in members {
                if excluded.contains(&hook) {
                    continue;
                }
                self.notify_hook(hook, value.clone());
            }
        }

        let mut affected = vec![initiator];
        for (nexus_id, _) in &txn.changed {
            for hook in self.nexuses[nexus_id].hooks.iter() {
                let owner = self.hooks[hook].owner;
                if !affected.contains(&owner) {
                    affected.push(owner);
                }
            }
        }
        for owner in affected {
            // Derived projections never propagate rejections upward.
            let _ = self.recompute_derived(owner);
        }
    }

    /// Recompute every derived projection of an owner from its current
    /// primary map and push changes into their private cells
    fn recompute_derived(&mut self, owner: OwnerId) -> Result<()> {
        let record = self.owners.get(&owner).ok_or(Error::UnknownOwner(owner))?;
        let map = self.component_values(owner)?;
        let mut updates: Vec<(HookId, Value)> = Vec::new();
        for slot in record.derived.values() {
            updates.push((slot.hook, (slot.compute)(&map)));
        }

        for (hook, value) in updates {
            let nexus_id = match self.hooks.get(&hook).and_then(|r| r.nexus) {
                Some(id) => id,
                None => continue,
            };
            let changed = match self.nexuses.get_mut(&nexus_id) {
                Some(nexus) if nexus.current != value => {
                    nexus.previous = std::mem::replace(&mut nexus.current, value.clone());
                    true
                }
                _ => false,
            };
            if changed {
                self.notify_hook(hook, value);
            }
        }
        Ok(())
    }

    /// Fire a hook's listeners with the new value
    fn notify_hook(&mut self, hook: HookId, value: Value) {
        if let Some(record) = self.hooks.get_mut(&hook) {
            record.notify(&value);
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("hooks", &self.hooks.len())
            .field("nexuses", &self.nexuses.len())
            .field("owners", &self.owners.len())
            .finish()
    }
}

/// The first component whose candidate value differs from the current one,
/// falling back to the first submitted entry for a no-change rejection
fn offending(current: &ValueMap, candidate: &ValueMap, partial: &ValueMap) -> (String, Value) {
    for (key, value) in candidate {
        if current.get(key) != Some(value) {
            return (key.clone(), value.clone());
        }
    }
    partial
        .iter()
        .next()
        .map(|(k, v)| (k.clone(), v.clone()))
        .unwrap_or_default()
}

// Compile-time check that Engine can move across threads (listeners, schemas,
// and derived computations are all required to be Send).
fn _assert_send<T: Send>() {}
fn _engine_is_send() {
    _assert_send::<Engine>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::{AcceptAll, CallbackSchema};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn non_negative_schema() -> impl Schema + 'static {
        CallbackSchema::new(
            |_current: &ValueMap, _partial: &ValueMap| Ok(ValueMap::new()),
            |candidate: &ValueMap| {
                for (key, value) in candidate {
                    if value.as_int().unwrap_or(0) < 0 {
                        return Validation::reject(format!("{} must be non-negative", key));
                    }
                }
                Validation::Accepted
            },
        )
    }

    #[test]
    fn test_create_and_read() {
        let mut engine = Engine::new();
        let owner = engine.register_owner(AcceptAll);
        let hook = engine.create_hook(owner, "value", 5i64).unwrap();

        assert!(engine.is_active(hook));
        assert_eq!(engine.value(hook).unwrap(), Value::Int(5));
        assert_eq!(engine.fusion_domain(hook).unwrap(), vec![hook]);
    }

    #[test]
    fn test_set_updates_cell() {
        let mut engine = Engine::new();
        let owner = engine.register_owner(AcceptAll);
        let hook = engine.create_hook(owner, "value", 5i64).unwrap();

        engine.set(hook, 10i64).unwrap();
        assert_eq!(engine.value(hook).unwrap(), Value::Int(10));
        assert_eq!(engine.previous(hook).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_inactive_hook_rejects_reads() {
        let mut engine = Engine::new();
        let owner = engine.register_owner(AcceptAll);
        let hook = engine.add_inactive_hook(owner, "value").unwrap();

        assert!(matches!(engine.value(hook), Err(Error::InactiveHook(_))));
        assert!(matches!(
            engine.set(hook, 1i64),
            Err(Error::InactiveHook(_))
        ));

        engine.activate(hook, 1i64).unwrap();
        assert_eq!(engine.value(hook).unwrap(), Value::Int(1));
        assert!(matches!(
            engine.activate(hook, 2i64),
            Err(Error::AlreadyActive(_))
        ));
    }

    #[test]
    fn test_duplicate_component_key() {
        let mut engine = Engine::new();
        let owner = engine.register_owner(AcceptAll);
        engine.create_hook(owner, "value", 1i64).unwrap();
        assert!(matches!(
            engine.create_hook(owner, "value", 2i64),
            Err(Error::DuplicateComponent { .. })
        ));
    }

    // ========================================================================
    // Fusion
    // ========================================================================

    #[test]
    fn test_connect_assert_equal_then_set_propagates() {
        // cellA = 5, cellB = 5, assert-equal connect succeeds; a set on one
        // side is observed by the other.
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(AcceptAll);
        let a = engine.create_hook(owner_a, "value", 5i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 5i64).unwrap();

        engine.connect(a, b, SyncMode::AssertEqual).unwrap();
        assert_eq!(engine.value(a).unwrap(), Value::Int(5));
        assert_eq!(engine.value(b).unwrap(), Value::Int(5));

        engine.set(a, 10i64).unwrap();
        assert_eq!(engine.value(a).unwrap(), Value::Int(10));
        assert_eq!(engine.value(b).unwrap(), Value::Int(10));
    }

    #[test]
    fn test_connect_assert_equal_diverged_fails_cleanly() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(AcceptAll);
        let a = engine.create_hook(owner_a, "value", 5i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 7i64).unwrap();

        assert!(matches!(
            engine.connect(a, b, SyncMode::AssertEqual),
            Err(Error::DivergedValues { .. })
        ));
        // No structural change.
        assert_eq!(engine.fusion_domain(a).unwrap(), vec![a]);
        assert_eq!(engine.fusion_domain(b).unwrap(), vec![b]);
        assert_eq!(engine.value(b).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_connect_push_and_pull() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(AcceptAll);
        let a = engine.create_hook(owner_a, "value", 5i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 7i64).unwrap();

        engine.connect(a, b, SyncMode::Push).unwrap();
        assert_eq!(engine.value(a).unwrap(), Value::Int(5));
        assert_eq!(engine.value(b).unwrap(), Value::Int(5));

        let owner_c = engine.register_owner(AcceptAll);
        let c = engine.create_hook(owner_c, "value", 9i64).unwrap();
        engine.connect(a, c, SyncMode::Pull).unwrap();
        // Target's value wins; the whole fused domain follows.
        assert_eq!(engine.value(a).unwrap(), Value::Int(9));
        assert_eq!(engine.value(b).unwrap(), Value::Int(9));
        assert_eq!(engine.value(c).unwrap(), Value::Int(9));
        assert_eq!(engine.fusion_domain(a).unwrap().len(), 3);
    }

    #[test]
    fn test_fusion_symmetry_transitive() {
        let mut engine = Engine::new();
        let mut hooks = Vec::new();
        for _ in 0..4 {
            let owner = engine.register_owner(AcceptAll);
            hooks.push(engine.create_hook(owner, "value", 0i64).unwrap());
        }
        engine.connect(hooks[0], hooks[1], SyncMode::AssertEqual).unwrap();
        engine.connect(hooks[2], hooks[3], SyncMode::AssertEqual).unwrap();
        engine.connect(hooks[1], hooks[2], SyncMode::AssertEqual).unwrap();

        engine.set(hooks[3], 42i64).unwrap();
        for hook in &hooks {
            assert_eq!(engine.value(*hook).unwrap(), Value::Int(42));
        }
    }

    #[test]
    fn test_connect_validates_both_domains_before_merging() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(non_negative_schema());
        let a = engine.create_hook(owner_a, "value", -3i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 7i64).unwrap();

        // Pushing -3 at owner_b must be rejected with no structural change.
        let err = engine.connect(a, b, SyncMode::Push).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert_eq!(engine.fusion_domain(a).unwrap(), vec![a]);
        assert_eq!(engine.value(b).unwrap(), Value::Int(7));

        // Pulling 7 into owner_a's cell is fine.
        engine.connect(a, b, SyncMode::Pull).unwrap();
        assert_eq!(engine.value(a).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_connect_same_cell_is_disjointness_violation() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(AcceptAll);
        let a = engine.create_hook(owner_a, "value", 1i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 1i64).unwrap();

        engine.connect(a, b, SyncMode::AssertEqual).unwrap();
        assert!(matches!(
            engine.connect(a, b, SyncMode::AssertEqual),
            Err(Error::DisjointnessViolation { .. })
        ));
    }

    #[test]
    fn test_detach_preserves_value_and_isolates() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(AcceptAll);
        let a = engine.create_hook(owner_a, "value", 5i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 5i64).unwrap();
        engine.connect(a, b, SyncMode::AssertEqual).unwrap();
        engine.set(a, 10i64).unwrap();

        engine.detach(b).unwrap();
        assert_eq!(engine.value(b).unwrap(), Value::Int(10));
        assert_eq!(engine.fusion_domain(b).unwrap(), vec![b]);

        // Former partner no longer affects the detached hook.
        engine.set(a, 20i64).unwrap();
        assert_eq!(engine.value(a).unwrap(), Value::Int(20));
        assert_eq!(engine.value(b).unwrap(), Value::Int(10));
    }

    #[test]
    fn test_detach_singleton_is_an_error() {
        let mut engine = Engine::new();
        let owner = engine.register_owner(AcceptAll);
        let hook = engine.create_hook(owner, "value", 5i64).unwrap();
        assert!(matches!(
            engine.detach(hook),
            Err(Error::AlreadyIsolated(_))
        ));
    }

    #[test]
    fn test_deactivate_fused_hook_detaches_first() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(AcceptAll);
        let owner_c = engine.register_owner(AcceptAll);
        let a = engine.create_hook(owner_a, "value", 1i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 1i64).unwrap();
        let c = engine.create_hook(owner_c, "value", 1i64).unwrap();
        engine.connect(a, b, SyncMode::AssertEqual).unwrap();
        engine.connect(b, c, SyncMode::AssertEqual).unwrap();

        engine.deactivate(b).unwrap();
        assert!(!engine.is_active(b));
        assert!(matches!(engine.value(b), Err(Error::InactiveHook(_))));

        // The remaining partners stay fused to each other.
        engine.set(a, 2i64).unwrap();
        assert_eq!(engine.value(c).unwrap(), Value::Int(2));

        // Deactivating again is a no-op.
        engine.deactivate(b).unwrap();
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    #[test]
    fn test_submit_rejected_by_own_validator() {
        let mut engine = Engine::new();
        let owner = engine.register_owner(non_negative_schema());
        let hook = engine.create_hook(owner, "value", 5i64).unwrap();

        let mut partial = ValueMap::new();
        partial.insert("value".to_string(), Value::Int(-1));
        let err = engine.submit(owner, partial).unwrap_err();
        match err {
            Error::InvalidValue { key, value, reason } => {
                assert_eq!(key, "value");
                assert_eq!(value, Value::Int(-1));
                assert_eq!(reason, "value must be non-negative");
            }
            other => panic!("unexpected error: {other}"),
        }
        // Prior value intact.
        assert_eq!(engine.value(hook).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_submit_atomicity_across_components() {
        // Two components; the second write is rejected by a fused partner, so
        // the already-committed first write must be rolled back too.
        let mut engine = Engine::new();
        let owner = engine.register_owner(AcceptAll);
        let k1 = engine.create_hook(owner, "k1", 1i64).unwrap();
        let k2 = engine.create_hook(owner, "k2", 2i64).unwrap();

        let guard = engine.register_owner(non_negative_schema());
        let g = engine.create_hook(guard, "value", 2i64).unwrap();
        engine.connect(k2, g, SyncMode::AssertEqual).unwrap();

        let mut partial = ValueMap::new();
        partial.insert("k1".to_string(), Value::Int(10));
        partial.insert("k2".to_string(), Value::Int(-5));
        let err = engine.submit(owner, partial).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));

        assert_eq!(engine.value(k1).unwrap(), Value::Int(1));
        assert_eq!(engine.value(k2).unwrap(), Value::Int(2));
        assert_eq!(engine.value(g).unwrap(), Value::Int(2));
        // Rollback also restores the pre-transaction previous value.
        assert_eq!(engine.previous(k1).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_submit_completion_error_is_fatal_and_clean() {
        let mut engine = Engine::new();
        let schema = CallbackSchema::new(
            |_current: &ValueMap, partial: &ValueMap| {
                if partial.contains_key("key") {
                    return Err(Error::Completion("key not found: y".to_string()));
                }
                Ok(ValueMap::new())
            },
            |_candidate: &ValueMap| Validation::Accepted,
        );
        let owner = engine.register_owner(schema);
        let key = engine.create_hook(owner, "key", "x").unwrap();

        let mut partial = ValueMap::new();
        partial.insert("key".to_string(), Value::String("y".to_string()));
        let err = engine.submit(owner, partial).unwrap_err();
        assert!(matches!(err, Error::Completion(_)));
        assert_eq!(engine.value(key).unwrap(), Value::String("x".to_string()));
    }

    #[test]
    fn test_submit_completion_derives_components() {
        // Completion keeps "double" at twice "value".
        let mut engine = Engine::new();
        let schema = CallbackSchema::new(
            |_current: &ValueMap, partial: &ValueMap| {
                let mut extra = ValueMap::new();
                if let Some(v) = partial.get("value").and_then(Value::as_int) {
                    extra.insert("double".to_string(), Value::Int(v * 2));
                }
                Ok(extra)
            },
            |_candidate: &ValueMap| Validation::Accepted,
        );
        let owner = engine.register_owner(schema);
        let value = engine.create_hook(owner, "value", 1i64).unwrap();
        let double = engine.create_hook(owner, "double", 2i64).unwrap();

        let mut partial = ValueMap::new();
        partial.insert("value".to_string(), Value::Int(21));
        engine.submit(owner, partial).unwrap();

        assert_eq!(engine.value(value).unwrap(), Value::Int(21));
        assert_eq!(engine.value(double).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_submit_unknown_component() {
        let mut engine = Engine::new();
        let owner = engine.register_owner(AcceptAll);
        engine.create_hook(owner, "value", 1i64).unwrap();

        let mut partial = ValueMap::new();
        partial.insert("other".to_string(), Value::Int(1));
        assert!(matches!(
            engine.submit(owner, partial),
            Err(Error::UnknownComponent { .. })
        ));
    }

    #[test]
    fn test_submit_rejected_by_fused_owner() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(non_negative_schema());
        let a = engine.create_hook(owner_a, "value", 5i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 5i64).unwrap();
        engine.connect(a, b, SyncMode::AssertEqual).unwrap();

        // owner_a itself accepts anything; the rejection comes transitively
        // from owner_b through the shared cell.
        let mut partial = ValueMap::new();
        partial.insert("value".to_string(), Value::Int(-1));
        let err = engine.submit(owner_a, partial).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert_eq!(engine.value(a).unwrap(), Value::Int(5));
        assert_eq!(engine.value(b).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_cycle_detected_on_conflicting_fused_components() {
        // Two components of the same owner fused into one cell: a submission
        // writing them to different values revisits the cell mid-submission.
        let mut engine = Engine::new();
        let owner = engine.register_owner(AcceptAll);
        let k1 = engine.create_hook(owner, "k1", 1i64).unwrap();
        let k2 = engine.create_hook(owner, "k2", 1i64).unwrap();
        engine.connect(k1, k2, SyncMode::AssertEqual).unwrap();

        let mut partial = ValueMap::new();
        partial.insert("k1".to_string(), Value::Int(10));
        partial.insert("k2".to_string(), Value::Int(20));
        let err = engine.submit(owner, partial).unwrap_err();
        assert!(matches!(err, Error::CycleDetected(_)));
        assert_eq!(engine.value(k1).unwrap(), Value::Int(1));
        assert_eq!(engine.value(k2).unwrap(), Value::Int(1));

        // Writing both to the same value is fine: the second write no-ops.
        let mut partial = ValueMap::new();
        partial.insert("k1".to_string(), Value::Int(10));
        partial.insert("k2".to_string(), Value::Int(10));
        engine.submit(owner, partial).unwrap();
        assert_eq!(engine.value(k2).unwrap(), Value::Int(10));
    }

    // ========================================================================
    // Listeners and no-op minimality
    // ========================================================================

    #[test]
    fn test_noop_submit_fires_no_listeners() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(AcceptAll);
        let a = engine.create_hook(owner_a, "value", 5i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 5i64).unwrap();
        engine.connect(a, b, SyncMode::AssertEqual).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        engine
            .subscribe(b, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        // Submitting the current value everywhere is a silent no-op.
        let mut partial = ValueMap::new();
        partial.insert("value".to_string(), Value::Int(5));
        engine.submit(owner_a, partial).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        engine.set(a, 6i64).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_writing_hook_is_not_renotified() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(AcceptAll);
        let a = engine.create_hook(owner_a, "value", 0i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 0i64).unwrap();
        engine.connect(a, b, SyncMode::AssertEqual).unwrap();

        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        let ca = count_a.clone();
        let cb = count_b.clone();
        engine
            .subscribe(a, move |_| {
                ca.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        engine
            .subscribe(b, move |_| {
                cb.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        engine.set(a, 1i64).unwrap();
        assert_eq!(count_a.load(Ordering::SeqCst), 0);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(AcceptAll);
        let a = engine.create_hook(owner_a, "value", 0i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 0i64).unwrap();
        engine.connect(a, b, SyncMode::AssertEqual).unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let listener = engine
            .subscribe(b, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        engine.set(a, 1i64).unwrap();
        assert!(engine.unsubscribe(b, listener).unwrap());
        engine.set(a, 2i64).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    // ========================================================================
    // Derived projections
    // ========================================================================

    #[test]
    fn test_derived_recomputes_after_commit() {
        let mut engine = Engine::new();
        let owner = engine.register_owner(AcceptAll);
        engine.create_hook(owner, "value", 3i64).unwrap();
        let doubled = engine
            .register_derived(owner, "doubled", |map| {
                Value::Int(map.get("value").and_then(Value::as_int).unwrap_or(0) * 2)
            })
            .unwrap();

        // Seeded from the current map.
        assert_eq!(engine.value(doubled).unwrap(), Value::Int(6));

        let mut partial = ValueMap::new();
        partial.insert("value".to_string(), Value::Int(10));
        engine.submit(owner, partial).unwrap();
        assert_eq!(engine.value(doubled).unwrap(), Value::Int(20));
    }

    #[test]
    fn test_derived_rejects_writes_and_connects() {
        let mut engine = Engine::new();
        let owner = engine.register_owner(AcceptAll);
        let value = engine.create_hook(owner, "value", 3i64).unwrap();
        let doubled = engine
            .register_derived(owner, "doubled", |map| {
                Value::Int(map.get("value").and_then(Value::as_int).unwrap_or(0) * 2)
            })
            .unwrap();

        assert!(matches!(
            engine.set(doubled, 0i64),
            Err(Error::ReadOnlyHook(_))
        ));
        assert!(matches!(
            engine.connect(doubled, value, SyncMode::AssertEqual),
            Err(Error::ReadOnlyHook(_))
        ));
    }

    #[test]
    fn test_derived_recomputes_for_fused_partner_owners() {
        let mut engine = Engine::new();
        let owner_a = engine.register_owner(AcceptAll);
        let owner_b = engine.register_owner(AcceptAll);
        let a = engine.create_hook(owner_a, "value", 1i64).unwrap();
        let b = engine.create_hook(owner_b, "value", 1i64).unwrap();
        let negated = engine
            .register_derived(owner_b, "negated", |map| {
                Value::Int(-map.get("value").and_then(Value::as_int).unwrap_or(0))
            })
            .unwrap();
        engine.connect(a, b, SyncMode::AssertEqual).unwrap();

        // A write initiated by owner_a still refreshes owner_b's projection.
        engine.set(a, 4i64).unwrap();
        assert_eq!(engine.value(negated).unwrap(), Value::Int(-4));
    }
}
