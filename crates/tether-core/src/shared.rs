//! Thread-safe engine handle
//!
//! One mutex guards the whole engine, so every operation — including a full
//! multi-component transaction with its cascade across fused cells — runs as
//! one critical section and no thread observes a partially-committed state.
//! Listeners run inside the critical section but only see the new value by
//! reference; they have no path back into the engine, so they cannot
//! re-enter the lock.

use crate::engine::Engine;
use crate::error::Result;
use crate::identity::{HookId, ListenerId, OwnerId};
use crate::owner::Schema;
use crate::sync::SyncMode;
use crate::value::{Value, ValueMap};
use std::sync::{Arc, Mutex, PoisonError};

/// A cloneable, thread-safe handle to one [`Engine`]
///
/// Clones share the same underlying engine; calls from different threads are
/// serialized, calls from one thread run in program order.
#[derive(Debug, Clone, Default)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    /// Create a handle around a fresh engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing engine
    pub fn from_engine(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run a closure against the engine inside the critical section
    ///
    /// A poisoned lock is recovered rather than propagated: the engine's
    /// rollback discipline means a panicking caller cannot leave a
    /// half-committed transaction behind.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// See [`Engine::register_owner`]
    pub fn register_owner(&self, schema: impl Schema + 'static) -> OwnerId {
        self.with(|engine| engine.register_owner(schema))
    }

    /// See [`Engine::create_hook`]
    pub fn create_hook(
        &self,
        owner: OwnerId,
        key: impl Into<String>,
        initial: impl Into<Value>,
    ) -> Result<HookId> {
        self.with(|engine| engine.create_hook(owner, key, initial))
    }

    /// See [`Engine::register_derived`]
    pub fn register_derived(
        &self,
        owner: OwnerId,
        key: impl Into<String>,
        compute: impl Fn(&ValueMap) -> Value + Send + 'static,
    ) -> Result<HookId> {
        self.with(|engine| engine.register_derived(owner, key, compute))
    }

    /// See [`Engine::value`]
    pub fn value(&self, hook: HookId) -> Result<Value> {
        self.with(|engine| engine.value(hook))
    }

    /// See [`Engine::set`]
    pub fn set(&self, hook: HookId, value: impl Into<Value>) -> Result<()> {
        self.with(|engine| engine.set(hook, value))
    }

    /// See [`Engine::submit`]
    pub fn submit(&self, owner: OwnerId, partial: ValueMap) -> Result<()> {
        self.with(|engine| engine.submit(owner, partial))
    }

    /// See [`Engine::component_values`]
    pub fn component_values(&self, owner: OwnerId) -> Result<ValueMap> {
        self.with(|engine| engine.component_values(owner))
    }

    /// See [`Engine::connect`]
    pub fn connect(&self, a: HookId, b: HookId, mode: SyncMode) -> Result<()> {
        self.with(|engine| engine.connect(a, b, mode))
    }

    /// See [`Engine::detach`]
    pub fn detach(&self, hook: HookId) -> Result<()> {
        self.with(|engine| engine.detach(hook))
    }

    /// See [`Engine::deactivate`]
    pub fn deactivate(&self, hook: HookId) -> Result<()> {
        self.with(|engine| engine.deactivate(hook))
    }

    /// See [`Engine::subscribe`]
    pub fn subscribe(
        &self,
        hook: HookId,
        listener: impl FnMut(&Value) + Send + 'static,
    ) -> Result<ListenerId> {
        self.with(|engine| engine.subscribe(hook, listener))
    }

    /// See [`Engine::unsubscribe`]
    pub fn unsubscribe(&self, hook: HookId, listener: ListenerId) -> Result<bool> {
        self.with(|engine| engine.unsubscribe(hook, listener))
    }

    /// See [`Engine::fusion_domain`]
    pub fn fusion_domain(&self, hook: HookId) -> Result<Vec<HookId>> {
        self.with(|engine| engine.fusion_domain(hook))
    }
}

// Compile-time check that the handle can be shared across threads.
fn _assert_send_sync<T: Send + Sync>() {}
fn _shared_engine_is_send_sync() {
    _assert_send_sync::<SharedEngine>();
}
