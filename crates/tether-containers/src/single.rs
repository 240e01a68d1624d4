//! Single observable value

use crate::error::Result;
use crate::events::{attach_publisher, subscribe, Events};
use tether_core::{
    CallbackSchema, HookId, OwnerId, SharedEngine, SyncMode, Validation, Value, ValueMap,
};
use tether_notify::Subscription;

const VALUE: &str = "value";

/// A single bindable value with an optional validator
///
/// The thinnest façade: one owner, one component. `set` goes through the
/// owner's submission transaction, so a rejection leaves every bound
/// partner untouched.
#[derive(Debug, Clone)]
pub struct ObservableValue {
    engine: SharedEngine,
    owner: OwnerId,
    hook: HookId,
    events: Events,
}

impl ObservableValue {
    /// Create a value without constraints
    pub fn new(engine: &SharedEngine, initial: impl Into<Value>) -> Result<Self> {
        Self::with_validator(engine, initial, |_| Validation::Accepted)
    }

    /// Create a value guarded by a validator
    pub fn with_validator(
        engine: &SharedEngine,
        initial: impl Into<Value>,
        validate: impl Fn(&Value) -> Validation + Send + 'static,
    ) -> Result<Self> {
        let schema = CallbackSchema::new(
            |_current: &ValueMap, _partial: &ValueMap| Ok(ValueMap::new()),
            move |candidate: &ValueMap| match candidate.get(VALUE) {
                Some(value) => validate(value),
                None => Validation::Accepted,
            },
        );
        let owner = engine.register_owner(schema);
        let hook = engine.create_hook(owner, VALUE, initial)?;
        let events = attach_publisher(engine, hook)?;
        Ok(Self {
            engine: engine.clone(),
            owner,
            hook,
            events,
        })
    }

    /// Read the current value
    pub fn get(&self) -> Result<Value> {
        Ok(self.engine.value(self.hook)?)
    }

    /// Write a new value through the submission transaction
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        let mut partial = ValueMap::new();
        partial.insert(VALUE.to_string(), value.into());
        Ok(self.engine.submit(self.owner, partial)?)
    }

    /// The hook backing this value, for binding to other containers
    pub fn hook(&self) -> HookId {
        self.hook
    }

    /// Bind this value to another so they stay equal
    pub fn bind(&self, other: &ObservableValue, mode: SyncMode) -> Result<()> {
        Ok(self.engine.connect(self.hook, other.hook, mode)?)
    }

    /// Split this value back out of its fusion domain
    pub fn unbind(&self) -> Result<()> {
        Ok(self.engine.detach(self.hook)?)
    }

    /// Subscribe to value changes
    pub fn subscribe(
        &self,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription<Value> {
        subscribe(&self.events, callback)
    }
}
