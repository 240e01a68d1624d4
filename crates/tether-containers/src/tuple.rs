//! Fixed-arity observable tuple

use crate::error::{Error, Result};
use tether_core::{
    CallbackSchema, HookId, OwnerId, SharedEngine, Validation, Value, ValueMap,
};

/// A fixed number of slots validated as a unit
///
/// Each slot is its own component hook (keys `"0"`, `"1"`, …), so slots can
/// be bound to other containers independently while the joint validator
/// still sees the whole tuple on every change anywhere in it.
#[derive(Debug, Clone)]
pub struct ObservableTuple {
    engine: SharedEngine,
    owner: OwnerId,
    hooks: Vec<HookId>,
}

impl ObservableTuple {
    /// Create a tuple without a joint constraint
    pub fn new(engine: &SharedEngine, initial: Vec<Value>) -> Result<Self> {
        Self::with_validator(engine, initial, |_| Validation::Accepted)
    }

    /// Create a tuple guarded by a validator over all slots in index order
    pub fn with_validator(
        engine: &SharedEngine,
        initial: Vec<Value>,
        validate: impl Fn(&[Value]) -> Validation + Send + 'static,
    ) -> Result<Self> {
        let arity = initial.len();
        let schema = CallbackSchema::new(
            |_current: &ValueMap, _partial: &ValueMap| Ok(ValueMap::new()),
            move |candidate: &ValueMap| {
                let slots: Vec<Value> = (0..arity)
                    .map(|i| candidate.get(&i.to_string()).cloned().unwrap_or_default())
                    .collect();
                validate(&slots)
            },
        );
        let owner = engine.register_owner(schema);
        let mut hooks = Vec::with_capacity(arity);
        for (index, value) in initial.into_iter().enumerate() {
            hooks.push(engine.create_hook(owner, index.to_string(), value)?);
        }
        Ok(Self {
            engine: engine.clone(),
            owner,
            hooks,
        })
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check whether the tuple has no slots
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Read one slot
    pub fn get(&self, index: usize) -> Result<Value> {
        let hook = self.hook(index)?;
        Ok(self.engine.value(hook)?)
    }

    /// Write one slot through the joint transaction
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.set_many(vec![(index, value.into())])
    }

    /// Write several slots atomically: all of them commit, or none
    pub fn set_many(&self, entries: Vec<(usize, Value)>) -> Result<()> {
        let mut partial = ValueMap::new();
        for (index, value) in entries {
            self.hook(index)?;
            partial.insert(index.to_string(), value);
        }
        Ok(self.engine.submit(self.owner, partial)?)
    }

    /// The hook backing one slot, for binding to other containers
    pub fn hook(&self, index: usize) -> Result<HookId> {
        self.hooks
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                index,
                len: self.hooks.len(),
            })
    }
}
