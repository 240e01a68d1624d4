//! Observable dict

use crate::error::{Error, Result};
use crate::events::{attach_publisher, subscribe, Events};
use tether_core::{
    CallbackSchema, HookId, OwnerId, SharedEngine, Validation, Value, ValueMap,
};
use tether_notify::Subscription;

const DICT: &str = "dict";

/// A keyed collection backed by a single map-valued component
#[derive(Debug, Clone)]
pub struct ObservableDict {
    engine: SharedEngine,
    owner: OwnerId,
    hook: HookId,
    events: Events,
}

impl ObservableDict {
    /// Create a dict with initial entries
    pub fn new(engine: &SharedEngine, initial: ValueMap) -> Result<Self> {
        let schema = CallbackSchema::new(
            |_current: &ValueMap, _partial: &ValueMap| Ok(ValueMap::new()),
            |candidate: &ValueMap| match candidate.get(DICT) {
                Some(Value::Map(_)) | None => Validation::Accepted,
                Some(other) => {
                    Validation::reject(format!("dict component must be a map, got {}", other.type_name()))
                }
            },
        );
        let owner = engine.register_owner(schema);
        let hook = engine.create_hook(owner, DICT, Value::Map(initial))?;
        let events = attach_publisher(engine, hook)?;
        Ok(Self {
            engine: engine.clone(),
            owner,
            hook,
            events,
        })
    }

    /// Snapshot of the entries
    pub fn entries(&self) -> Result<ValueMap> {
        match self.engine.value(self.hook)? {
            Value::Map(map) => Ok(map),
            other => Err(Error::TypeMismatch {
                expected: "map",
                got: other.type_name(),
            }),
        }
    }

    /// Read one entry
    pub fn get(&self, key: &str) -> Result<Value> {
        self.entries()?
            .get(key)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.entries()?.contains_key(key))
    }

    /// The keys, in insertion order
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.keys().cloned().collect())
    }

    /// Number of entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    /// Check whether the dict has no entries
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries()?.is_empty())
    }

    /// Insert or overwrite an entry
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        self.update(move |map| {
            map.insert(key, value);
            Ok(())
        })
    }

    /// Remove and return an entry
    pub fn remove(&self, key: &str) -> Result<Value> {
        let mut removed = None;
        self.update(|map| {
            removed = map.shift_remove(key);
            if removed.is_none() {
                return Err(Error::KeyNotFound(key.to_string()));
            }
            Ok(())
        })?;
        removed.ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Replace the whole dict
    pub fn replace(&self, entries: ValueMap) -> Result<()> {
        let mut partial = ValueMap::new();
        partial.insert(DICT.to_string(), Value::Map(entries));
        Ok(self.engine.submit(self.owner, partial)?)
    }

    /// The hook backing the dict component
    pub fn hook(&self) -> HookId {
        self.hook
    }

    /// Subscribe to dict changes (the callback sees the whole new map)
    pub fn subscribe(
        &self,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription<Value> {
        subscribe(&self.events, callback)
    }

    /// Read-modify-write in one critical section
    fn update(&self, edit: impl FnOnce(&mut ValueMap) -> Result<()>) -> Result<()> {
        let owner = self.owner;
        let hook = self.hook;
        self.engine.with(move |engine| {
            let mut map = match engine.value(hook)? {
                Value::Map(map) => map,
                other => {
                    return Err(Error::TypeMismatch {
                        expected: "map",
                        got: other.type_name(),
                    })
                }
            };
            edit(&mut map)?;
            let mut partial = ValueMap::new();
            partial.insert(DICT.to_string(), Value::Map(map));
            engine.submit(owner, partial)?;
            Ok(())
        })
    }
}
