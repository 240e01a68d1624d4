//! Dict-selection containers: a dict, a selected key, and the selected value
//!
//! Two flavors of the same schema. The strict flavor treats selecting an
//! absent key as a domain error; the default-injecting flavor synthesizes
//! `{key: default}` in the dict instead, so selection always succeeds.

use crate::error::{Error, Result};
use crate::events::{attach_publisher, subscribe, Events};
use tether_core::{
    CallbackSchema, Error as CoreError, HookId, OwnerId, SharedEngine, Validation, Value, ValueMap,
};
use tether_notify::Subscription;

const DICT: &str = "dict";
const KEY: &str = "key";
const VALUE: &str = "value";

/// Joint invariant shared by both flavors: the dict is a map, the key is a
/// string, and the key is present in the dict
fn select_validate(candidate: &ValueMap) -> Validation {
    let dict = match candidate.get(DICT) {
        Some(Value::Map(dict)) => dict,
        _ => return Validation::reject("dict component must be a map"),
    };
    let key = match candidate.get(KEY) {
        Some(Value::String(key)) => key,
        _ => return Validation::reject("key component must be a string"),
    };
    if !dict.contains_key(key) {
        return Validation::reject(format!("key not found: {}", key));
    }
    Validation::Accepted
}

/// The derived projection: `dict[key]`
fn selected_value(map: &ValueMap) -> Value {
    match (map.get(DICT), map.get(KEY)) {
        (Some(Value::Map(dict)), Some(Value::String(key))) => {
            dict.get(key).cloned().unwrap_or_default()
        }
        _ => Value::Null,
    }
}

/// Resolve the effective dict and key of a candidate submission
fn effective<'a>(
    current: &'a ValueMap,
    partial: &'a ValueMap,
    key: &str,
) -> Option<&'a Value> {
    partial.get(key).or_else(|| current.get(key))
}

/// A dict with a selected key, strict flavor
///
/// Selecting a key that is not in the dict is a completion-level domain
/// error: the transaction aborts before any mutation.
#[derive(Debug, Clone)]
pub struct SelectedDict {
    engine: SharedEngine,
    owner: OwnerId,
    dict_hook: HookId,
    key_hook: HookId,
    value_hook: HookId,
    events: Events,
}

impl SelectedDict {
    /// Create a selection over `dict`, initially at `key`
    pub fn new(engine: &SharedEngine, dict: ValueMap, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if !dict.contains_key(&key) {
            return Err(Error::KeyNotFound(key));
        }
        let schema = CallbackSchema::new(
            |current: &ValueMap, partial: &ValueMap| {
                if let (Some(Value::Map(dict)), Some(Value::String(key))) = (
                    effective(current, partial, DICT),
                    effective(current, partial, KEY),
                ) {
                    if !dict.contains_key(key) {
                        return Err(CoreError::Completion(format!("key not found: {}", key)));
                    }
                }
                Ok(ValueMap::new())
            },
            select_validate,
        );
        let owner = engine.register_owner(schema);
        let dict_hook = engine.create_hook(owner, DICT, Value::Map(dict))?;
        let key_hook = engine.create_hook(owner, KEY, Value::String(key))?;
        let value_hook = engine.register_derived(owner, VALUE, selected_value)?;
        let events = attach_publisher(engine, value_hook)?;
        Ok(Self {
            engine: engine.clone(),
            owner,
            dict_hook,
            key_hook,
            value_hook,
            events,
        })
    }

    /// Move the selection to another key
    pub fn select(&self, key: impl Into<String>) -> Result<()> {
        let mut partial = ValueMap::new();
        partial.insert(KEY.to_string(), Value::String(key.into()));
        Ok(self.engine.submit(self.owner, partial)?)
    }

    /// The currently selected key
    pub fn selected_key(&self) -> Result<String> {
        match self.engine.value(self.key_hook)? {
            Value::String(key) => Ok(key),
            other => Err(Error::TypeMismatch {
                expected: "string",
                got: other.type_name(),
            }),
        }
    }

    /// The value at the selected key (the derived projection)
    pub fn value(&self) -> Result<Value> {
        Ok(self.engine.value(self.value_hook)?)
    }

    /// Snapshot of the backing dict
    pub fn entries(&self) -> Result<ValueMap> {
        match self.engine.value(self.dict_hook)? {
            Value::Map(map) => Ok(map),
            other => Err(Error::TypeMismatch {
                expected: "map",
                got: other.type_name(),
            }),
        }
    }

    /// Insert or overwrite an entry in the backing dict
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let owner = self.owner;
        let hook = self.dict_hook;
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
            map.insert(key, value);
            let mut partial = ValueMap::new();
            partial.insert(DICT.to_string(), Value::Map(map));
            engine.submit(owner, partial)?;
            Ok(())
        })
    }

    /// The hook backing the dict component
    pub fn dict_hook(&self) -> HookId {
        self.dict_hook
    }

    /// The hook backing the key component
    pub fn key_hook(&self) -> HookId {
        self.key_hook
    }

    /// The read-only hook backing the selected value
    pub fn value_hook(&self) -> HookId {
        self.value_hook
    }

    /// Subscribe to changes of the selected value
    pub fn subscribe(
        &self,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription<Value> {
        subscribe(&self.events, callback)
    }
}

/// A dict with a selected key, default-injecting flavor
///
/// Selecting an absent key synthesizes `{key: default}` in the dict via
/// completion, so the selection invariant holds without a rejection.
#[derive(Debug, Clone)]
pub struct SelectedDictWithDefault {
    inner: SelectedDict,
}

impl SelectedDictWithDefault {
    /// Create a selection over `dict`, initially at `key`, injecting
    /// `default` whenever an absent key is selected
    pub fn new(
        engine: &SharedEngine,
        mut dict: ValueMap,
        key: impl Into<String>,
        default: impl Into<Value>,
    ) -> Result<Self> {
        let key = key.into();
        let default = default.into();
        if !dict.contains_key(&key) {
            dict.insert(key.clone(), default.clone());
        }
        let schema = CallbackSchema::new(
            move |current: &ValueMap, partial: &ValueMap| {
                let mut extra = ValueMap::new();
                if let (Some(Value::Map(dict)), Some(Value::String(key))) = (
                    effective(current, partial, DICT),
                    effective(current, partial, KEY),
                ) {
                    if !dict.contains_key(key) {
                        let mut dict = dict.clone();
                        dict.insert(key.clone(), default.clone());
                        extra.insert(DICT.to_string(), Value::Map(dict));
                    }
                }
                Ok(extra)
            },
            select_validate,
        );
        let owner = engine.register_owner(schema);
        let dict_hook = engine.create_hook(owner, DICT, Value::Map(dict))?;
        let key_hook = engine.create_hook(owner, KEY, Value::String(key))?;
        let value_hook = engine.register_derived(owner, VALUE, selected_value)?;
        let events = attach_publisher(engine, value_hook)?;
        Ok(Self {
            inner: SelectedDict {
                engine: engine.clone(),
                owner,
                dict_hook,
                key_hook,
                value_hook,
                events,
            },
        })
    }

    /// Move the selection, creating `{key: default}` if the key is absent
    pub fn select(&self, key: impl Into<String>) -> Result<()> {
        self.inner.select(key)
    }

    /// The currently selected key
    pub fn selected_key(&self) -> Result<String> {
        self.inner.selected_key()
    }

    /// The value at the selected key
    pub fn value(&self) -> Result<Value> {
        self.inner.value()
    }

    /// Snapshot of the backing dict
    pub fn entries(&self) -> Result<ValueMap> {
        self.inner.entries()
    }

    /// Insert or overwrite an entry in the backing dict
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.inner.insert(key, value)
    }

    /// Subscribe to changes of the selected value
    pub fn subscribe(
        &self,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription<Value> {
        self.inner.subscribe(callback)
    }
}
