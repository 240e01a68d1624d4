//! Observable list

use crate::error::{Error, Result};
use crate::events::{attach_publisher, subscribe, Events};
use tether_core::{
    CallbackSchema, HookId, OwnerId, SharedEngine, Validation, Value, ValueMap,
};
use tether_notify::Subscription;

const LIST: &str = "list";

/// An ordered collection backed by a single list-valued component
///
/// Every mutator rebuilds the list and submits it whole, so a bound partner
/// always observes complete list states, never intermediate edits.
#[derive(Debug, Clone)]
pub struct ObservableList {
    engine: SharedEngine,
    owner: OwnerId,
    hook: HookId,
    events: Events,
}

impl ObservableList {
    /// Create a list with initial items
    pub fn new(engine: &SharedEngine, initial: Vec<Value>) -> Result<Self> {
        let schema = CallbackSchema::new(
            |_current: &ValueMap, _partial: &ValueMap| Ok(ValueMap::new()),
            |candidate: &ValueMap| match candidate.get(LIST) {
                Some(Value::List(_)) | None => Validation::Accepted,
                Some(other) => {
                    Validation::reject(format!("list component must be a list, got {}", other.type_name()))
                }
            },
        );
        let owner = engine.register_owner(schema);
        let hook = engine.create_hook(owner, LIST, Value::List(initial))?;
        let events = attach_publisher(engine, hook)?;
        Ok(Self {
            engine: engine.clone(),
            owner,
            hook,
            events,
        })
    }

    /// Snapshot of the items
    pub fn items(&self) -> Result<Vec<Value>> {
        match self.engine.value(self.hook)? {
            Value::List(items) => Ok(items),
            other => Err(Error::TypeMismatch {
                expected: "list",
                got: other.type_name(),
            }),
        }
    }

    /// Number of items
    pub fn len(&self) -> Result<usize> {
        Ok(self.items()?.len())
    }

    /// Check whether the list has no items
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.items()?.is_empty())
    }

    /// Read one item
    pub fn get(&self, index: usize) -> Result<Value> {
        let items = self.items()?;
        items
            .get(index)
            .cloned()
            .ok_or(Error::IndexOutOfBounds {
                index,
                len: items.len(),
            })
    }

    /// Append an item
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.update(move |items| {
            items.push(value);
            Ok(())
        })
    }

    /// Insert an item at an index (which may equal the length)
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.update(move |items| {
            if index > items.len() {
                return Err(Error::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            Ok(())
        })
    }

    /// Remove and return the item at an index
    pub fn remove(&self, index: usize) -> Result<Value> {
        let mut removed = None;
        self.update(|items| {
            if index >= items.len() {
                return Err(Error::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            removed = Some(items.remove(index));
            Ok(())
        })?;
        removed.ok_or(Error::IndexOutOfBounds { index, len: 0 })
    }

    /// Overwrite the item at an index
    pub fn set_item(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.update(move |items| {
            if index >= items.len() {
                return Err(Error::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            items[index] = value;
            Ok(())
        })
    }

    /// Replace the whole list
    pub fn replace(&self, items: Vec<Value>) -> Result<()> {
        let mut partial = ValueMap::new();
        partial.insert(LIST.to_string(), Value::List(items));
        Ok(self.engine.submit(self.owner, partial)?)
    }

    /// The hook backing the list component
    pub fn hook(&self) -> HookId {
        self.hook
    }

    /// Subscribe to list changes (the callback sees the whole new list)
    pub fn subscribe(
        &self,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription<Value> {
        subscribe(&self.events, callback)
    }

    /// Read-modify-write in one critical section
    fn update(&self, edit: impl FnOnce(&mut Vec<Value>) -> Result<()>) -> Result<()> {
        let owner = self.owner;
        let hook = self.hook;
        self.engine.with(move |engine| {
            let mut items = match engine.value(hook)? {
                Value::List(items) => items,
                other => {
                    return Err(Error::TypeMismatch {
                        expected: "list",
                        got: other.type_name(),
                    })
                }
            };
            edit(&mut items)?;
            let mut partial = ValueMap::new();
            partial.insert(LIST.to_string(), Value::List(items));
            engine.submit(owner, partial)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tether_core::SyncMode;

    #[test]
    fn test_push_insert_remove() {
        let engine = SharedEngine::new();
        let list = ObservableList::new(&engine, vec![Value::Int(1)]).unwrap();

        list.push(3i64).unwrap();
        list.insert(1, 2i64).unwrap();
        assert_eq!(
            list.items().unwrap(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );

        assert_eq!(list.remove(0).unwrap(), Value::Int(1));
        assert_eq!(list.len().unwrap(), 2);

        assert!(matches!(
            list.remove(5),
            Err(Error::IndexOutOfBounds { index: 5, .. })
        ));
    }

    #[test]
    fn test_set_item_and_get() {
        let engine = SharedEngine::new();
        let list = ObservableList::new(&engine, vec![Value::Int(1), Value::Int(2)]).unwrap();

        list.set_item(0, "a").unwrap();
        assert_eq!(list.get(0).unwrap(), Value::String("a".to_string()));
        assert!(list.set_item(9, 0i64).is_err());
    }

    #[test]
    fn test_bound_lists_stay_equal() {
        let engine = SharedEngine::new();
        let a = ObservableList::new(&engine, vec![Value::Int(1)]).unwrap();
        let b = ObservableList::new(&engine, vec![Value::Int(1)]).unwrap();
        engine
            .connect(a.hook(), b.hook(), SyncMode::AssertEqual)
            .unwrap();

        a.push(2i64).unwrap();
        assert_eq!(b.items().unwrap(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_subscription_sees_whole_list() {
        let engine = SharedEngine::new();
        let a = ObservableList::new(&engine, vec![]).unwrap();
        let b = ObservableList::new(&engine, vec![]).unwrap();
        engine
            .connect(a.hook(), b.hook(), SyncMode::AssertEqual)
            .unwrap();

        let lengths = Arc::new(AtomicUsize::new(0));
        let l = lengths.clone();
        let _guard = b.subscribe(move |value| {
            if let Value::List(items) = value {
                l.store(items.len(), Ordering::SeqCst);
            }
        });

        a.push(1i64).unwrap();
        a.push(2i64).unwrap();
        assert_eq!(lengths.load(Ordering::SeqCst), 2);
    }
}
