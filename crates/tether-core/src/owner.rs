//! Owner records and the component schema seam
//!
//! An owner is an entity exposing named component hooks that must jointly
//! satisfy an invariant. The two capabilities it contributes — deriving the
//! missing pieces of a partial submission and judging a full candidate map —
//! are an explicit trait injected at registration, not probed at runtime.

use crate::error::Result;
use crate::identity::{HookId, OwnerId};
use crate::value::{Value, ValueMap};
use indexmap::IndexMap;

/// Outcome of isolation validation over a full candidate component map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The candidate map is self-consistent
    Accepted,
    /// The candidate map violates the owner's invariant
    Rejected(String),
}

impl Validation {
    /// Check whether this outcome is an acceptance
    pub fn is_accepted(&self) -> bool {
        matches!(self, Validation::Accepted)
    }

    /// Build a rejection with a reason
    pub fn reject(reason: impl Into<String>) -> Self {
        Validation::Rejected(reason.into())
    }
}

/// The per-owner capability pair driving the submission transaction
///
/// `complete` encodes domain rules (e.g. "if only the selection key changes
/// and it is absent from the backing map, synthesize a default entry");
/// `validate` judges a full candidate map. Both see plain maps and cannot
/// reach back into the engine.
pub trait Schema: Send {
    /// Given the current full component map and a partial submission, derive
    /// the additional component values the submission implies.
    ///
    /// Returning an error aborts the transaction before any mutation.
    fn complete(&self, current: &ValueMap, partial: &ValueMap) -> Result<ValueMap>;

    /// Decide whether a full candidate component map satisfies this owner's
    /// invariant.
    fn validate(&self, candidate: &ValueMap) -> Validation;
}

/// A schema that derives nothing and accepts everything
///
/// The right choice for single-component owners without constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Schema for AcceptAll {
    fn complete(&self, _current: &ValueMap, _partial: &ValueMap) -> Result<ValueMap> {
        Ok(ValueMap::new())
    }

    fn validate(&self, _candidate: &ValueMap) -> Validation {
        Validation::Accepted
    }
}

/// A schema built from two closures
pub struct CallbackSchema<C, V>
where
    C: Fn(&ValueMap, &ValueMap) -> Result<ValueMap> + Send,
    V: Fn(&ValueMap) -> Validation + Send,
{
    complete: C,
    validate: V,
}

impl<C, V> CallbackSchema<C, V>
where
    C: Fn(&ValueMap, &ValueMap) -> Result<ValueMap> + Send,
    V: Fn(&ValueMap) -> Validation + Send,
{
    /// Create a schema from a completion closure and a validation closure
    pub fn new(complete: C, validate: V) -> Self {
        Self { complete, validate }
    }
}

impl<C, V> Schema for CallbackSchema<C, V>
where
    C: Fn(&ValueMap, &ValueMap) -> Result<ValueMap> + Send,
    V: Fn(&ValueMap) -> Validation + Send,
{
    fn complete(&self, current: &ValueMap, partial: &ValueMap) -> Result<ValueMap> {
        (self.complete)(current, partial)
    }

    fn validate(&self, candidate: &ValueMap) -> Validation {
        (self.validate)(candidate)
    }
}

/// A derived (read-only) hook slot: the hook plus its recompute function
pub(crate) struct DerivedSlot {
    /// The derived hook's id
    pub(crate) hook: HookId,
    /// Recomputes the projection from the full primary component map
    pub(crate) compute: Box<dyn Fn(&ValueMap) -> Value + Send>,
}

/// The engine-side record backing one owner
pub(crate) struct OwnerRecord {
    /// This owner's identity
    pub(crate) id: OwnerId,
    /// The injected completion/validation capability pair
    pub(crate) schema: Box<dyn Schema>,
    /// Primary components: key → hook (the owner's component schema)
    pub(crate) components: IndexMap<String, HookId>,
    /// Derived projections: key → slot
    pub(crate) derived: IndexMap<String, DerivedSlot>,
}

impl OwnerRecord {
    pub(crate) fn new(id: OwnerId, schema: Box<dyn Schema>) -> Self {
        Self {
            id,
            schema,
            components: IndexMap::new(),
            derived: IndexMap::new(),
        }
    }

    /// Check whether a key is taken by a primary or derived component
    pub(crate) fn has_key(&self, key: &str) -> bool {
        self.components.contains_key(key) || self.derived.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_all() {
        let schema = AcceptAll;
        let map = ValueMap::new();
        assert!(schema.complete(&map, &map).unwrap().is_empty());
        assert!(schema.validate(&map).is_accepted());
    }

    #[test]
    fn test_callback_schema() {
        let schema = CallbackSchema::new(
            |_current: &ValueMap, partial: &ValueMap| {
                let mut extra = ValueMap::new();
                if partial.contains_key("a") {
                    extra.insert("b".to_string(), Value::Int(2));
                }
                Ok(extra)
            },
            |candidate: &ValueMap| {
                if candidate.get("a").and_then(Value::as_int).unwrap_or(0) < 0 {
                    Validation::reject("a must be non-negative")
                } else {
                    Validation::Accepted
                }
            },
        );

        let mut partial = ValueMap::new();
        partial.insert("a".to_string(), Value::Int(1));
        let extra = schema.complete(&ValueMap::new(), &partial).unwrap();
        assert_eq!(extra.get("b"), Some(&Value::Int(2)));

        let mut candidate = ValueMap::new();
        candidate.insert("a".to_string(), Value::Int(-1));
        assert_eq!(
            schema.validate(&candidate),
            Validation::Rejected("a must be non-negative".to_string())
        );
    }

    #[test]
    fn test_owner_record_keys() {
        let mut record = OwnerRecord::new(OwnerId::new(0), Box::new(AcceptAll));
        record.components.insert("value".to_string(), HookId::new(0));
        record.derived.insert(
            "double".to_string(),
            DerivedSlot {
                hook: HookId::new(1),
                compute: Box::new(|_| Value::Null),
            },
        );

        assert!(record.has_key("value"));
        assert!(record.has_key("double"));
        assert!(!record.has_key("other"));
    }
}
