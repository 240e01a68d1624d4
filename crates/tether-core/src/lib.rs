//! Tether Core - Reactive binding engine with transactional submission
//!
//! This crate provides the core types and engine for tether:
//! - Dynamic component values (`Value`, `ValueMap`)
//! - Hook, cell, and owner identifiers
//! - The fusion graph engine: shared value cells (`nexus`), typed endpoints
//!   (hooks), and the connect/detach algorithms that merge and split them
//! - The atomic multi-component submission protocol: completion, isolation
//!   validation, commit with full rollback, derived recompute
//! - A thread-safe handle (`SharedEngine`) for cross-thread callers
//!
//! ## Model
//!
//! A *hook* is a typed endpoint owned by exactly one *owner* (an entity
//! whose named components must jointly satisfy an invariant). Every hook is
//! attached to exactly one *cell*, the single authoritative value for its
//! *fusion domain* — the set of hooks bound together by `connect`. Updating
//! any hook updates every transitively connected hook, or nothing at all:
//! a rejection anywhere unwinds the whole transaction.
//!
//! ```
//! use tether_core::{AcceptAll, Engine, SyncMode, Value};
//!
//! let mut engine = Engine::new();
//! let left = engine.register_owner(AcceptAll);
//! let right = engine.register_owner(AcceptAll);
//! let a = engine.create_hook(left, "value", 5i64).unwrap();
//! let b = engine.create_hook(right, "value", 5i64).unwrap();
//!
//! engine.connect(a, b, SyncMode::AssertEqual).unwrap();
//! engine.set(a, 10i64).unwrap();
//! assert_eq!(engine.value(b).unwrap(), Value::Int(10));
//! ```

mod engine;
mod error;
mod hook;
mod identity;
mod nexus;
mod owner;
mod shared;
mod sync;
mod value;

pub use engine::Engine;
pub use error::{Error, Result};
pub use hook::HookKind;
pub use identity::{HookId, ListenerId, NexusId, OwnerId};
pub use owner::{AcceptAll, CallbackSchema, Schema, Validation};
pub use shared::SharedEngine;
pub use sync::SyncMode;
pub use value::{Value, ValueMap};
