//! Tether Containers - observable container façades
//!
//! Thin container flavors over the `tether-core` binding engine:
//! - [`ObservableValue`]: one bindable value with an optional validator
//! - [`ObservableTuple`]: fixed-arity slots validated as a unit
//! - [`ObservableList`] / [`ObservableDict`]: whole-collection components
//! - [`SelectedDict`] / [`SelectedDictWithDefault`]: a dict, a selected key,
//!   and a derived read-only view of the selected value
//!
//! Each façade declares its component schema (completion + validation) and
//! convenience accessors; all consistency, fusion, and rollback behavior
//! lives in the engine. Change notification is bridged into
//! `tether-notify` publishers, so subscribing returns an RAII guard.
//!
//! ## Design principles
//!
//! 1. **Containers never mutate a hook outside `set`/`submit`** - every
//!    mutator is one engine transaction
//! 2. **`tether-core` is standalone** - it does not know about containers
//! 3. **Values read out are snapshots** - mutate via the container, not the
//!    returned value

mod dict;
mod error;
mod events;
mod list;
mod select;
mod single;
mod tuple;

pub use dict::ObservableDict;
pub use error::{Error, Result};
pub use list::ObservableList;
pub use select::{SelectedDict, SelectedDictWithDefault};
pub use single::ObservableValue;
pub use tuple::ObservableTuple;

// Re-exported so callers can bind containers together without naming the
// core crate directly.
pub use tether_core::{HookId, SharedEngine, SyncMode, Validation, Value, ValueMap};
pub use tether_notify::{Subscription, SubscriptionId};
