//! Error types for tether-core
//!
//! Rejections (`InvalidValue`, `Completion`, `DivergedValues`) are normal
//! transaction outcomes: the engine guarantees that when one is returned the
//! whole bound network is bit-for-bit unchanged. `DisjointnessViolation` and
//! the `Unknown*` variants indicate bookkeeping bugs, not user errors.

use crate::identity::{HookId, OwnerId};
use crate::value::Value;
use thiserror::Error;

/// Result type for tether-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tether-core
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Isolation validation rejected a candidate value
    ///
    /// This is the submission failure artifact: it names the offending
    /// component, carries the rejected value, and the rejecting owner's
    /// reason. No state was mutated.
    #[error("invalid value {value} for component \"{key}\": {reason}")]
    InvalidValue {
        /// The component the rejection was raised for
        key: String,
        /// The rejected value
        value: Value,
        /// The rejecting owner's reason
        reason: String,
    },

    /// The completion callback raised a domain error
    ///
    /// Fatal for the current transaction and surfaced unchanged; nothing
    /// was mutated.
    #[error("completion failed: {0}")]
    Completion(String),

    /// Operation on a hook that is not attached to any cell
    #[error("{0} is inactive (not attached to a nexus)")]
    InactiveHook(HookId),

    /// Activation of a hook that already has a cell
    #[error("{0} is already active")]
    AlreadyActive(HookId),

    /// Write attempted on a derived (read-only) hook
    #[error("{0} is read-only (derived)")]
    ReadOnlyHook(HookId),

    /// Detach on a hook whose cell contains no other hooks
    #[error("{0} is already isolated in its own nexus")]
    AlreadyIsolated(HookId),

    /// A submission revisited a cell that is mid-submission
    #[error("cycle detected: {0} is already part of an ongoing submission")]
    CycleDetected(HookId),

    /// Connect was asked to merge two fusion domains that already overlap
    ///
    /// Internal invariant breach: a hook belongs to exactly one cell, so two
    /// domains can only overlap after a prior bookkeeping bug.
    #[error("fusion domains of {a} and {b} are not disjoint")]
    DisjointnessViolation {
        /// Hook on the caller side
        a: HookId,
        /// Hook on the target side
        b: HookId,
    },

    /// Assert-equal connect on two cells holding different values
    #[error("cannot bind: values differ ({left} vs {right})")]
    DivergedValues {
        /// Value on the caller side
        left: Value,
        /// Value on the target side
        right: Value,
    },

    /// Hook ID not known to the engine
    #[error("unknown {0}")]
    UnknownHook(HookId),

    /// Owner ID not known to the engine
    #[error("unknown {0}")]
    UnknownOwner(OwnerId),

    /// Component key not declared by the owner
    #[error("{owner} has no component \"{key}\"")]
    UnknownComponent {
        /// The owner that was addressed
        owner: OwnerId,
        /// The unknown component key
        key: String,
    },

    /// Component key declared twice on the same owner
    #[error("{owner} already has a component \"{key}\"")]
    DuplicateComponent {
        /// The owner that was addressed
        owner: OwnerId,
        /// The duplicated component key
        key: String,
    },
}

impl Error {
    /// Check whether this error is a recoverable rejection (the transaction
    /// was aborted cleanly) as opposed to a caller or bookkeeping bug.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidValue { .. } | Error::Completion(_) | Error::DivergedValues { .. }
        )
    }
}

// Compile-time check that Error is Send + Sync for thread-safe error propagation.
// This function is never called but will fail to compile if the bound is not satisfied.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidValue {
            key: "value".to_string(),
            value: Value::Int(-1),
            reason: "must be non-negative".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "invalid value -1 for component \"value\": must be non-negative"
        );

        let err = Error::InactiveHook(HookId::new(3));
        assert_eq!(format!("{}", err), "hook:3 is inactive (not attached to a nexus)");
    }

    #[test]
    fn test_error_rejection_classification() {
        assert!(Error::Completion("key not found".into()).is_rejection());
        assert!(!Error::UnknownHook(HookId::new(0)).is_rejection());
        assert!(!Error::DisjointnessViolation {
            a: HookId::new(0),
            b: HookId::new(1)
        }
        .is_rejection());
    }
}
