//! Value resolution rule used when two hooks are connected
//!
//! The mode only exists for the duration of the connect call: it decides
//! which side's value seeds the merged cell. Once fused, the cells are
//! symmetric and the mode has no persistent representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How to resolve which side's value wins when two hooks are connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SyncMode {
    /// The caller's value overwrites the target's cell
    Push,
    /// The target's value overwrites the caller's cell
    Pull,
    /// Require the two cells to already hold equal values; fail otherwise
    #[default]
    AssertEqual,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncMode::Push => "push",
            SyncMode::Pull => "pull",
            SyncMode::AssertEqual => "assert-equal",
        };
        write!(f, "{}", name)
    }
}
