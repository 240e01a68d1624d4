//! Error types for tether-containers

use thiserror::Error;

/// Result type for container operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the container façades
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// An engine operation was rejected or failed
    #[error("core error: {0}")]
    Core(#[from] tether_core::Error),

    /// Index past the end of a list or tuple
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// The requested index
        index: usize,
        /// The container length at the time of the call
        len: usize,
    },

    /// Dict key not present
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The backing component held an unexpected value type
    #[error("expected {expected}, got {got}")]
    TypeMismatch {
        /// The type the container declares
        expected: &'static str,
        /// The type actually found
        got: &'static str,
    },
}

impl Error {
    /// Check whether this error is a recoverable transaction rejection
    pub fn is_rejection(&self) -> bool {
        match self {
            Error::Core(inner) => inner.is_rejection(),
            _ => false,
        }
    }
}
