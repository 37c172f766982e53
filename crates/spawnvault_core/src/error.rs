//! # Store Error Types
//!
//! All errors that can occur in the item store.

use thiserror::Error;

/// Errors that can occur in the item store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Insertion rejected because the store's unit capacity is exhausted.
    #[error("store capacity exceeded: capacity {capacity}, rejected {rejected} units")]
    CapacityExceeded {
        /// Configured unit capacity of the store.
        capacity: u64,
        /// Units that could not be inserted.
        rejected: u64,
    },

    /// An item kind name that is not present in the registry.
    #[error("unknown item kind: {0}")]
    UnknownItemKind(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
