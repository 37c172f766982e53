//! # Engine Error Types
//!
//! The failure taxonomy for sales, transfers, and loot ticks. Everything
//! that can go wrong inside a periodic or payment callback is converted to
//! one of these locally; nothing unwinds out of a callback with an
//! aggregate lock held.

use crate::spawner::SpawnerId;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the spawner engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The initiator already has a sale attempt pending somewhere.
    /// Recoverable; the user retries.
    #[error("a sale is already in progress for this initiator")]
    AlreadyInProgress,

    /// Nothing in the store yielded a positive price. No state was mutated.
    #[error("no sellable items in the store")]
    NoSellableItems,

    /// The aggregate's lock could not be acquired without blocking.
    /// Transient; the caller retries later. Never escalated.
    #[error("aggregate lock unavailable, retry later")]
    LockUnavailable,

    /// A payment channel reported a failed deposit. The speculative
    /// removal has been rolled back.
    #[error("payment provider rejected the deposit")]
    PaymentFailed,

    /// Payment did not complete within the deadline. The speculative
    /// removal has been rolled back.
    #[error("payment did not complete within {0:?}")]
    PaymentTimeout(Duration),

    /// Insertion was rejected by the store's capacity bound.
    #[error("store capacity exceeded: {rejected} units rejected")]
    CapacityExceeded {
        /// Units that could not be inserted.
        rejected: u64,
    },

    /// A transfer binding's physical setup is broken. Terminates that
    /// binding's recurring schedule, not the process.
    #[error("invalid physical setup, transfer schedule terminated")]
    InvalidPhysicalSetup,

    /// Loot generation hit an entity kind with no table. Degrades to an
    /// empty roll; logged as a configuration gap.
    #[error("unknown entity kind: {0}")]
    UnknownEntityKind(String),

    /// The referenced aggregate is not registered (or was evicted).
    #[error("unknown spawner: {0}")]
    UnknownSpawner(SpawnerId),

    /// The engine is shutting down; no new work is accepted.
    #[error("engine is shutting down")]
    ShuttingDown,
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
