//! # Spawnvault Engine
//!
//! The concurrent half of the spawner system: aggregates and their locks,
//! the sale/transaction coordinator, the bulk transfer engine, activity
//! monitoring with loot ticking, and the worker pool they all share.
//!
//! ## Design Principles
//!
//! 1. **One lock per aggregate** - every store mutation happens under its
//!    spawner's mutex; locks are never nested across aggregates
//! 2. **Try-lock everywhere** - concurrent actors skip or report
//!    contention instead of queueing behind each other
//! 3. **Deadlines, not waits** - payment and caller hand-off both use
//!    `recv_timeout`; nothing blocks an attempt indefinitely
//! 4. **Pluggable edges** - pricing, payment, logging, viewers, activity
//!    and persistence are trait seams; absent capabilities degrade
//!    features instead of erroring
//!
//! ## Example
//!
//! ```rust,ignore
//! use spawnvault_engine::{EngineBuilder, Initiator};
//!
//! let engine = EngineBuilder::new(kinds, generator, pricing, listener, viewers, probe)
//!     .payment(payment)
//!     .build();
//! engine.start();
//!
//! let outcome = engine.sell_all(&Initiator::new(7, "steve"), spawner_id)?;
//! engine.shutdown();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::perf)]

pub mod activity;
pub mod engine;
pub mod error;
pub mod sale;
pub mod spawner;
pub mod traits;
pub mod transfer;
pub mod worker;

pub use activity::{ActivityMonitor, ActivityScheduler};
pub use engine::{EngineBuilder, EngineConfig, SpawnerEngine, TakeResult};
pub use error::{EngineError, EngineResult};
pub use sale::{SaleConfig, SaleCoordinator, SellOutcome};
pub use spawner::{
    BlockPos, Spawner, SpawnerId, SpawnerRegistry, SpawnerSettings, SpawnerState, StateGuard,
};
pub use traits::{
    ActivityProbe, ChannelId, Initiator, PaymentProvider, Price, PricingProvider, SaleListener,
    SaleLogger, SpawnerStore, ViewerSink, DEFAULT_CHANNEL,
};
pub use transfer::{
    BindingId, CycleOutcome, SlotContainer, TransferBinding, TransferEngine, TransferScheduler,
    TransferSink, DEFAULT_TRANSFER_BUDGET,
};
pub use worker::{WorkerPool, DEFAULT_QUEUE_DEPTH, MIN_WORKERS};
