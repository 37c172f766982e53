//! # Spawnvault Core
//!
//! Pure data structures for the spawner item store.
//!
//! ## Design Principles
//!
//! 1. **No locking here** - the store is a plain data structure; the owning
//!    aggregate's lock (in `spawnvault_engine`) serializes all mutation
//! 2. **Aggregated counts, not slots** - quantities are unbounded u64 per
//!    signature; the slot-shaped display view is a derived projection
//! 3. **Integer rolls** - drop chances are basis points, never floats
//! 4. **External configuration** - all balance data in TOML files, loaded
//!    once, swapped whole on reload
//!
//! ## Example
//!
//! ```rust,ignore
//! use spawnvault_core::{LootConfig, LootGenerator, VirtualInventory};
//!
//! let config = LootConfig::from_path("data/loot.toml")?;
//! let generator = LootGenerator::new(config.tables);
//!
//! let roll = generator.generate(&mut rng, "skeleton", 1, 4, true);
//! let rejected = inventory.add_items(roll.stacks);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod inventory;
pub mod loot;
pub mod signature;

pub use config::LootConfig;
pub use error::{StoreError, StoreResult};
pub use inventory::VirtualInventory;
pub use loot::{EntityLoot, LootEntry, LootGenerator, LootRoll, LootTableSet, BP_SCALE};
pub use signature::{
    ItemKind, ItemKindId, ItemKindRegistry, ItemSignature, ItemStack, SpecialEffect,
    DEFAULT_MAX_STACK,
};
