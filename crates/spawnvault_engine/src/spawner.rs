//! # Spawner Aggregates
//!
//! The owning entity: one virtual inventory, one mutual-exclusion lock,
//! activity and timing state. The lock is scoped to this aggregate and is
//! never shared across aggregates; all mutation of the store goes through
//! it, which totally orders the mutations of one aggregate. No ordering
//! exists across aggregates, and no code path acquires one aggregate's
//! lock while holding another's.

use parking_lot::{lock_api::ArcMutexGuard, Mutex, RawMutex, RwLock};
use spawnvault_core::VirtualInventory;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Opaque aggregate identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpawnerId(pub u64);

impl fmt::Display for SpawnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spawner#{}", self.0)
    }
}

/// Spatial anchor, used only for collaborator lookups (activity probe,
/// sink adjacency).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockPos {
    /// World X.
    pub x: i32,
    /// World Y.
    pub y: i32,
    /// World Z.
    pub z: i32,
}

impl BlockPos {
    /// Creates a position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Static per-aggregate settings.
#[derive(Clone, Debug)]
pub struct SpawnerSettings {
    /// Minimum mobs per loot tick.
    pub min_mobs: u32,
    /// Maximum mobs per loot tick.
    pub max_mobs: u32,
    /// Delay between loot ticks while active.
    pub spawn_delay: Duration,
    /// Stored-experience cap; gains saturate here.
    pub max_experience: u64,
    /// Whether equipment entries (randomized durability) may drop.
    pub allow_equipment: bool,
    /// Unit capacity of the virtual inventory.
    pub capacity: u64,
}

impl Default for SpawnerSettings {
    fn default() -> Self {
        Self {
            min_mobs: 1,
            max_mobs: 4,
            spawn_delay: Duration::from_secs(25),
            max_experience: 1_000,
            allow_equipment: true,
            capacity: u64::MAX,
        }
    }
}

/// Everything behind the aggregate's lock.
#[derive(Debug)]
pub struct SpawnerState {
    /// The aggregated item store.
    pub inventory: VirtualInventory,
    /// Stored experience, bounded by the settings cap.
    pub experience: u64,
    /// When the next loot tick is due (while active).
    pub next_spawn_at: Instant,
}

impl SpawnerState {
    /// Adds experience, saturating at `cap`.
    pub fn gain_experience(&mut self, amount: u64, cap: u64) {
        self.experience = self.experience.saturating_add(amount).min(cap);
    }

    /// Drains all stored experience.
    pub fn take_experience(&mut self) -> u64 {
        std::mem::take(&mut self.experience)
    }
}

/// Owned guard over an aggregate's state.
///
/// Owned (Arc-based) so the sale pipeline can carry it onto a worker
/// thread and hold the lock for the attempt's entire duration.
pub type StateGuard = ArcMutexGuard<RawMutex, SpawnerState>;

/// The owning aggregate.
pub struct Spawner {
    id: SpawnerId,
    pos: BlockPos,
    entity_kind: String,
    settings: SpawnerSettings,
    active: AtomicBool,
    state: Arc<Mutex<SpawnerState>>,
}

impl Spawner {
    /// Creates an aggregate with an empty store.
    #[must_use]
    pub fn new(
        id: SpawnerId,
        pos: BlockPos,
        entity_kind: impl Into<String>,
        settings: SpawnerSettings,
    ) -> Self {
        let inventory = VirtualInventory::with_capacity(settings.capacity);
        Self {
            id,
            pos,
            entity_kind: entity_kind.into(),
            active: AtomicBool::new(false),
            state: Arc::new(Mutex::new(SpawnerState {
                inventory,
                experience: 0,
                next_spawn_at: Instant::now() + settings.spawn_delay,
            })),
            settings,
        }
    }

    /// Aggregate identity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SpawnerId {
        self.id
    }

    /// Spatial anchor.
    #[inline]
    #[must_use]
    pub const fn pos(&self) -> BlockPos {
        self.pos
    }

    /// Entity kind this aggregate generates loot for.
    #[inline]
    #[must_use]
    pub fn entity_kind(&self) -> &str {
        &self.entity_kind
    }

    /// Static settings.
    #[inline]
    #[must_use]
    pub const fn settings(&self) -> &SpawnerSettings {
        &self.settings
    }

    /// Whether the aggregate is currently generating loot.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Flips the active flag; returns the previous value so callers can
    /// detect transitions.
    pub fn set_active(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::SeqCst)
    }

    /// Non-blocking acquisition of the aggregate's lock as an owned guard.
    ///
    /// `None` means some other actor (sale, transfer, loot tick) holds it;
    /// callers skip or report [`LockUnavailable`](crate::EngineError::LockUnavailable).
    #[must_use]
    pub fn try_lock(&self) -> Option<StateGuard> {
        self.state.try_lock_arc()
    }

    /// Blocking acquisition. Used only where contention is acceptable
    /// (persistence snapshots, tests); the concurrent actors all use
    /// [`try_lock`](Self::try_lock).
    #[must_use]
    pub fn lock(&self) -> StateGuard {
        self.state.lock_arc()
    }
}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner")
            .field("id", &self.id)
            .field("pos", &self.pos)
            .field("entity_kind", &self.entity_kind)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// All live aggregates, keyed by id.
///
/// Eviction drops the registry's `Arc`; once in-flight holders release
/// theirs, the lock and store are discarded with the aggregate.
#[derive(Default)]
pub struct SpawnerRegistry {
    spawners: RwLock<HashMap<SpawnerId, Arc<Spawner>>>,
}

impl SpawnerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an aggregate (on load or first placement).
    pub fn insert(&self, spawner: Spawner) -> Arc<Spawner> {
        let spawner = Arc::new(spawner);
        self.spawners
            .write()
            .insert(spawner.id(), Arc::clone(&spawner));
        spawner
    }

    /// Looks up a live aggregate.
    #[must_use]
    pub fn get(&self, id: SpawnerId) -> Option<Arc<Spawner>> {
        self.spawners.read().get(&id).cloned()
    }

    /// Removes an aggregate (on destruction/eviction).
    pub fn evict(&self, id: SpawnerId) -> Option<Arc<Spawner>> {
        let evicted = self.spawners.write().remove(&id);
        if evicted.is_some() {
            tracing::info!(%id, "spawner evicted");
        }
        evicted
    }

    /// Snapshot of all live aggregates.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Spawner>> {
        self.spawners.read().values().cloned().collect()
    }

    /// Number of live aggregates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spawners.read().len()
    }

    /// Returns true if no aggregates are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spawners.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spawnvault_core::{ItemSignature, ItemStack};

    fn test_spawner(id: u64) -> Spawner {
        Spawner::new(
            SpawnerId(id),
            BlockPos::new(0, 64, 0),
            "skeleton",
            SpawnerSettings::default(),
        )
    }

    #[test]
    fn try_lock_is_exclusive() {
        let spawner = test_spawner(1);

        let guard = spawner.try_lock().expect("uncontended lock");
        assert!(spawner.try_lock().is_none(), "second acquisition must fail");
        drop(guard);
        assert!(spawner.try_lock().is_some());
    }

    #[test]
    fn guard_can_cross_threads() {
        // The sale pipeline moves the guard onto a worker thread and holds
        // it for the attempt's entire duration.
        let spawner = Arc::new(test_spawner(2));
        let mut guard = spawner.try_lock().expect("uncontended lock");

        let worker = std::thread::spawn(move || {
            guard
                .inventory
                .add_items([ItemStack::new(ItemSignature::of(0), 5)]);
            drop(guard);
        });

        worker.join().expect("worker finished");
        let guard = spawner.try_lock().expect("released after worker drop");
        assert_eq!(guard.inventory.amount_of(&ItemSignature::of(0)), 5);
    }

    #[test]
    fn experience_saturates_at_cap() {
        let spawner = test_spawner(3);
        let mut guard = spawner.lock();

        guard.gain_experience(900, 1_000);
        guard.gain_experience(900, 1_000);
        assert_eq!(guard.experience, 1_000);

        assert_eq!(guard.take_experience(), 1_000);
        assert_eq!(guard.experience, 0);
    }

    #[test]
    fn eviction_discards_the_aggregate() {
        let registry = SpawnerRegistry::new();
        let spawner = registry.insert(test_spawner(4));
        assert_eq!(registry.len(), 1);

        let evicted = registry.evict(spawner.id()).expect("was registered");
        assert!(registry.get(evicted.id()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn active_flag_reports_transitions() {
        let spawner = test_spawner(5);
        assert!(!spawner.set_active(true), "was inactive before");
        assert!(spawner.set_active(true), "no transition");
        assert!(spawner.set_active(false));
    }
}
