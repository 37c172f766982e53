//! # Engine Facade
//!
//! Wires the registry, loot generator, sale coordinator, transfer engine,
//! and activity monitor into one owned surface. Collaborator capabilities
//! (payment, sale logging, persistence) are resolved once at construction;
//! absent capabilities degrade the relevant feature instead of erroring
//! per call. `shutdown` stops the interval threads, drains the worker
//! pool, and saves every aggregate through the persistence collaborator.

use crate::activity::{ActivityMonitor, ActivityScheduler};
use crate::error::{EngineError, EngineResult};
use crate::sale::{SaleConfig, SaleCoordinator, SellOutcome};
use crate::spawner::{BlockPos, Spawner, SpawnerId, SpawnerRegistry, SpawnerSettings};
use crate::traits::{
    ActivityProbe, Initiator, PaymentProvider, PricingProvider, SaleListener, SaleLogger,
    SpawnerStore, ViewerSink,
};
use crate::transfer::{
    drain_into, TransferBinding, TransferEngine, TransferScheduler, TransferSink,
    DEFAULT_TRANSFER_BUDGET,
};
use crate::worker::WorkerPool;
use parking_lot::{Mutex, RwLock};
use spawnvault_core::{ItemKindRegistry, LootGenerator, LootTableSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Top-level engine tuning.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Sale state-machine tuning.
    pub sale: SaleConfig,
    /// Interval between transfer cycles.
    pub transfer_interval: Duration,
    /// Interval between activity/loot ticks.
    pub activity_interval: Duration,
    /// Default per-cycle unit budget for new transfer bindings.
    pub transfer_budget: u64,
    /// Worker pool size (clamped to the pool's minimum).
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sale: SaleConfig::default(),
            transfer_interval: Duration::from_secs(1),
            activity_interval: Duration::from_secs(1),
            transfer_budget: DEFAULT_TRANSFER_BUDGET,
            worker_threads: 4,
        }
    }
}

/// What interactive take-all handed over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TakeResult {
    /// Item units moved into the caller's container.
    pub units: u64,
    /// Stored experience drained alongside the items.
    pub experience: u64,
}

/// Staged construction for [`SpawnerEngine`].
///
/// Required collaborators go through [`EngineBuilder::new`]; optional
/// capabilities are added fluently and resolved exactly once.
pub struct EngineBuilder {
    config: EngineConfig,
    kinds: Arc<ItemKindRegistry>,
    generator: LootGenerator,
    pricing: Arc<dyn PricingProvider>,
    listener: Arc<dyn SaleListener>,
    viewers: Arc<dyn ViewerSink>,
    probe: Arc<dyn ActivityProbe>,
    payment: Option<Arc<dyn PaymentProvider>>,
    logger: Option<Arc<dyn SaleLogger>>,
    store: Option<Arc<dyn SpawnerStore>>,
    seed: Option<u64>,
}

impl EngineBuilder {
    /// Starts a builder from the required collaborators.
    #[must_use]
    pub fn new(
        kinds: Arc<ItemKindRegistry>,
        generator: LootGenerator,
        pricing: Arc<dyn PricingProvider>,
        listener: Arc<dyn SaleListener>,
        viewers: Arc<dyn ViewerSink>,
        probe: Arc<dyn ActivityProbe>,
    ) -> Self {
        Self {
            config: EngineConfig::default(),
            kinds,
            generator,
            pricing,
            listener,
            viewers,
            probe,
            payment: None,
            logger: None,
            store: None,
            seed: None,
        }
    }

    /// Overrides the default tuning.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables real deposits. Without one, sales drain the store with a
    /// zero-consequence settle step.
    #[must_use]
    pub fn payment(mut self, payment: Arc<dyn PaymentProvider>) -> Self {
        self.payment = Some(payment);
        self
    }

    /// Enables per-line sale records.
    #[must_use]
    pub fn sale_logger(mut self, logger: Arc<dyn SaleLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Enables persistence: aggregates load at startup and save at
    /// shutdown.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SpawnerStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Fixes the loot RNG seed, for deterministic tests.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Wires everything together. Aggregates load from the persistence
    /// collaborator if one is configured; interval threads do not run
    /// until [`SpawnerEngine::start`].
    #[must_use]
    pub fn build(self) -> SpawnerEngine {
        let pool = Arc::new(WorkerPool::new(self.config.worker_threads));
        let registry = Arc::new(SpawnerRegistry::new());
        let generator = Arc::new(RwLock::new(self.generator));

        let coordinator = Arc::new(SaleCoordinator::new(
            self.config.sale.clone(),
            Arc::clone(&self.kinds),
            self.pricing,
            self.payment,
            self.logger,
            self.listener,
            Arc::clone(&self.viewers),
            Arc::clone(&pool),
        ));
        let transfer = Arc::new(TransferEngine::new(
            Arc::clone(&self.kinds),
            Arc::clone(&self.viewers),
            Arc::clone(&pool),
        ));
        let monitor = Arc::new(match self.seed {
            Some(seed) => ActivityMonitor::with_seed(
                Arc::clone(&registry),
                self.probe,
                Arc::clone(&generator),
                Arc::clone(&self.viewers),
                Arc::clone(&pool),
                seed,
            ),
            None => ActivityMonitor::new(
                Arc::clone(&registry),
                self.probe,
                Arc::clone(&generator),
                Arc::clone(&self.viewers),
                Arc::clone(&pool),
            ),
        });

        let engine = SpawnerEngine {
            config: self.config,
            kinds: self.kinds,
            registry,
            generator,
            coordinator,
            transfer,
            monitor,
            viewers: self.viewers,
            store: self.store,
            pool,
            schedulers: Mutex::new(None),
            next_spawner_id: AtomicU64::new(1),
            shutting_down: AtomicBool::new(false),
        };
        engine.load_persisted();
        engine
    }
}

/// The assembled engine.
pub struct SpawnerEngine {
    config: EngineConfig,
    kinds: Arc<ItemKindRegistry>,
    registry: Arc<SpawnerRegistry>,
    generator: Arc<RwLock<LootGenerator>>,
    coordinator: Arc<SaleCoordinator>,
    transfer: Arc<TransferEngine>,
    monitor: Arc<ActivityMonitor>,
    viewers: Arc<dyn ViewerSink>,
    store: Option<Arc<dyn SpawnerStore>>,
    pool: Arc<WorkerPool>,
    schedulers: Mutex<Option<(TransferScheduler, ActivityScheduler)>>,
    next_spawner_id: AtomicU64,
    shutting_down: AtomicBool,
}

impl SpawnerEngine {
    fn load_persisted(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let mut highest = 0;
        let mut loaded = 0usize;
        for spawner in store.load_all() {
            highest = highest.max(spawner.id().0);
            self.registry.insert(spawner);
            loaded += 1;
        }
        self.next_spawner_id.store(highest + 1, Ordering::SeqCst);
        if loaded > 0 {
            tracing::info!(loaded, "spawners restored from store");
        }
    }

    fn reject_if_stopping(&self) -> EngineResult<()> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(EngineError::ShuttingDown);
        }
        Ok(())
    }

    fn lookup(&self, id: SpawnerId) -> EngineResult<Arc<Spawner>> {
        self.registry.get(id).ok_or(EngineError::UnknownSpawner(id))
    }

    /// Starts the transfer and activity interval threads. Idempotent.
    pub fn start(&self) {
        let mut schedulers = self.schedulers.lock();
        if schedulers.is_some() {
            return;
        }
        *schedulers = Some((
            TransferScheduler::start(Arc::clone(&self.transfer), self.config.transfer_interval),
            ActivityScheduler::start(Arc::clone(&self.monitor), self.config.activity_interval),
        ));
        tracing::info!(
            spawners = self.registry.len(),
            workers = self.config.worker_threads,
            "spawner engine started"
        );
    }

    /// Registers a new aggregate.
    pub fn add_spawner(
        &self,
        pos: BlockPos,
        entity_kind: impl Into<String>,
        settings: SpawnerSettings,
    ) -> EngineResult<Arc<Spawner>> {
        self.reject_if_stopping()?;
        let id = SpawnerId(self.next_spawner_id.fetch_add(1, Ordering::SeqCst));
        Ok(self
            .registry
            .insert(Spawner::new(id, pos, entity_kind, settings)))
    }

    /// Evicts an aggregate; the caller owns whatever the store still held.
    pub fn remove_spawner(&self, id: SpawnerId) -> EngineResult<Arc<Spawner>> {
        self.registry.evict(id).ok_or(EngineError::UnknownSpawner(id))
    }

    /// Live aggregate lookup.
    #[must_use]
    pub fn spawner(&self, id: SpawnerId) -> Option<Arc<Spawner>> {
        self.registry.get(id)
    }

    /// The shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SpawnerRegistry> {
        &self.registry
    }

    /// The shared item-kind registry.
    #[must_use]
    pub fn kinds(&self) -> &Arc<ItemKindRegistry> {
        &self.kinds
    }

    /// Sells everything sellable in one spawner's store. See
    /// [`SaleCoordinator::sell_all`] for the outcome contract.
    pub fn sell_all(&self, initiator: &Initiator, id: SpawnerId) -> EngineResult<SellOutcome> {
        self.reject_if_stopping()?;
        let spawner = self.lookup(id)?;
        Ok(self.coordinator.sell_all(initiator, &spawner))
    }

    /// Binds a sink to a spawner with the engine's default cycle budget.
    pub fn bind_transfer(
        &self,
        id: SpawnerId,
        sink: Box<dyn TransferSink>,
    ) -> EngineResult<Arc<TransferBinding>> {
        self.bind_transfer_with_budget(id, sink, self.config.transfer_budget)
    }

    /// Binds a sink with an explicit per-cycle unit budget.
    pub fn bind_transfer_with_budget(
        &self,
        id: SpawnerId,
        sink: Box<dyn TransferSink>,
        budget: u64,
    ) -> EngineResult<Arc<TransferBinding>> {
        self.reject_if_stopping()?;
        let spawner = self.lookup(id)?;
        Ok(self.transfer.bind(spawner, sink, budget))
    }

    /// The transfer engine, for cycle-level control in tests and tools.
    #[must_use]
    pub fn transfer(&self) -> &Arc<TransferEngine> {
        &self.transfer
    }

    /// The activity monitor, for tick-level control in tests and tools.
    #[must_use]
    pub fn monitor(&self) -> &Arc<ActivityMonitor> {
        &self.monitor
    }

    /// Moves as much of one spawner's store as fits into the caller's
    /// container and drains the stored experience with it.
    ///
    /// Lock contention is reported, not waited out; the caller retries.
    pub fn take_all(
        &self,
        id: SpawnerId,
        sink: &mut dyn TransferSink,
    ) -> EngineResult<TakeResult> {
        self.reject_if_stopping()?;
        let spawner = self.lookup(id)?;
        let Some(mut guard) = spawner.try_lock() else {
            return Err(EngineError::LockUnavailable);
        };

        let view = guard.inventory.display_view(&self.kinds);
        let placed = drain_into(sink, &view, u64::MAX);
        let removed = guard.inventory.remove_items(&placed);
        let units: u64 = removed.iter().map(|stack| stack.amount).sum();
        let experience = guard.take_experience();
        drop(guard);

        if units > 0 || experience > 0 {
            let viewers = Arc::clone(&self.viewers);
            self.pool.execute(move || viewers.refresh(id));
        }
        Ok(TakeResult { units, experience })
    }

    /// Swaps in freshly loaded loot tables; subsequent ticks see the new
    /// set, in-flight rolls finish on the old one.
    pub fn reload_tables(&self, tables: LootTableSet) {
        self.generator.write().replace_tables(tables);
    }

    /// Whether an initiator has a sale attempt pending.
    #[must_use]
    pub fn sale_pending(&self, initiator: u64) -> bool {
        self.coordinator.is_pending(initiator)
    }

    /// Stops periodic work, drains the worker pool, and saves every
    /// aggregate. Pending-sale markers are cleared without waiting:
    /// deposits that already committed stay committed. Idempotent.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("spawner engine shutting down");

        if let Some((mut transfer, mut activity)) = self.schedulers.lock().take() {
            transfer.stop();
            activity.stop();
        }
        self.pool.shutdown();
        self.coordinator.clear_pending();

        if let Some(store) = self.store.as_ref() {
            for spawner in self.registry.all() {
                store.save(&spawner);
            }
            tracing::info!(saved = self.registry.len(), "spawners saved to store");
        }
    }
}

impl Drop for SpawnerEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
