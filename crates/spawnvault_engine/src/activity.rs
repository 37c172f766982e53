//! # Activity Monitoring and Loot Ticking
//!
//! One interval thread, two passes over the registry. The activity pass
//! asks the [`ActivityProbe`] whether each spawner's surroundings warrant
//! generation and flips the active flag on transitions, resetting spawn
//! timing on activation. The loot pass rolls loot for every active spawner
//! whose delay has elapsed and banks the result into its store. Both
//! passes take aggregate locks non-blocking and skip contended spawners;
//! a missed tick just waits for the next one.

use crate::spawner::{Spawner, SpawnerRegistry};
use crate::traits::{ActivityProbe, ViewerSink};
use crate::worker::WorkerPool;
use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::{Mutex, RwLock};
use rand::{rngs::StdRng, SeedableRng};
use spawnvault_core::LootGenerator;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Drives activity transitions and loot generation.
pub struct ActivityMonitor {
    registry: Arc<SpawnerRegistry>,
    probe: Arc<dyn ActivityProbe>,
    generator: Arc<RwLock<LootGenerator>>,
    rng: Mutex<StdRng>,
    viewers: Arc<dyn ViewerSink>,
    pool: Arc<WorkerPool>,
}

impl ActivityMonitor {
    /// Creates a monitor with a wall-clock-derived RNG seed.
    #[must_use]
    pub fn new(
        registry: Arc<SpawnerRegistry>,
        probe: Arc<dyn ActivityProbe>,
        generator: Arc<RwLock<LootGenerator>>,
        viewers: Arc<dyn ViewerSink>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos() as u64);
        Self::with_seed(registry, probe, generator, viewers, pool, seed)
    }

    /// Creates a monitor with a fixed RNG seed, for deterministic tests.
    #[must_use]
    pub fn with_seed(
        registry: Arc<SpawnerRegistry>,
        probe: Arc<dyn ActivityProbe>,
        generator: Arc<RwLock<LootGenerator>>,
        viewers: Arc<dyn ViewerSink>,
        pool: Arc<WorkerPool>,
        seed: u64,
    ) -> Self {
        Self {
            registry,
            probe,
            generator,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            viewers,
            pool,
        }
    }

    /// Runs both passes once over every registered spawner.
    pub fn run_tick(&self) {
        let now = Instant::now();
        for spawner in self.registry.all() {
            self.check_activity(&spawner, now);
            if spawner.is_active() {
                self.roll_loot(&spawner, now);
            }
        }
    }

    /// Flips the active flag when the probe disagrees with it. Activation
    /// resets spawn timing, which needs the lock; a contended lock defers
    /// the transition to the next tick.
    fn check_activity(&self, spawner: &Arc<Spawner>, now: Instant) {
        let was_active = spawner.is_active();
        let is_active = self.probe.is_active(&spawner.pos());
        if was_active == is_active {
            return;
        }

        if is_active {
            let Some(mut guard) = spawner.try_lock() else {
                return;
            };
            guard.next_spawn_at = now + spawner.settings().spawn_delay;
        }
        spawner.set_active(is_active);
        tracing::info!(
            spawner = %spawner.id(),
            active = is_active,
            "spawner activity changed"
        );
    }

    /// Rolls loot for an active spawner whose delay has elapsed and banks
    /// it into the store.
    fn roll_loot(&self, spawner: &Arc<Spawner>, now: Instant) {
        let Some(mut guard) = spawner.try_lock() else {
            return;
        };
        if guard.next_spawn_at > now {
            return;
        }

        let settings = spawner.settings();
        let roll = {
            let generator = self.generator.read();
            let mut rng = self.rng.lock();
            generator.generate(
                &mut *rng,
                spawner.entity_kind(),
                settings.min_mobs,
                settings.max_mobs,
                settings.allow_equipment,
            )
        };
        guard.next_spawn_at = now + settings.spawn_delay;
        if roll.is_empty() {
            return;
        }

        let rejected = guard.inventory.add_items(roll.stacks);
        if !rejected.is_empty() {
            let overflow: u64 = rejected.iter().map(|stack| stack.amount).sum();
            tracing::warn!(
                spawner = %spawner.id(),
                overflow,
                "store at capacity, generated units discarded"
            );
        }
        guard.gain_experience(roll.experience, settings.max_experience);
        drop(guard);

        let viewers = Arc::clone(&self.viewers);
        let spawner_id = spawner.id();
        self.pool.execute(move || viewers.refresh(spawner_id));
    }
}

/// Interval thread driving [`ActivityMonitor::run_tick`].
pub struct ActivityScheduler {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ActivityScheduler {
    /// Starts the monitor thread with the given tick interval.
    #[must_use]
    pub fn start(monitor: Arc<ActivityMonitor>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let ticker = tick(interval);
        let handle = std::thread::Builder::new()
            .name("activity-monitor".into())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => monitor.run_tick(),
                    recv(stop_rx) -> _ => break,
                }
            })
            .ok();
        if handle.is_none() {
            tracing::warn!("activity monitor thread failed to start");
        }
        Self { stop_tx, handle }
    }

    /// Stops the monitor thread and joins it.
    pub fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("activity monitor thread panicked");
            }
        }
    }
}

impl Drop for ActivityScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
