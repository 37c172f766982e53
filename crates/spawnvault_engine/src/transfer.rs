//! # Bulk Transfer Engine
//!
//! Periodic, budget-capped draining of spawner stores into slot-shaped
//! sinks. Each `(sink, spawner)` binding runs one cycle per scheduler
//! tick: verify the sink is still physically attached, try the aggregate
//! lock, and move up to `budget` item units — topping up compatible
//! partial stacks before opening empty slots. A contended lock skips the
//! cycle with no backlog; a detached sink cancels the binding for good.

use crate::spawner::Spawner;
use crate::traits::ViewerSink;
use crate::worker::WorkerPool;
use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::{Mutex, RwLock};
use spawnvault_core::{ItemKindRegistry, ItemStack};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default per-cycle unit budget for a binding.
pub const DEFAULT_TRANSFER_BUDGET: u64 = 64;

/// A slot-shaped destination for transferred items.
///
/// Implementations own their slot layout and stacking rules; the engine
/// only offers stacks and honors the accepted counts.
pub trait TransferSink: Send {
    /// Whether the physical setup behind this sink still exists. A false
    /// return permanently cancels the binding.
    fn is_attached(&self) -> bool;

    /// Number of slots.
    fn slots(&self) -> usize;

    /// Current content of a slot, `None` when empty or out of range.
    fn slot(&self, index: usize) -> Option<&ItemStack>;

    /// Offers a stack to a slot; returns how many units were accepted.
    /// Zero means the slot is incompatible or full.
    fn place(&mut self, index: usize, offer: &ItemStack) -> u64;
}

/// A fixed-size slot array with partial-stack merging.
///
/// The provided [`TransferSink`] used for container-backed sinks and for
/// interactive take-all, where the destination is a player-shaped grid.
pub struct SlotContainer {
    slots: Vec<Option<ItemStack>>,
    kinds: Arc<ItemKindRegistry>,
    attached: AtomicBool,
}

impl SlotContainer {
    /// Creates an empty container with `slots` slots.
    #[must_use]
    pub fn new(slots: usize, kinds: Arc<ItemKindRegistry>) -> Self {
        Self {
            slots: vec![None; slots],
            kinds,
            attached: AtomicBool::new(true),
        }
    }

    /// Simulates the physical setup breaking; subsequent cycles cancel.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    /// Non-empty stacks, in slot order.
    #[must_use]
    pub fn stacks(&self) -> Vec<ItemStack> {
        self.slots.iter().flatten().cloned().collect()
    }

    /// Total units held across all slots.
    #[must_use]
    pub fn total_units(&self) -> u64 {
        self.slots
            .iter()
            .flatten()
            .map(|stack| stack.amount)
            .sum()
    }
}

impl TransferSink for SlotContainer {
    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn slots(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, index: usize) -> Option<&ItemStack> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn place(&mut self, index: usize, offer: &ItemStack) -> u64 {
        let max_stack = u64::from(self.kinds.max_stack_of(&offer.signature));
        let Some(slot) = self.slots.get_mut(index) else {
            return 0;
        };
        match slot {
            Some(existing) if existing.signature == offer.signature => {
                let room = max_stack.saturating_sub(existing.amount);
                let accepted = offer.amount.min(room);
                existing.amount += accepted;
                accepted
            }
            Some(_) => 0,
            None => {
                let accepted = offer.amount.min(max_stack);
                if accepted > 0 {
                    *slot = Some(ItemStack::new(offer.signature.clone(), accepted));
                }
                accepted
            }
        }
    }
}

/// Places up to `budget` units of `view` into the sink, partial stacks
/// first, and returns what was placed per signature.
///
/// Shared by the transfer cycle and interactive take-all.
pub(crate) fn drain_into(
    sink: &mut dyn TransferSink,
    view: &[ItemStack],
    budget: u64,
) -> Vec<ItemStack> {
    let mut remaining_budget = budget;
    let mut placed: Vec<ItemStack> = Vec::new();

    for stack in view {
        if remaining_budget == 0 {
            break;
        }
        let mut outstanding = stack.amount.min(remaining_budget);
        let mut accepted_total = 0u64;

        // Pass 1: top up slots already holding this signature.
        for index in 0..sink.slots() {
            if outstanding == 0 {
                break;
            }
            let compatible = sink
                .slot(index)
                .is_some_and(|held| held.signature == stack.signature);
            if compatible {
                let accepted =
                    sink.place(index, &ItemStack::new(stack.signature.clone(), outstanding));
                outstanding -= accepted;
                accepted_total += accepted;
            }
        }
        // Pass 2: open empty slots.
        for index in 0..sink.slots() {
            if outstanding == 0 {
                break;
            }
            if sink.slot(index).is_none() {
                let accepted =
                    sink.place(index, &ItemStack::new(stack.signature.clone(), outstanding));
                outstanding -= accepted;
                accepted_total += accepted;
            }
        }

        if accepted_total > 0 {
            remaining_budget -= accepted_total;
            placed.push(ItemStack::new(stack.signature.clone(), accepted_total));
        }
    }

    placed
}

/// The result of one binding cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Units moved this cycle (possibly zero when the store was empty or
    /// the sink full).
    Moved(u64),
    /// The aggregate lock was contended; nothing happened, no backlog.
    Skipped,
    /// The sink is detached; the binding's schedule is terminated.
    Cancelled,
}

/// Binding identity, for logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(pub u64);

/// One live `(sink, spawner)` pairing.
pub struct TransferBinding {
    id: BindingId,
    spawner: Arc<Spawner>,
    sink: Mutex<Box<dyn TransferSink>>,
    budget: u64,
    cancelled: AtomicBool,
}

impl TransferBinding {
    /// Binding identity.
    #[must_use]
    pub const fn id(&self) -> BindingId {
        self.id
    }

    /// Whether the binding has self-cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// All live bindings plus the cycle driver.
pub struct TransferEngine {
    bindings: RwLock<Vec<Arc<TransferBinding>>>,
    next_id: AtomicU64,
    kinds: Arc<ItemKindRegistry>,
    viewers: Arc<dyn ViewerSink>,
    pool: Arc<WorkerPool>,
}

impl TransferEngine {
    /// Creates an engine with no bindings.
    #[must_use]
    pub fn new(
        kinds: Arc<ItemKindRegistry>,
        viewers: Arc<dyn ViewerSink>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            bindings: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            kinds,
            viewers,
            pool,
        }
    }

    /// Item-kind registry shared with the sinks this engine creates.
    #[must_use]
    pub fn kinds(&self) -> &Arc<ItemKindRegistry> {
        &self.kinds
    }

    /// Registers a binding; it participates in every cycle until it
    /// self-cancels or is unbound.
    pub fn bind(
        &self,
        spawner: Arc<Spawner>,
        sink: Box<dyn TransferSink>,
        budget: u64,
    ) -> Arc<TransferBinding> {
        let binding = Arc::new(TransferBinding {
            id: BindingId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            spawner,
            sink: Mutex::new(sink),
            budget,
            cancelled: AtomicBool::new(false),
        });
        self.bindings.write().push(Arc::clone(&binding));
        tracing::info!(binding = ?binding.id(), budget, "transfer binding registered");
        binding
    }

    /// Removes a binding explicitly (sink broken by the caller's world,
    /// not by the cycle check).
    pub fn unbind(&self, id: BindingId) {
        self.bindings.write().retain(|binding| binding.id != id);
    }

    /// Number of live bindings.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.read().len()
    }

    /// Runs one cycle for one binding.
    pub fn run_cycle(&self, binding: &TransferBinding) -> CycleOutcome {
        if binding.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        let mut sink = binding.sink.lock();
        if !sink.is_attached() {
            binding.cancelled.store(true, Ordering::SeqCst);
            tracing::warn!(
                binding = ?binding.id(),
                spawner = %binding.spawner.id(),
                "sink detached, transfer binding cancelled"
            );
            return CycleOutcome::Cancelled;
        }

        // Contended lock means another actor (sale, loot tick) is in the
        // store; this cycle is simply forfeited.
        let Some(mut guard) = binding.spawner.try_lock() else {
            return CycleOutcome::Skipped;
        };

        let view = guard.inventory.display_view(&self.kinds);
        let placed = drain_into(sink.as_mut(), &view, binding.budget);
        if placed.is_empty() {
            return CycleOutcome::Moved(0);
        }

        // The placement derives from the view under this same guard, so
        // removal is exact; the removed total is authoritative either way.
        let removed = guard.inventory.remove_items(&placed);
        let moved: u64 = removed.iter().map(|stack| stack.amount).sum();
        drop(guard);
        drop(sink);

        let viewers = Arc::clone(&self.viewers);
        let spawner_id = binding.spawner.id();
        self.pool.execute(move || viewers.refresh(spawner_id));
        tracing::debug!(binding = ?binding.id(), moved, "transfer cycle moved units");
        CycleOutcome::Moved(moved)
    }

    /// Runs one cycle for every live binding and drops the ones that
    /// cancelled.
    pub fn run_all(&self) {
        let bindings = { self.bindings.read().clone() };
        let mut any_cancelled = false;
        for binding in &bindings {
            if self.run_cycle(binding) == CycleOutcome::Cancelled {
                any_cancelled = true;
            }
        }
        if any_cancelled {
            self.bindings.write().retain(|b| !b.is_cancelled());
        }
    }
}

/// Interval thread driving [`TransferEngine::run_all`].
pub struct TransferScheduler {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl TransferScheduler {
    /// Starts the cycle thread with the given tick interval.
    #[must_use]
    pub fn start(engine: Arc<TransferEngine>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let ticker = tick(interval);
        let handle = std::thread::Builder::new()
            .name("transfer-cycle".into())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => engine.run_all(),
                    recv(stop_rx) -> _ => break,
                }
            })
            .ok();
        if handle.is_none() {
            tracing::warn!("transfer cycle thread failed to start");
        }
        Self { stop_tx, handle }
    }

    /// Stops the cycle thread and joins it.
    pub fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("transfer cycle thread panicked");
            }
        }
    }
}

impl Drop for TransferScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spawnvault_core::ItemSignature;

    fn kinds() -> Arc<ItemKindRegistry> {
        let mut registry = ItemKindRegistry::new();
        registry.register("bone", 64, Some(10), false);
        registry.register("arrow", 64, Some(10), false);
        Arc::new(registry)
    }

    #[test]
    fn partial_stacks_are_topped_up_before_empty_slots() {
        let kinds = kinds();
        let mut sink = SlotContainer::new(4, Arc::clone(&kinds));
        // Pre-seed a partial bone stack in slot 2.
        assert_eq!(sink.place(2, &ItemStack::new(ItemSignature::of(0), 60)), 60);

        let view = vec![ItemStack::new(ItemSignature::of(0), 10)];
        let placed = drain_into(&mut sink, &view, u64::MAX);

        assert_eq!(placed, vec![ItemStack::new(ItemSignature::of(0), 10)]);
        assert_eq!(
            sink.slot(2).map(|s| s.amount),
            Some(64),
            "partial stack filled first"
        );
        assert_eq!(sink.slot(0).map(|s| s.amount), Some(6), "overflow to empty");
    }

    #[test]
    fn budget_caps_units_per_drain() {
        let kinds = kinds();
        let mut sink = SlotContainer::new(8, Arc::clone(&kinds));
        let view = vec![
            ItemStack::new(ItemSignature::of(0), 4),
            ItemStack::new(ItemSignature::of(1), 4),
        ];

        let placed = drain_into(&mut sink, &view, 5);
        let total: u64 = placed.iter().map(|s| s.amount).sum();
        assert_eq!(total, 5, "budget is a hard cap");
        assert_eq!(sink.total_units(), 5);
    }

    #[test]
    fn full_sink_accepts_nothing() {
        let kinds = kinds();
        let mut sink = SlotContainer::new(1, Arc::clone(&kinds));
        assert_eq!(sink.place(0, &ItemStack::new(ItemSignature::of(0), 64)), 64);

        let view = vec![ItemStack::new(ItemSignature::of(1), 10)];
        let placed = drain_into(&mut sink, &view, u64::MAX);
        assert!(placed.is_empty());
    }

    #[test]
    fn incompatible_slot_is_skipped() {
        let kinds = kinds();
        let mut sink = SlotContainer::new(2, Arc::clone(&kinds));
        assert_eq!(sink.place(0, &ItemStack::new(ItemSignature::of(0), 1)), 1);

        let accepted = sink.place(0, &ItemStack::new(ItemSignature::of(1), 1));
        assert_eq!(accepted, 0, "different signature never merges");
    }
}
