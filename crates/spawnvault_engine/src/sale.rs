//! # Sale Coordination
//!
//! Sell-everything over an aggregate's store: snapshot and price under the
//! aggregate lock, remove speculatively, deposit through the payment
//! channels with a hard deadline, and roll the removal back on any payment
//! failure. The initiating caller waits a short grace window; attempts
//! that outlast it report [`SellOutcome::InProgress`] and deliver the real
//! outcome through the [`SaleListener`] instead. Every attempt resolves to
//! exactly one outcome, delivered exactly once.

use crate::spawner::{Spawner, StateGuard};
use crate::traits::{
    ChannelId, Initiator, PaymentProvider, Price, PricingProvider, SaleListener, SaleLogger,
    ViewerSink,
};
use crate::worker::WorkerPool;
use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use spawnvault_core::{ItemKindRegistry, ItemStack};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tuning for the sale state machine.
#[derive(Clone, Debug)]
pub struct SaleConfig {
    /// How long the initiating caller waits before an attempt is reported
    /// as [`SellOutcome::InProgress`].
    pub grace_window: Duration,
    /// Hard deadline on the payment step. Expiry rolls the removal back;
    /// no attempt holds its aggregate lock longer than roughly this.
    pub payment_timeout: Duration,
    /// Whether a cut is taken from the gross total.
    pub tax_enabled: bool,
    /// The cut, in basis points of the gross (500 = 5%).
    pub tax_bp: u32,
}

impl Default for SaleConfig {
    fn default() -> Self {
        Self {
            grace_window: Duration::from_millis(100),
            payment_timeout: Duration::from_millis(5_000),
            tax_enabled: false,
            tax_bp: 0,
        }
    }
}

/// Terminal result of one sale attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SellOutcome {
    /// The attempt succeeded; units left the store and the net total was
    /// deposited.
    Sold {
        /// Units removed and paid for.
        total_amount: u64,
        /// Net total after tax, summed over all channels.
        net_price: Price,
    },
    /// The attempt outlived the caller's grace window and is still
    /// running; the terminal outcome arrives via [`SaleListener`].
    InProgress,
    /// Nothing in the store had a positive price. No state was mutated.
    NoSellableItems,
    /// The initiator already has an attempt pending.
    AlreadyInProgress,
    /// The aggregate lock was held by another actor.
    LockUnavailable,
    /// A payment channel rejected its deposit; the removal was rolled
    /// back.
    PaymentFailed,
    /// Payment missed the deadline; the removal was rolled back.
    PaymentTimeout,
}

impl SellOutcome {
    /// True only for [`SellOutcome::Sold`].
    #[must_use]
    pub const fn is_sold(&self) -> bool {
        matches!(self, Self::Sold { .. })
    }
}

/// One priced slice of the snapshot, kept for removal, payment grouping
/// and the sale log.
struct SaleLine {
    stack: ItemStack,
    gross: Price,
    channel: ChannelId,
}

/// Drives sale attempts across all aggregates.
///
/// Cheap to share; all interior state is the pending-initiator set.
pub struct SaleCoordinator {
    config: SaleConfig,
    pending: Mutex<HashSet<u64>>,
    kinds: Arc<ItemKindRegistry>,
    pricing: Arc<dyn PricingProvider>,
    payment: Option<Arc<dyn PaymentProvider>>,
    logger: Option<Arc<dyn SaleLogger>>,
    listener: Arc<dyn SaleListener>,
    viewers: Arc<dyn ViewerSink>,
    pool: Arc<WorkerPool>,
}

impl SaleCoordinator {
    /// Wires a coordinator to its collaborators.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: SaleConfig,
        kinds: Arc<ItemKindRegistry>,
        pricing: Arc<dyn PricingProvider>,
        payment: Option<Arc<dyn PaymentProvider>>,
        logger: Option<Arc<dyn SaleLogger>>,
        listener: Arc<dyn SaleListener>,
        viewers: Arc<dyn ViewerSink>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            config,
            pending: Mutex::new(HashSet::new()),
            kinds,
            pricing,
            payment,
            logger,
            listener,
            viewers,
            pool,
        }
    }

    /// Whether an initiator currently has an attempt pending.
    #[must_use]
    pub fn is_pending(&self, initiator: u64) -> bool {
        self.pending.lock().contains(&initiator)
    }

    /// Drops every pending marker. Shutdown-only: in-flight deposits that
    /// already committed stay committed, nothing is rolled back here.
    pub fn clear_pending(&self) {
        self.pending.lock().clear();
    }

    /// Sells everything sellable in the spawner's store.
    ///
    /// Returns within roughly the grace window: either the attempt's
    /// terminal outcome, or [`SellOutcome::InProgress`] with the terminal
    /// outcome routed to the [`SaleListener`]. One outcome per attempt,
    /// never both paths.
    pub fn sell_all(self: &Arc<Self>, initiator: &Initiator, spawner: &Arc<Spawner>) -> SellOutcome {
        // One attempt per initiator, engine-wide. Check-and-set under the
        // pending lock; cleared on every exit path of the pipeline.
        if !self.pending.lock().insert(initiator.id) {
            tracing::debug!(initiator = initiator.id, "sale already pending");
            return SellOutcome::AlreadyInProgress;
        }

        // The whole attempt runs under the aggregate lock. Acquisition is
        // non-blocking; contention is the caller's signal to retry.
        let Some(guard) = spawner.try_lock() else {
            self.pending.lock().remove(&initiator.id);
            return SellOutcome::LockUnavailable;
        };

        let (tx, rx) = bounded::<SellOutcome>(1);
        let handed_off = Arc::new(AtomicBool::new(false));

        let pipeline = Arc::clone(self);
        let pipeline_spawner = Arc::clone(spawner);
        let pipeline_initiator = initiator.clone();
        let pipeline_flag = Arc::clone(&handed_off);
        let submitted = self.pool.execute(move || {
            let outcome = pipeline.run_pipeline(&pipeline_initiator, &pipeline_spawner, guard);
            pipeline.pending.lock().remove(&pipeline_initiator.id);
            // Exactly-once delivery: whichever side flips the flag first
            // owns the synchronous path; the loser takes the async one.
            if pipeline_flag.swap(true, Ordering::AcqRel) {
                pipeline.listener.sale_completed(
                    pipeline_initiator.id,
                    pipeline_spawner.id(),
                    &outcome,
                );
            } else {
                let _ = tx.send(outcome);
            }
        });
        if !submitted {
            // Pool is shutting down; the closure never ran, so the guard
            // was dropped with its captures and the pending entry is ours
            // to clear.
            self.pending.lock().remove(&initiator.id);
            return SellOutcome::LockUnavailable;
        }

        match rx.recv_timeout(self.config.grace_window) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                if handed_off.swap(true, Ordering::AcqRel) {
                    // The pipeline claimed the synchronous path between our
                    // timeout and the flag flip; its send is imminent.
                    rx.recv().unwrap_or(SellOutcome::InProgress)
                } else {
                    SellOutcome::InProgress
                }
            }
            Err(RecvTimeoutError::Disconnected) => SellOutcome::InProgress,
        }
    }

    /// The attempt body. Runs on a worker thread, holding the aggregate
    /// lock for its entire duration.
    fn run_pipeline(
        &self,
        initiator: &Initiator,
        spawner: &Arc<Spawner>,
        mut guard: StateGuard,
    ) -> SellOutcome {
        let lines = self.price_snapshot(initiator.id, &guard);
        if lines.is_empty() {
            return SellOutcome::NoSellableItems;
        }

        let total_amount: u64 = lines.iter().map(|line| line.stack.amount).sum();
        let mut per_channel: HashMap<ChannelId, Price> = HashMap::new();
        for line in &lines {
            let slot = per_channel.entry(line.channel).or_insert(Price::ZERO);
            *slot = slot.saturating_add(line.gross);
        }

        // Speculative removal before payment. The snapshot was taken under
        // this same guard, so removal is exact by construction.
        let requests: Vec<ItemStack> = lines.iter().map(|line| line.stack.clone()).collect();
        let removed = guard.inventory.remove_items(&requests);
        debug_assert_eq!(
            removed.iter().map(|s| s.amount).sum::<u64>(),
            total_amount,
            "snapshot and removal ran under one guard"
        );
        self.viewers.refresh(spawner.id());

        let net_price = match self.settle(initiator.id, &per_channel) {
            Ok(net) => net,
            Err(failure) => {
                // Exact rollback: re-insert precisely what was removed.
                // The space was just vacated, so this cannot overflow.
                let rejected = guard.inventory.add_items(removed);
                if !rejected.is_empty() {
                    tracing::error!(
                        initiator = initiator.id,
                        spawner = %spawner.id(),
                        "rollback rejected by capacity bound"
                    );
                }
                self.viewers.refresh(spawner.id());
                tracing::warn!(
                    initiator = initiator.id,
                    spawner = %spawner.id(),
                    outcome = ?failure,
                    "sale rolled back"
                );
                return failure;
            }
        };

        // Payment is settled; release the aggregate before the slow tail.
        drop(guard);
        self.viewers.refresh(spawner.id());
        self.log_lines(initiator, &lines);
        tracing::info!(
            initiator = initiator.id,
            spawner = %spawner.id(),
            total_amount,
            net = %net_price,
            "sale completed"
        );
        SellOutcome::Sold {
            total_amount,
            net_price,
        }
    }

    /// Prices the consolidated snapshot; unpriced signatures are skipped.
    fn price_snapshot(&self, initiator: u64, guard: &StateGuard) -> Vec<SaleLine> {
        guard
            .inventory
            .consolidated()
            .into_iter()
            .filter_map(|(signature, amount)| {
                let unit = self.pricing.unit_price(initiator, &signature)?;
                if unit.is_zero() {
                    return None;
                }
                let gross = unit.saturating_mul_units(amount);
                let channel = self.pricing.channel_of(&signature);
                Some(SaleLine {
                    stack: ItemStack::new(signature, amount),
                    gross,
                    channel,
                })
            })
            .collect()
    }

    /// Deposits the net totals, one channel at a time, under the payment
    /// deadline. Returns the summed net on success.
    fn settle(
        &self,
        initiator: u64,
        per_channel: &HashMap<ChannelId, Price>,
    ) -> Result<Price, SellOutcome> {
        let mut net_total = Price::ZERO;
        let deposits: Vec<(ChannelId, Price)> = per_channel
            .iter()
            .map(|(&channel, &gross)| {
                let net = if self.config.tax_enabled {
                    gross.net_after_tax_bp(self.config.tax_bp)
                } else {
                    gross
                };
                (channel, net)
            })
            .collect();
        for &(_, net) in &deposits {
            net_total = net_total.saturating_add(net);
        }

        let Some(payment) = self.payment.as_ref() else {
            // No payment backend wired; the sale is an inventory drain.
            return Ok(net_total);
        };

        // The payment call is out of our control; run it on a thread of
        // its own and bound the wait. The worker pool is not an option
        // here: pipelines run there too, and a pool saturated with
        // pipelines would starve the very deposits those pipelines are
        // waiting on. A timed-out deposit may still land later, but
        // rolling back is the safe direction for the store.
        let (tx, rx) = bounded::<bool>(1);
        let payment = Arc::clone(payment);
        let spawned = std::thread::Builder::new()
            .name("payment-deposit".into())
            .spawn(move || {
                let ok = deposits
                    .iter()
                    .all(|&(channel, net)| payment.deposit(initiator, channel, net));
                let _ = tx.send(ok);
            })
            .is_ok();
        if !spawned {
            return Err(SellOutcome::PaymentFailed);
        }

        match rx.recv_timeout(self.config.payment_timeout) {
            Ok(true) => Ok(net_total),
            Ok(false) => Err(SellOutcome::PaymentFailed),
            Err(_) => {
                tracing::warn!(initiator, timeout = ?self.config.payment_timeout, "payment deadline expired");
                Err(SellOutcome::PaymentTimeout)
            }
        }
    }

    /// Hands the per-line records to the sale logger on a pool thread;
    /// logging never extends the attempt.
    fn log_lines(&self, initiator: &Initiator, lines: &[SaleLine]) {
        let Some(logger) = self.logger.as_ref() else {
            return;
        };
        let logger = Arc::clone(logger);
        let initiator_name = initiator.name.clone();
        let records: Vec<(String, u64, Price, ChannelId)> = lines
            .iter()
            .map(|line| {
                let name = self.kinds.name_of(line.stack.signature.kind).to_owned();
                (name, line.stack.amount, line.gross, line.channel)
            })
            .collect();
        self.pool.execute(move || {
            for (name, amount, gross, channel) in records {
                logger.log_sale(&initiator_name, &name, amount, gross, channel);
            }
        });
    }
}
