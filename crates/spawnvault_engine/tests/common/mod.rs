//! Shared test doubles for the engine integration tests.

// Each test binary compiles this module separately and uses a subset.
#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use spawnvault_core::{
    EntityLoot, ItemKindId, ItemKindRegistry, ItemSignature, LootEntry, LootGenerator,
    LootTableSet,
};
use spawnvault_engine::{
    ActivityProbe, BlockPos, ChannelId, PaymentProvider, Price, PricingProvider, SaleListener,
    SaleLogger, SellOutcome, Spawner, SpawnerId, SpawnerStore, ViewerSink,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Flat per-kind pricing.
pub struct FixedPricing {
    prices: HashMap<ItemKindId, Price>,
}

impl FixedPricing {
    pub fn new(prices: impl IntoIterator<Item = (ItemKindId, u64)>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .map(|(kind, minor)| (kind, Price::from_minor(minor)))
                .collect(),
        }
    }
}

impl PricingProvider for FixedPricing {
    fn unit_price(&self, _initiator: u64, signature: &ItemSignature) -> Option<Price> {
        self.prices.get(&signature.kind).copied()
    }
}

/// How the payment double behaves.
#[derive(Clone, Copy)]
pub enum PaymentMode {
    Accept,
    Refuse,
    Stall(Duration),
}

/// Records deposits and applies a configured behavior.
pub struct ScriptedPayment {
    mode: PaymentMode,
    pub deposits: Mutex<Vec<(u64, ChannelId, u64)>>,
}

impl ScriptedPayment {
    pub fn new(mode: PaymentMode) -> Self {
        Self {
            mode,
            deposits: Mutex::new(Vec::new()),
        }
    }

    pub fn deposited_total(&self) -> u64 {
        self.deposits.lock().iter().map(|&(_, _, m)| m).sum()
    }
}

impl PaymentProvider for ScriptedPayment {
    fn deposit(&self, initiator: u64, channel: ChannelId, amount: Price) -> bool {
        match self.mode {
            PaymentMode::Accept => {
                self.deposits
                    .lock()
                    .push((initiator, channel, amount.minor()));
                true
            }
            PaymentMode::Refuse => false,
            PaymentMode::Stall(delay) => {
                std::thread::sleep(delay);
                self.deposits
                    .lock()
                    .push((initiator, channel, amount.minor()));
                true
            }
        }
    }
}

/// Forwards listener callbacks onto a channel the test can wait on.
pub struct ChannelListener {
    tx: Sender<(u64, SpawnerId, SellOutcome)>,
}

impl ChannelListener {
    pub fn new() -> (Self, Receiver<(u64, SpawnerId, SellOutcome)>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl SaleListener for ChannelListener {
    fn sale_completed(&self, initiator: u64, spawner: SpawnerId, outcome: &SellOutcome) {
        let _ = self.tx.send((initiator, spawner, outcome.clone()));
    }
}

/// Counts viewer refresh fan-outs.
#[derive(Default)]
pub struct CountingViewers {
    pub refreshes: AtomicUsize,
}

impl ViewerSink for CountingViewers {
    fn refresh(&self, _spawner: SpawnerId) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Probe with a switchable answer.
pub struct SwitchProbe {
    active: AtomicBool,
}

impl SwitchProbe {
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
        }
    }

    pub fn set(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl ActivityProbe for SwitchProbe {
    fn is_active(&self, _pos: &BlockPos) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Records sale log lines.
#[derive(Default)]
pub struct RecordingLogger {
    pub lines: Mutex<Vec<(String, String, u64, u64)>>,
}

impl SaleLogger for RecordingLogger {
    fn log_sale(
        &self,
        initiator_name: &str,
        item_name: &str,
        amount: u64,
        price: Price,
        _channel: ChannelId,
    ) {
        self.lines.lock().push((
            initiator_name.to_owned(),
            item_name.to_owned(),
            amount,
            price.minor(),
        ));
    }
}

/// Persistence double: loads nothing, records saves.
#[derive(Default)]
pub struct MemoryStore {
    pub saved: Mutex<Vec<SpawnerId>>,
}

impl SpawnerStore for MemoryStore {
    fn load_all(&self) -> Vec<Spawner> {
        Vec::new()
    }

    fn save(&self, spawner: &Spawner) {
        self.saved.lock().push(spawner.id());
    }
}

/// Registry with `bone` (id 0), `arrow` (id 1), `rare_drop` (id 2).
pub fn test_kinds() -> ItemKindRegistry {
    let mut registry = ItemKindRegistry::new();
    registry.register("bone", 64, Some(10), false);
    registry.register("arrow", 64, Some(10), false);
    registry.register("rare_drop", 16, Some(20), false);
    registry
}

/// One guaranteed bone per mob, 5 experience per mob.
pub fn certain_bone_tables() -> LootTableSet {
    let mut tables = LootTableSet::new();
    tables.insert(
        "skeleton",
        EntityLoot {
            experience_per_mob: 5,
            entries: vec![LootEntry {
                kind: 0,
                min_amount: 1,
                max_amount: 1,
                chance_bp: 10_000,
                durability: None,
                effect: None,
            }],
        },
    );
    tables
}

pub fn test_generator() -> LootGenerator {
    LootGenerator::new(certain_bone_tables())
}
