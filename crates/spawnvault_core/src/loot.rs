//! # Loot Roll Engine
//!
//! Stateless-per-call roll engine producing item stacks plus experience from
//! a per-entity-kind probability table.
//!
//! Drop chances use basis points (10000 = 100%), never floating point, so a
//! roll is a single integer comparison. The whole generation pass is
//! `O(mob_count × entries)`, bounded by configuration size, with no dynamic
//! recursion.

use crate::signature::{ItemKindId, ItemSignature, ItemStack, SpecialEffect};
use rand::Rng;
use std::collections::HashMap;

/// Basis-point scale: 10000 = 100%.
pub const BP_SCALE: u32 = 10_000;

/// Converts a configured percentage (0.0–100.0) to basis points.
#[inline]
#[must_use]
pub fn percent_to_bp(percent: f64) -> u32 {
    let clamped = percent.clamp(0.0, 100.0);
    // Config is the only float source; money and rolls stay integer.
    (clamped * 100.0).round() as u32
}

/// A single rollable entry in an entity's loot table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LootEntry {
    /// The item kind this entry produces.
    pub kind: ItemKindId,
    /// Minimum amount per successful roll.
    pub min_amount: u32,
    /// Maximum amount per successful roll.
    pub max_amount: u32,
    /// Drop chance in basis points (10000 = always).
    pub chance_bp: u32,
    /// Durability range for equipment entries; its presence is what makes
    /// an entry "equipment" for the equipment-allowed filter.
    pub durability: Option<(u16, u16)>,
    /// Special-effect payload, restricted to payload-capable kinds.
    pub effect: Option<SpecialEffect>,
}

impl LootEntry {
    /// Equipment entries are those with randomized durability.
    #[inline]
    #[must_use]
    pub const fn is_equipment(&self) -> bool {
        self.durability.is_some()
    }

    /// Rolls this entry once: chance check, amount draw, durability/payload
    /// materialization. Returns `None` on a failed chance roll or a zero
    /// amount draw.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<ItemStack> {
        if rng.gen_range(0..BP_SCALE) >= self.chance_bp {
            return None;
        }

        let amount = u64::from(rng.gen_range(self.min_amount..=self.max_amount));
        if amount == 0 {
            return None;
        }

        let signature = match (self.durability, &self.effect) {
            (Some((min, max)), _) => {
                ItemSignature::with_damage(self.kind, rng.gen_range(min..=max))
            }
            (None, Some(effect)) => ItemSignature::with_effect(self.kind, effect.clone()),
            (None, None) => ItemSignature::of(self.kind),
        };

        Some(ItemStack::new(signature, amount))
    }
}

/// Loot table for one entity kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityLoot {
    /// Base experience granted per mob.
    pub experience_per_mob: u32,
    /// Ordered list of rollable entries.
    pub entries: Vec<LootEntry>,
}

/// The complete table set, keyed by entity kind name.
///
/// Reload is a full-table swap through
/// [`LootGenerator::replace_tables`], never a partial in-place edit while a
/// roll is in progress.
#[derive(Clone, Debug, Default)]
pub struct LootTableSet {
    tables: HashMap<String, EntityLoot>,
}

impl LootTableSet {
    /// Creates an empty table set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) the table for an entity kind.
    pub fn insert(&mut self, entity_kind: impl Into<String>, loot: EntityLoot) {
        self.tables.insert(entity_kind.into(), loot);
    }

    /// Looks up the table for an entity kind.
    #[must_use]
    pub fn get(&self, entity_kind: &str) -> Option<&EntityLoot> {
        self.tables.get(entity_kind)
    }

    /// Number of configured entity kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no entity kinds are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Result of one generation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LootRoll {
    /// Generated stacks, in entry order per mob.
    pub stacks: Vec<ItemStack>,
    /// Total experience (per-mob experience × mob count).
    pub experience: u64,
}

impl LootRoll {
    /// Returns true if nothing was generated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty() && self.experience == 0
    }
}

/// The roll engine. Holds the current table set; callers supply the RNG so
/// tests can seed it.
#[derive(Clone, Debug, Default)]
pub struct LootGenerator {
    tables: LootTableSet,
}

impl LootGenerator {
    /// Creates a generator over a table set.
    #[must_use]
    pub fn new(tables: LootTableSet) -> Self {
        Self { tables }
    }

    /// Swaps in a freshly loaded table set (full-table swap on reload).
    pub fn replace_tables(&mut self, tables: LootTableSet) {
        tracing::info!(entity_kinds = tables.len(), "loot tables swapped");
        self.tables = tables;
    }

    /// Read access to the current tables.
    #[must_use]
    pub const fn tables(&self) -> &LootTableSet {
        &self.tables
    }

    /// Generates loot for `entity_kind`.
    ///
    /// Draws a mob count uniformly from `[min_count, max_count]`, then rolls
    /// every eligible entry independently per mob. Entries with a durability
    /// range are excluded when `equipment_allowed` is false.
    ///
    /// An unknown entity kind yields an empty roll and zero experience — a
    /// configuration gap, not an error.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        entity_kind: &str,
        min_count: u32,
        max_count: u32,
        equipment_allowed: bool,
    ) -> LootRoll {
        let Some(config) = self.tables.get(entity_kind) else {
            tracing::debug!(entity_kind, "no loot table for entity kind");
            return LootRoll::default();
        };

        let (lo, hi) = (min_count.min(max_count), max_count.max(min_count));
        let mob_count = rng.gen_range(lo..=hi);

        let eligible: Vec<&LootEntry> = config
            .entries
            .iter()
            .filter(|entry| equipment_allowed || !entry.is_equipment())
            .collect();

        let mut stacks = Vec::new();
        for _ in 0..mob_count {
            for entry in &eligible {
                if let Some(stack) = entry.roll(rng) {
                    stacks.push(stack);
                }
            }
        }

        LootRoll {
            stacks,
            experience: u64::from(config.experience_per_mob) * u64::from(mob_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn entry(kind: u32, min: u32, max: u32, chance_bp: u32) -> LootEntry {
        LootEntry {
            kind,
            min_amount: min,
            max_amount: max,
            chance_bp,
            durability: None,
            effect: None,
        }
    }

    fn generator_with(entity: &str, loot: EntityLoot) -> LootGenerator {
        let mut tables = LootTableSet::new();
        tables.insert(entity, loot);
        LootGenerator::new(tables)
    }

    #[test]
    fn guaranteed_single_roll_is_deterministic() {
        let gen = generator_with(
            "skeleton",
            EntityLoot {
                experience_per_mob: 5,
                entries: vec![entry(0, 3, 3, BP_SCALE)],
            },
        );

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let roll = gen.generate(&mut rng, "skeleton", 1, 1, true);

        assert_eq!(roll.stacks, vec![ItemStack::new(ItemSignature::of(0), 3)]);
        assert_eq!(roll.experience, 5);
    }

    #[test]
    fn same_seed_same_output() {
        let gen = generator_with(
            "zombie",
            EntityLoot {
                experience_per_mob: 3,
                entries: vec![entry(0, 0, 2, 5_000), entry(1, 1, 1, 2_500)],
            },
        );

        let a = gen.generate(&mut ChaCha8Rng::seed_from_u64(7), "zombie", 2, 6, true);
        let b = gen.generate(&mut ChaCha8Rng::seed_from_u64(7), "zombie", 2, 6, true);
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_entity_kind_yields_empty_roll() {
        let gen = LootGenerator::default();
        let roll = gen.generate(&mut ChaCha8Rng::seed_from_u64(1), "ghast", 1, 4, true);

        assert!(roll.is_empty(), "configuration gap degrades, never errors");
    }

    #[test]
    fn equipment_entries_are_filtered_when_disallowed() {
        let sword = LootEntry {
            kind: 1,
            min_amount: 1,
            max_amount: 1,
            chance_bp: BP_SCALE,
            durability: Some((10, 50)),
            effect: None,
        };
        let gen = generator_with(
            "skeleton",
            EntityLoot {
                experience_per_mob: 1,
                entries: vec![entry(0, 1, 1, BP_SCALE), sword],
            },
        );

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let roll = gen.generate(&mut rng, "skeleton", 1, 1, false);

        assert_eq!(roll.stacks.len(), 1);
        assert_eq!(roll.stacks[0].signature.kind, 0);
    }

    #[test]
    fn equipment_rolls_carry_damage_in_range() {
        let sword = LootEntry {
            kind: 1,
            min_amount: 1,
            max_amount: 1,
            chance_bp: BP_SCALE,
            durability: Some((10, 50)),
            effect: None,
        };
        let gen = generator_with(
            "skeleton",
            EntityLoot {
                experience_per_mob: 0,
                entries: vec![sword],
            },
        );

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            let roll = gen.generate(&mut rng, "skeleton", 1, 1, true);
            let damage = roll.stacks[0]
                .signature
                .damage
                .expect("equipment roll carries damage");
            assert!((10..=50).contains(&damage));
        }
    }

    #[test]
    fn experience_scales_with_mob_count() {
        let gen = generator_with(
            "blaze",
            EntityLoot {
                experience_per_mob: 10,
                entries: vec![],
            },
        );

        let roll = gen.generate(&mut ChaCha8Rng::seed_from_u64(0), "blaze", 4, 4, true);
        assert_eq!(roll.experience, 40);
    }

    #[test]
    fn drop_rate_tracks_configured_chance() {
        let gen = generator_with(
            "spider",
            EntityLoot {
                experience_per_mob: 0,
                entries: vec![entry(0, 1, 1, 2_500)], // 25%
            },
        );

        let mut rng = ChaCha8Rng::seed_from_u64(1234);
        let mut hits = 0u32;
        let iterations = 10_000;
        for _ in 0..iterations {
            if !gen.generate(&mut rng, "spider", 1, 1, true).stacks.is_empty() {
                hits += 1;
            }
        }

        let rate = f64::from(hits) / f64::from(iterations);
        assert!(
            (0.23..0.27).contains(&rate),
            "25% chance should land near 25%, got {rate:.3}"
        );
    }
}
