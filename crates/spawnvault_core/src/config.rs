//! # Loot Configuration
//!
//! All balance data lives in external TOML files, loaded once at startup.
//! A reload produces a whole new [`LootTableSet`] which the engine swaps in
//! atomically; tables are never edited in place while a roll is running.
//!
//! ```toml
//! [[item]]
//! name = "bone"
//! max_stack = 64
//!
//! [entity.skeleton]
//! experience = 5
//!
//! [[entity.skeleton.loot]]
//! item = "bone"
//! amount = [0, 2]
//! chance = 100.0
//! ```
//!
//! Unknown item names inside loot entries are configuration gaps: they are
//! logged and skipped, never fatal. Structurally impossible values (a zero
//! max stack, an inverted range) reject the whole document.

use crate::error::{StoreError, StoreResult};
use crate::loot::{percent_to_bp, EntityLoot, LootEntry, LootTableSet};
use crate::signature::{ItemKindRegistry, SpecialEffect};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default, rename = "item")]
    items: Vec<RawItem>,
    #[serde(default)]
    entity: BTreeMap<String, RawEntity>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    name: String,
    #[serde(default = "default_max_stack")]
    max_stack: u32,
    category: Option<u32>,
    #[serde(default)]
    accepts_effect: bool,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    #[serde(default)]
    experience: u32,
    #[serde(default, rename = "loot")]
    loot: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    item: String,
    #[serde(default = "default_amount")]
    amount: [u32; 2],
    #[serde(default = "default_chance")]
    chance: f64,
    durability: Option<[u16; 2]>,
    effect: Option<RawEffect>,
}

#[derive(Debug, Deserialize)]
struct RawEffect {
    name: String,
    #[serde(default = "default_effect_duration")]
    duration_ticks: u32,
    #[serde(default)]
    amplifier: u8,
}

const fn default_max_stack() -> u32 {
    64
}

const fn default_amount() -> [u32; 2] {
    [1, 1]
}

const fn default_chance() -> f64 {
    100.0
}

const fn default_effect_duration() -> u32 {
    200
}

/// The fully loaded configuration: item kind registry plus loot tables.
#[derive(Clone, Debug, Default)]
pub struct LootConfig {
    /// Registry of all declared item kinds.
    pub registry: ItemKindRegistry,
    /// Loot tables keyed by entity kind name.
    pub tables: LootTableSet,
}

impl LootConfig {
    /// Parses a TOML document into a registry and table set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] for unparseable documents or
    /// structurally impossible values.
    pub fn from_toml_str(source: &str) -> StoreResult<Self> {
        let raw: RawConfig = toml::from_str(source)
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;

        let mut registry = ItemKindRegistry::new();
        for item in &raw.items {
            if item.max_stack == 0 {
                return Err(StoreError::InvalidConfig(format!(
                    "item '{}' has max_stack = 0",
                    item.name
                )));
            }
            registry.register(&item.name, item.max_stack, item.category, item.accepts_effect);
        }

        let mut tables = LootTableSet::new();
        for (entity_kind, entity) in &raw.entity {
            let mut entries = Vec::with_capacity(entity.loot.len());
            for raw_entry in &entity.loot {
                if let Some(entry) = build_entry(&registry, entity_kind, raw_entry)? {
                    entries.push(entry);
                }
            }
            tables.insert(
                entity_kind.clone(),
                EntityLoot {
                    experience_per_mob: entity.experience,
                    entries,
                },
            );
        }

        tracing::info!(
            item_kinds = registry.len(),
            entity_kinds = tables.len(),
            "loot configuration loaded"
        );
        Ok(Self { registry, tables })
    }

    /// Loads a TOML document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the file cannot be read or
    /// parsed.
    pub fn from_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        Self::from_toml_str(&source)
    }
}

fn build_entry(
    registry: &ItemKindRegistry,
    entity_kind: &str,
    raw: &RawEntry,
) -> StoreResult<Option<LootEntry>> {
    let Some(kind_id) = registry.by_name(&raw.item) else {
        tracing::warn!(
            entity_kind,
            item = raw.item.as_str(),
            "loot entry references undeclared item kind, skipping"
        );
        return Ok(None);
    };

    let [min_amount, max_amount] = raw.amount;
    if min_amount > max_amount {
        return Err(StoreError::InvalidConfig(format!(
            "{entity_kind}/{}: amount range {min_amount}-{max_amount} is inverted",
            raw.item
        )));
    }

    let durability = match raw.durability {
        Some([min, max]) if min > max => {
            return Err(StoreError::InvalidConfig(format!(
                "{entity_kind}/{}: durability range {min}-{max} is inverted",
                raw.item
            )));
        }
        Some([min, max]) => Some((min, max)),
        None => None,
    };

    let effect = match &raw.effect {
        Some(raw_effect) => {
            let accepts = registry.by_id(kind_id).is_some_and(|k| k.accepts_effect);
            if accepts {
                Some(SpecialEffect {
                    name: raw_effect.name.clone(),
                    duration_ticks: raw_effect.duration_ticks,
                    amplifier: raw_effect.amplifier,
                })
            } else {
                tracing::warn!(
                    entity_kind,
                    item = raw.item.as_str(),
                    "effect payload on a kind that does not accept effects, dropping payload"
                );
                None
            }
        }
        None => None,
    };

    Ok(Some(LootEntry {
        kind: kind_id,
        min_amount,
        max_amount,
        chance_bp: percent_to_bp(raw.chance),
        durability,
        effect,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[item]]
        name = "bone"
        max_stack = 64

        [[item]]
        name = "bow"
        max_stack = 1

        [[item]]
        name = "tipped_arrow"
        max_stack = 64
        accepts_effect = true

        [entity.skeleton]
        experience = 5

        [[entity.skeleton.loot]]
        item = "bone"
        amount = [0, 2]
        chance = 100.0

        [[entity.skeleton.loot]]
        item = "bow"
        chance = 8.5
        durability = [20, 50]

        [[entity.skeleton.loot]]
        item = "tipped_arrow"
        amount = [1, 4]
        chance = 25.0

        [entity.skeleton.loot.effect]
        name = "slowness"
        duration_ticks = 600
        amplifier = 1
    "#;

    #[test]
    fn sample_config_loads() {
        let config = LootConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.registry.len(), 3);
        let skeleton = config.tables.get("skeleton").unwrap();
        assert_eq!(skeleton.experience_per_mob, 5);
        assert_eq!(skeleton.entries.len(), 3);

        let bow = &skeleton.entries[1];
        assert_eq!(bow.chance_bp, 850);
        assert_eq!(bow.durability, Some((20, 50)));
        assert!(bow.is_equipment());

        let arrow = &skeleton.entries[2];
        let effect = arrow.effect.as_ref().unwrap();
        assert_eq!(effect.name, "slowness");
        assert_eq!(effect.duration_ticks, 600);
    }

    #[test]
    fn unknown_item_in_entry_is_skipped_not_fatal() {
        let source = r#"
            [[item]]
            name = "bone"

            [entity.skeleton]
            experience = 5

            [[entity.skeleton.loot]]
            item = "phantom_membrane"
        "#;

        let config = LootConfig::from_toml_str(source).unwrap();
        assert!(config.tables.get("skeleton").unwrap().entries.is_empty());
    }

    #[test]
    fn zero_max_stack_rejects_document() {
        let source = r#"
            [[item]]
            name = "broken"
            max_stack = 0
        "#;

        assert!(matches!(
            LootConfig::from_toml_str(source),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn inverted_amount_range_rejects_document() {
        let source = r#"
            [[item]]
            name = "bone"

            [entity.skeleton]
            [[entity.skeleton.loot]]
            item = "bone"
            amount = [5, 2]
        "#;

        assert!(matches!(
            LootConfig::from_toml_str(source),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn effect_on_plain_kind_drops_payload() {
        let source = r#"
            [[item]]
            name = "bone"

            [entity.skeleton]
            [[entity.skeleton.loot]]
            item = "bone"

            [entity.skeleton.loot.effect]
            name = "slowness"
        "#;

        let config = LootConfig::from_toml_str(source).unwrap();
        let entry = &config.tables.get("skeleton").unwrap().entries[0];
        assert!(entry.effect.is_none());
    }

    #[test]
    fn garbage_document_is_invalid_config() {
        assert!(matches!(
            LootConfig::from_toml_str("not [ valid ["),
            Err(StoreError::InvalidConfig(_))
        ));
    }
}
