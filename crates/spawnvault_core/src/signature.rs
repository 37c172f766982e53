//! # Item Signatures
//!
//! Canonical identity for a stackable item kind.
//!
//! Two stacks with equal [`ItemSignature`] are fungible and must be summed,
//! never compared by stack instance. The signature captures everything that
//! affects stacking: the kind itself, a damage value for equipment, and an
//! encoded special-effect payload for the one kind family that carries one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for an item kind.
pub type ItemKindId = u32;

/// Fallback stack size for kinds missing from the registry.
pub const DEFAULT_MAX_STACK: u32 = 64;

/// Encoded special-effect payload (e.g. an enduring effect on a projectile).
///
/// Part of the fungibility key: two stacks with different payloads never
/// merge.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpecialEffect {
    /// Effect name as declared in configuration.
    pub name: String,
    /// Effect duration in ticks.
    pub duration_ticks: u32,
    /// Effect amplifier (0 = level I).
    pub amplifier: u8,
}

/// Canonical fungibility key for an item stack.
///
/// Ordering is stable: kind id first (assigned in configuration declaration
/// order), then damage, then effect payload. The display view relies on
/// this order being deterministic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemSignature {
    /// The item kind.
    pub kind: ItemKindId,
    /// Damage value, present only for equipment with randomized durability.
    pub damage: Option<u16>,
    /// Special-effect payload, present only for payload-capable kinds.
    pub effect: Option<SpecialEffect>,
}

impl ItemSignature {
    /// Creates a plain signature for a kind with no damage or payload.
    #[inline]
    #[must_use]
    pub const fn of(kind: ItemKindId) -> Self {
        Self {
            kind,
            damage: None,
            effect: None,
        }
    }

    /// Creates an equipment signature with a rolled damage value.
    #[inline]
    #[must_use]
    pub const fn with_damage(kind: ItemKindId, damage: u16) -> Self {
        Self {
            kind,
            damage: Some(damage),
            effect: None,
        }
    }

    /// Creates a signature carrying a special-effect payload.
    #[inline]
    #[must_use]
    pub fn with_effect(kind: ItemKindId, effect: SpecialEffect) -> Self {
        Self {
            kind,
            damage: None,
            effect: Some(effect),
        }
    }
}

/// A stack of fungible items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemStack {
    /// Fungibility key.
    pub signature: ItemSignature,
    /// Number of units in this stack.
    pub amount: u64,
}

impl ItemStack {
    /// Creates a new stack.
    #[inline]
    #[must_use]
    pub const fn new(signature: ItemSignature, amount: u64) -> Self {
        Self { signature, amount }
    }

    /// Returns true if the stack holds no units.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.amount == 0
    }
}

/// An item kind definition from the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemKind {
    /// Unique identifier (declaration order).
    pub id: ItemKindId,
    /// Configured name.
    pub name: String,
    /// Maximum stack size when projected into slots.
    pub max_stack: u32,
    /// Display category for ordering (defaults to declaration order).
    pub category: u32,
    /// Whether this kind may carry a special-effect payload.
    pub accepts_effect: bool,
}

/// Registry of all known item kinds, built once from configuration.
#[derive(Clone, Debug, Default)]
pub struct ItemKindRegistry {
    kinds: Vec<ItemKind>,
    by_name: HashMap<String, ItemKindId>,
}

impl ItemKindRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a kind, assigning the next id in declaration order.
    ///
    /// Returns the assigned id. Re-registering a name replaces nothing; the
    /// first declaration wins and the existing id is returned.
    pub fn register(&mut self, name: &str, max_stack: u32, category: Option<u32>, accepts_effect: bool) -> ItemKindId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.kinds.len() as ItemKindId;
        self.kinds.push(ItemKind {
            id,
            name: name.to_owned(),
            max_stack,
            category: category.unwrap_or(id),
            accepts_effect,
        });
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Looks up a kind by id.
    #[inline]
    #[must_use]
    pub fn by_id(&self, id: ItemKindId) -> Option<&ItemKind> {
        self.kinds.get(id as usize)
    }

    /// Looks up a kind id by configured name.
    #[inline]
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<ItemKindId> {
        self.by_name.get(name).copied()
    }

    /// Maximum stack size for the kind behind a signature.
    #[inline]
    #[must_use]
    pub fn max_stack_of(&self, signature: &ItemSignature) -> u32 {
        self.by_id(signature.kind)
            .map_or(DEFAULT_MAX_STACK, |k| k.max_stack)
    }

    /// Display category for the kind behind a signature.
    #[inline]
    #[must_use]
    pub fn category_of(&self, signature: &ItemSignature) -> u32 {
        self.by_id(signature.kind)
            .map_or(signature.kind, |k| k.category)
    }

    /// Human-readable name of a kind, for logging and sale records.
    #[must_use]
    pub fn name_of(&self, id: ItemKindId) -> &str {
        self.by_id(id).map_or("<unknown>", |k| k.name.as_str())
    }

    /// Number of registered kinds.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns true if no kinds are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_signatures_are_fungible_keys() {
        let a = ItemSignature::with_damage(3, 17);
        let b = ItemSignature::with_damage(3, 17);
        assert_eq!(a, b);

        let c = ItemSignature::with_damage(3, 18);
        assert_ne!(a, c);
    }

    #[test]
    fn signature_order_is_kind_first() {
        let plain = ItemSignature::of(1);
        let damaged = ItemSignature::with_damage(1, 5);
        let later_kind = ItemSignature::of(2);

        assert!(plain < damaged, "damage-less sorts before damaged");
        assert!(damaged < later_kind, "kind id dominates the order");
    }

    #[test]
    fn registry_assigns_declaration_order_ids() {
        let mut reg = ItemKindRegistry::new();
        let bone = reg.register("bone", 64, None, false);
        let sword = reg.register("iron_sword", 1, None, false);

        assert_eq!(bone, 0);
        assert_eq!(sword, 1);
        assert_eq!(reg.by_name("bone"), Some(bone));
        assert_eq!(reg.max_stack_of(&ItemSignature::of(sword)), 1);

        // First declaration wins
        assert_eq!(reg.register("bone", 16, None, false), bone);
        assert_eq!(reg.max_stack_of(&ItemSignature::of(bone)), 64);
    }

    #[test]
    fn unknown_kind_falls_back_to_default_stack() {
        let reg = ItemKindRegistry::new();
        assert_eq!(reg.max_stack_of(&ItemSignature::of(99)), DEFAULT_MAX_STACK);
        assert_eq!(reg.name_of(99), "<unknown>");
    }
}
