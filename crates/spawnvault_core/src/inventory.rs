//! # Virtual Inventory
//!
//! Unbounded-count aggregate store keyed by [`ItemSignature`], distinct from
//! a slot-based container. Loot accumulates here at high volume without
//! slot limits; the slot-shaped [display view](VirtualInventory::display_view)
//! is a pure projection for presentation, never a second source of truth.
//!
//! ## Locking discipline
//!
//! The store performs no locking. All mutation must happen while the owning
//! aggregate's lock is held; keeping the store a pure data structure is what
//! makes it testable without concurrency.

use crate::signature::{ItemKindRegistry, ItemSignature, ItemStack};
use std::collections::BTreeMap;

/// Mapping from signature to a non-negative unit count, with a unit capacity.
///
/// Invariants:
/// - stored quantities are strictly positive (zero entries are removed)
/// - `total_units` equals the sum of all stored quantities
/// - `total_units` never exceeds `capacity`
#[derive(Clone, Debug, Default)]
pub struct VirtualInventory {
    items: BTreeMap<ItemSignature, u64>,
    total_units: u64,
    capacity: u64,
}

impl VirtualInventory {
    /// Creates an effectively unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(u64::MAX)
    }

    /// Creates a store bounded to `capacity` total units.
    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            items: BTreeMap::new(),
            total_units: 0,
            capacity,
        }
    }

    /// Adds stacks to the store.
    ///
    /// Each stack's increment is atomic; all-or-nothing is not required
    /// across stacks. Insertion beyond capacity fails closed: the rejected
    /// remainder of each stack is returned instead of being silently
    /// dropped. An empty return means full success.
    pub fn add_items<I>(&mut self, stacks: I) -> Vec<ItemStack>
    where
        I: IntoIterator<Item = ItemStack>,
    {
        let mut rejected = Vec::new();

        for stack in stacks {
            if stack.is_empty() {
                continue;
            }
            let space = self.capacity - self.total_units;
            let accepted = stack.amount.min(space);

            if accepted > 0 {
                *self.items.entry(stack.signature.clone()).or_insert(0) += accepted;
                self.total_units += accepted;
            }
            if accepted < stack.amount {
                rejected.push(ItemStack::new(stack.signature, stack.amount - accepted));
            }
        }

        rejected
    }

    /// Removes stacks from the store.
    ///
    /// Each signature's quantity is decremented by
    /// `min(requested, available)`; the count never goes negative. Returns
    /// the actually-removed amounts; the caller decides whether a partial
    /// removal is acceptable by comparing against what it asked for.
    pub fn remove_items(&mut self, stacks: &[ItemStack]) -> Vec<ItemStack> {
        let mut removed = Vec::new();

        for stack in stacks {
            if stack.is_empty() {
                continue;
            }
            let Some(available) = self.items.get_mut(&stack.signature) else {
                continue;
            };
            let taken = stack.amount.min(*available);
            *available -= taken;
            if *available == 0 {
                self.items.remove(&stack.signature);
            }
            self.total_units -= taken;
            if taken > 0 {
                removed.push(ItemStack::new(stack.signature.clone(), taken));
            }
        }

        removed
    }

    /// Snapshot of the consolidated contents (a copy, not a live view).
    ///
    /// Callers must not assume atomicity of the snapshot relative to
    /// subsequent calls.
    #[must_use]
    pub fn consolidated(&self) -> BTreeMap<ItemSignature, u64> {
        self.items.clone()
    }

    /// Deterministic slot-shaped projection of the store.
    ///
    /// Signatures are ordered by display category (declaration order by
    /// default), each quantity split into successive slots of at most the
    /// kind's max stack size, filling slot indices in order. Presentation
    /// plumbing only.
    #[must_use]
    pub fn display_view(&self, registry: &ItemKindRegistry) -> Vec<ItemStack> {
        let mut signatures: Vec<(&ItemSignature, u64)> =
            self.items.iter().map(|(sig, &count)| (sig, count)).collect();
        signatures.sort_by(|(a, _), (b, _)| {
            registry
                .category_of(a)
                .cmp(&registry.category_of(b))
                .then_with(|| a.cmp(b))
        });

        let mut slots = Vec::new();
        for (signature, count) in signatures {
            let max_stack = u64::from(registry.max_stack_of(signature).max(1));
            let mut remaining = count;
            while remaining > 0 {
                let in_slot = remaining.min(max_stack);
                slots.push(ItemStack::new(signature.clone(), in_slot));
                remaining -= in_slot;
            }
        }
        slots
    }

    /// Current quantity stored under a signature.
    #[inline]
    #[must_use]
    pub fn amount_of(&self, signature: &ItemSignature) -> u64 {
        self.items.get(signature).copied().unwrap_or(0)
    }

    /// Total units across all signatures.
    #[inline]
    #[must_use]
    pub const fn total_units(&self) -> u64 {
        self.total_units
    }

    /// Number of distinct signatures stored.
    #[inline]
    #[must_use]
    pub fn distinct_signatures(&self) -> usize {
        self.items.len()
    }

    /// Configured unit capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Units that can still be inserted.
    #[inline]
    #[must_use]
    pub const fn remaining_capacity(&self) -> u64 {
        self.capacity - self.total_units
    }

    /// Returns true if nothing is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
