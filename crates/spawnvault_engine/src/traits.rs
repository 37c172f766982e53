//! # Collaborator Contracts
//!
//! Narrow interfaces for everything the engine depends on but does not
//! implement: pricing, payment, sale logging, viewer refresh, activity
//! probing, and persistence. Each is resolved once at engine construction
//! (present or absent), never re-probed per call.

use crate::spawner::{BlockPos, Spawner, SpawnerId};
use spawnvault_core::ItemSignature;
use std::fmt;

/// Payment-provider-specific currency/ledger identifier.
pub type ChannelId = u32;

/// The default channel, used when a provider does not distinguish ledgers.
pub const DEFAULT_CHANNEL: ChannelId = 0;

/// A monetary amount in minor currency units (e.g. cents).
///
/// No floating point in money paths; tax is applied in integer basis
/// points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(u64);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates a price from minor units.
    #[inline]
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Raw minor units.
    #[inline]
    #[must_use]
    pub const fn minor(self) -> u64 {
        self.0
    }

    /// Returns true if the amount is zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Price of `units` items at this unit price, saturating at the top.
    #[inline]
    #[must_use]
    pub const fn saturating_mul_units(self, units: u64) -> Self {
        Self(self.0.saturating_mul(units))
    }

    /// Sum of two amounts, saturating at the top.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Net amount after deducting a tax given in basis points
    /// (10000 = 100%).
    #[must_use]
    pub fn net_after_tax_bp(self, tax_bp: u32) -> Self {
        let tax_bp = u128::from(tax_bp.min(10_000));
        let gross = u128::from(self.0);
        let net = gross - gross * tax_bp / 10_000;
        Self(net as u64)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// The identity on whose behalf a sale runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Initiator {
    /// Opaque identity; the pending-sale marker is keyed by this.
    pub id: u64,
    /// Display name for sale log records.
    pub name: String,
}

impl Initiator {
    /// Creates an initiator.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Resolves sell prices and payment channels for item signatures.
pub trait PricingProvider: Send + Sync {
    /// Unit sell price for a signature, or `None` if it cannot be sold.
    /// A zero price also means "not sellable".
    fn unit_price(&self, initiator: u64, signature: &ItemSignature) -> Option<Price>;

    /// The ledger a signature's proceeds are deposited into.
    fn channel_of(&self, signature: &ItemSignature) -> ChannelId {
        let _ = signature;
        DEFAULT_CHANNEL
    }
}

/// Deposits sale proceeds. Must not block indefinitely; the coordinator
/// bounds every deposit with its payment deadline.
pub trait PaymentProvider: Send + Sync {
    /// Deposits `amount` into `channel` for `initiator`. Returns success.
    fn deposit(&self, initiator: u64, channel: ChannelId, amount: Price) -> bool;
}

/// Fire-and-forget sale log. Invoked on the worker pool, never while an
/// aggregate lock is held.
pub trait SaleLogger: Send + Sync {
    /// Records one sold line item.
    fn log_sale(
        &self,
        initiator_name: &str,
        item_name: &str,
        amount: u64,
        price: Price,
        channel: ChannelId,
    );
}

/// Fan-out to whoever is currently observing an aggregate's store.
/// `refresh` may be called any number of times and must be idempotent from
/// the engine's perspective; no ordering is guaranteed.
pub trait ViewerSink: Send + Sync {
    /// Asks observers of `spawner` to re-read the store.
    fn refresh(&self, spawner: SpawnerId);
}

/// Receives the definitive outcome of a sale attempt that outlived the
/// caller's grace window.
pub trait SaleListener: Send + Sync {
    /// Exactly one completion per attempt that returned
    /// [`SellOutcome::InProgress`](crate::sale::SellOutcome::InProgress).
    fn sale_completed(&self, initiator: u64, spawner: SpawnerId, outcome: &crate::sale::SellOutcome);
}

/// Decides whether an aggregate is currently "active" (e.g. a player is
/// nearby). Spatial detection itself is out of scope.
pub trait ActivityProbe: Send + Sync {
    /// Returns true if the aggregate at `pos` should be generating loot.
    fn is_active(&self, pos: &BlockPos) -> bool;
}

/// Black-box durability for aggregates.
pub trait SpawnerStore: Send + Sync {
    /// Loads all persisted aggregates at startup.
    fn load_all(&self) -> Vec<Spawner>;

    /// Persists one aggregate. The engine calls this for every live
    /// aggregate at shutdown; eviction hands the aggregate back to the
    /// caller instead, which decides whether to persist it.
    fn save(&self, spawner: &Spawner);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_is_integer_basis_points() {
        let gross = Price::from_minor(10_000); // 100.00
        assert_eq!(gross.net_after_tax_bp(1_000), Price::from_minor(9_000)); // 10% tax
        assert_eq!(gross.net_after_tax_bp(0), gross);
        assert_eq!(gross.net_after_tax_bp(10_000), Price::ZERO);
        // Over-scale tax clamps instead of underflowing
        assert_eq!(gross.net_after_tax_bp(20_000), Price::ZERO);
    }

    #[test]
    fn price_multiplication_saturates() {
        let unit = Price::from_minor(u64::MAX / 2);
        assert_eq!(unit.saturating_mul_units(4), Price::from_minor(u64::MAX));
    }

    #[test]
    fn price_displays_minor_units_as_decimal() {
        assert_eq!(Price::from_minor(12_345).to_string(), "123.45");
        assert_eq!(Price::from_minor(5).to_string(), "0.05");
    }
}
