//! # Ledger Module
//!
//! FIFO lot allocation and weighted average cost, independent of storage.
//!
//! ## How a Deduction Is Planned
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    FIFO Allocation (sell 7)                             │
//! │                                                                         │
//! │  FifoQueue (oldest first)                                              │
//! │  ┌──────────────────────┐  ┌──────────────────────┐                    │
//! │  │ Lot A  day 1         │  │ Lot B  day 2         │                    │
//! │  │ qty 5  cost 10.00    │  │ qty 5  cost 20.00    │                    │
//! │  └──────────┬───────────┘  └──────────┬───────────┘                    │
//! │             │ take min(7, 5) = 5      │ take min(2, 5) = 2             │
//! │             ▼                         ▼                                 │
//! │  consumptions: [(A, 5, 10.00), (B, 2, 20.00)]   shortfall: 0           │
//! │                                                                         │
//! │  realized cost = (5 × 10.00 + 2 × 20.00) / 7 = 12.86                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The queue only plans. `carlot-db` reads the snapshots inside the sale
//! transaction, applies the plan with guarded updates and rolls back if the
//! plan is short.
//!
//! Pure FIFO is an accounting policy: the oldest stock goes first regardless
//! of what it cost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{div_round_half_away, Money};
use crate::types::InventoryLot;

// =============================================================================
// Lot Snapshot
// =============================================================================

/// The part of a lot the allocator needs, read at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotSnapshot {
    pub lot_id: String,
    pub received_at: DateTime<Utc>,
    pub quantity: i64,
    pub unit_cost_cents: Option<i64>,
    pub currency: String,
}

impl LotSnapshot {
    pub fn new(
        lot_id: impl Into<String>,
        received_at: DateTime<Utc>,
        quantity: i64,
        unit_cost_cents: Option<i64>,
        currency: impl Into<String>,
    ) -> Self {
        LotSnapshot {
            lot_id: lot_id.into(),
            received_at,
            quantity,
            unit_cost_cents,
            currency: currency.into(),
        }
    }
}

impl From<&InventoryLot> for LotSnapshot {
    fn from(lot: &InventoryLot) -> Self {
        LotSnapshot {
            lot_id: lot.id.clone(),
            received_at: lot.received_at,
            quantity: lot.quantity,
            unit_cost_cents: lot.unit_cost_cents,
            currency: lot.currency.clone(),
        }
    }
}

// =============================================================================
// Allocation Result
// =============================================================================

/// Quantity taken from one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LotTake {
    pub lot_id: String,
    pub quantity: i64,
    /// The lot's unit cost, recorded for audit.
    pub unit_cost_cents: Option<i64>,
    /// Whether this take enters the weighted average (cost known and in the
    /// sale currency).
    pub costed: bool,
}

/// Outcome of planning a deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FifoAllocation {
    pub requested: i64,
    pub consumptions: Vec<LotTake>,
    /// Units the lots could not cover. Zero when fulfilled.
    pub shortfall: i64,
}

impl FifoAllocation {
    /// True when the lots covered the whole request.
    #[inline]
    pub fn is_fulfilled(&self) -> bool {
        self.shortfall == 0
    }

    /// Units actually taken.
    pub fn taken(&self) -> i64 {
        self.consumptions.iter().map(|c| c.quantity).sum()
    }

    /// Weighted average unit cost over the costed takes.
    ///
    /// ```text
    /// Σ(qty × cost) / Σ(qty)   over takes with a known cost
    /// None                     when no take has a known cost
    /// ```
    pub fn realized_unit_cost(&self) -> Option<Money> {
        // i128 sums; the average never exceeds the dearest lot, so it fits i64
        let (qty, total) = self
            .consumptions
            .iter()
            .filter(|c| c.costed)
            .fold((0i128, 0i128), |(qty, total), c| {
                let cost = c.unit_cost_cents.unwrap_or(0) as i128;
                (qty + c.quantity as i128, total + cost * c.quantity as i128)
            });
        if qty <= 0 {
            return None;
        }
        Some(Money::from_cents(div_round_half_away(total, qty)))
    }

    /// Same as [`realized_unit_cost`](Self::realized_unit_cost) in cents.
    pub fn realized_unit_cost_cents(&self) -> Option<i64> {
        self.realized_unit_cost().map(|m| m.cents())
    }
}

// =============================================================================
// FIFO Queue
// =============================================================================

/// Lots of one product with stock left, oldest first.
///
/// Lots received at the same instant keep the order they were given in.
#[derive(Debug, Clone, Default)]
pub struct FifoQueue {
    lots: Vec<LotSnapshot>,
}

impl FifoQueue {
    /// Builds the queue, dropping exhausted lots.
    pub fn new(lots: impl IntoIterator<Item = LotSnapshot>) -> Self {
        let mut lots: Vec<LotSnapshot> = lots.into_iter().filter(|l| l.quantity > 0).collect();
        lots.sort_by_key(|l| l.received_at);
        FifoQueue { lots }
    }

    /// Total quantity across all lots in the queue.
    pub fn available(&self) -> i64 {
        self.lots.iter().map(|l| l.quantity).sum()
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Lots in consumption order.
    pub fn iter(&self) -> impl Iterator<Item = &LotSnapshot> {
        self.lots.iter()
    }

    /// Plans taking `quantity` units, oldest lot first.
    ///
    /// Walks the queue taking `min(remaining, lot.quantity)` from each lot
    /// until satisfied or out of lots. The queue itself is not modified.
    pub fn allocate(&self, quantity: i64, sale_currency: &str) -> FifoAllocation {
        let mut remaining = quantity.max(0);
        let mut consumptions = Vec::new();

        for lot in &self.lots {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(lot.quantity);
            remaining -= take;
            consumptions.push(LotTake {
                lot_id: lot.lot_id.clone(),
                quantity: take,
                unit_cost_cents: lot.unit_cost_cents,
                costed: lot.unit_cost_cents.is_some() && lot.currency == sale_currency,
            });
        }

        FifoAllocation {
            requested: quantity,
            consumptions,
            shortfall: remaining,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
