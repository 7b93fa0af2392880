//! # carlot-core: Pure Business Logic for the Carlot PoS
//!
//! This crate holds the rules of the point-of-sale core as pure functions with
//! zero I/O dependencies. The database crate (`carlot-db`) feeds it snapshots
//! read inside a transaction and persists what it decides.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Carlot Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │     Collaborators (PoS UI, rentals CRUD, dashboards, auth)      │   │
//! │  │   build SaleRequest ──► completeSale / cancelReceipt / reports  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ carlot-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌───────────────────┐ │   │
//! │  │   │  types   │ │  money   │ │  ledger  │ │ sale / analytics  │ │   │
//! │  │   │  Lot     │ │  Money   │ │  FIFO    │ │ SaleRequest       │ │   │
//! │  │   │  Receipt │ │  Margin  │ │  WAC     │ │ rollups           │ │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └───────────────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 carlot-db (Database Layer)                      │   │
//! │  │      SQLite transactions, migrations, repositories              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, InventoryLot, Shift, Receipt, SaleLine)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`ledger`] - FIFO allocation and weighted average cost
//! - [`sale`] - Sale request payload and receipt math
//! - [`analytics`] - Revenue/cost/margin rollups
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use carlot_core::ledger::{FifoQueue, LotSnapshot};
//! use chrono::{Duration, Utc};
//!
//! let day_1 = Utc::now() - Duration::days(2);
//! let day_2 = Utc::now() - Duration::days(1);
//!
//! let queue = FifoQueue::new(vec![
//!     LotSnapshot::new("lot-b", day_2, 5, Some(2000), "EUR"),
//!     LotSnapshot::new("lot-a", day_1, 5, Some(1000), "EUR"),
//! ]);
//!
//! let allocation = queue.allocate(7, "EUR");
//! assert!(allocation.is_fulfilled());
//! assert_eq!(allocation.consumptions[0].lot_id, "lot-a");
//! assert_eq!(allocation.consumptions[1].quantity, 2);
//!
//! // (5 × 10.00 + 2 × 20.00) / 7 = 12.857… → 12.86
//! assert_eq!(allocation.realized_unit_cost_cents(), Some(1286));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod analytics;
pub mod error;
pub mod ledger;
pub mod money;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Margin, Money};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single sale request.
///
/// ## Business Reason
/// Bounds the length of the sale transaction (one ledger deduction per line).
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Largest unit price or unit cost accepted, in cents (1,000,000,000.00).
///
/// ## Business Reason
/// Keeps every line total and receipt total inside `i64`:
/// 100 lines × 999 units × this cap is about 1e16.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

/// Currency used when the configuration does not name one.
pub const DEFAULT_CURRENCY: &str = "EUR";
