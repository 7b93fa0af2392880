//! # Domain Types
//!
//! Core domain types used throughout Carlot.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Category ──► Subcategory ──► Product ──► InventoryLot (FIFO by date)   │
//! │                                  ▲                 ▲                    │
//! │                                  │                 │ LotConsumption     │
//! │  Shift ──► Receipt ──► SaleLine ─┘─────────────────┘ (audit record)     │
//! │   (one open      (cancel flag)   (immutable,                            │
//! │    per operator)                  realized cost)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! - Lots belong to the inventory ledger.
//! - Sale lines belong to their receipt; receipts belong to their shift.
//! - Nothing here is mutated outside the sale engine's transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

/// Generates a new entity id (UUID v4, hyphenated).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// Catalog (collaborator-owned, read-only for the core)
// =============================================================================

/// Top-level product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// A subcategory, belonging to exactly one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Subcategory {
    pub id: String,
    pub category_id: String,
    pub name: String,
}

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Subcategory this product belongs to.
    pub subcategory_id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown to the operator and on receipts.
    pub name: String,

    /// On-hand quantity below which the product is reported as low stock.
    pub min_stock: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for adding a product to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub subcategory_id: String,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub min_stock: i64,
}

// =============================================================================
// Inventory Lots
// =============================================================================

/// Where a lot of stock came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LotSource {
    /// Bought from a supplier as part of a procurement batch.
    Procurement,
    /// Recovered from a dismantled car. May carry no purchase cost.
    Salvage,
}

impl std::fmt::Display for LotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LotSource::Procurement => write!(f, "procurement"),
            LotSource::Salvage => write!(f, "salvage"),
        }
    }
}

/// A batch of stock for one product with its own cost and receipt date.
///
/// ## Invariants
/// - `quantity >= 0` always (enforced by a CHECK constraint as well)
/// - A lot with `quantity == 0` is exhausted but kept for cost history
/// - `quantity` only decreases through sales and only increases through
///   receipt cancellation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryLot {
    pub id: String,
    pub product_id: String,
    pub source: LotSource,
    /// Procurement batch number or dismantled car id.
    pub source_ref: Option<String>,
    /// Quantity remaining.
    pub quantity: i64,
    /// Purchase cost per unit; `None` when unknown (typical for salvage).
    pub unit_cost_cents: Option<i64>,
    /// Suggested sale price per unit (hint for the operator).
    pub sale_price_cents: Option<i64>,
    /// Currency of the cost and price hint.
    pub currency: String,
    /// FIFO order key.
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
    /// Storage location (shelf, bin, yard slot).
    pub location: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl InventoryLot {
    /// Whether the lot has nothing left to sell.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.quantity == 0
    }

    /// Returns the unit cost as Money, if known.
    #[inline]
    pub fn unit_cost(&self) -> Option<Money> {
        self.unit_cost_cents.map(Money::from_cents)
    }
}

/// Input for receiving a new lot (procurement or car dismantling).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLot {
    pub product_id: String,
    pub source: LotSource,
    pub source_ref: Option<String>,
    pub quantity: i64,
    pub unit_cost_cents: Option<i64>,
    pub sale_price_cents: Option<i64>,
    pub currency: String,
    /// Defaults to the time of receiving.
    #[ts(as = "Option<String>")]
    pub received_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
}

/// On-hand stock for one product, exposed to dashboards and the PoS UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockLevel {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub on_hand: i64,
    pub min_stock: i64,
    pub below_minimum: bool,
}

// =============================================================================
// Shift
// =============================================================================

/// A bounded cash-register session for one operator.
///
/// ## Invariant
/// At most one shift with `ended_at = None` per operator at any instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shift {
    pub id: String,
    pub operator_id: String,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Shift {
    /// Whether the shift can still take sales.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Sales total for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CurrencyTotal {
    pub currency: String,
    pub total_cents: i64,
}

/// Totals of one shift. Cancelled receipts are counted but not summed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftSummary {
    pub shift: Shift,
    pub completed_receipts: i64,
    pub cancelled_receipts: i64,
    pub totals: Vec<CurrencyTotal>,
}

impl ShiftSummary {
    /// Sales total of the shift in `currency` (zero if it sold nothing in it).
    pub fn total_for(&self, currency: &str) -> Money {
        self.totals
            .iter()
            .find(|t| t.currency == currency)
            .map(|t| Money::from_cents(t.total_cents))
            .unwrap_or_default()
    }
}

// =============================================================================
// Receipt
// =============================================================================

/// A completed sale transaction.
///
/// Immutable except for the cancellation flag; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Receipt {
    pub id: String,
    /// Human-readable number: `YYYYMMDD-NNNN`.
    pub receipt_number: String,
    pub shift_id: String,
    pub operator_id: String,
    /// Σ line quantity × sale price.
    pub total_cents: i64,
    pub currency: String,
    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,
    pub cancelled: bool,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Receipt {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// A line item on a receipt.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub receipt_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Operator-entered price per unit.
    pub sale_price_cents: i64,
    /// Weighted average cost of the lots consumed; `None` when unknown.
    pub cost_price_cents: Option<i64>,
    pub currency: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    /// Quantity × sale price.
    #[inline]
    pub fn revenue(&self) -> Money {
        Money::from_cents(self.sale_price_cents).multiply_quantity(self.quantity)
    }
}

/// Audit record of one lot drawn from by one sale line.
///
/// Cancellation restores exactly these quantities to exactly these lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LotConsumption {
    pub id: String,
    pub sale_line_id: String,
    pub lot_id: String,
    pub quantity: i64,
    /// Unit cost of the lot at consumption time.
    pub unit_cost_cents: Option<i64>,
}

/// A sale line with the lots it consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineDetails {
    pub line: SaleLine,
    pub consumptions: Vec<LotConsumption>,
}

/// A receipt with its lines, as returned by `complete_sale` and
/// `get_receipt_details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptDetails {
    pub receipt: Receipt,
    pub lines: Vec<SaleLineDetails>,
}

impl ReceiptDetails {
    /// Σ line quantity × sale price. Equals `receipt.total_cents`.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(|l| l.line.revenue()).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, price: i64) -> SaleLine {
        SaleLine {
            id: "l".to_string(),
            receipt_id: "r".to_string(),
            product_id: "p".to_string(),
            sku_snapshot: "SKU".to_string(),
            name_snapshot: "Name".to_string(),
            quantity: qty,
            sale_price_cents: price,
            cost_price_cents: None,
            currency: "EUR".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_id_is_unique_uuid() {
        let a = new_id();
        assert_eq!(a.len(), 36);
        assert_ne!(a, new_id());
    }

    #[test]
    fn test_sale_line_revenue() {
        assert_eq!(line(3, 2500).revenue().cents(), 7500);
    }

    #[test]
    fn test_shift_is_open() {
        let mut shift = Shift {
            id: "s".to_string(),
            operator_id: "op".to_string(),
            started_at: Utc::now(),
            ended_at: None,
        };
        assert!(shift.is_open());
        shift.ended_at = Some(Utc::now());
        assert!(!shift.is_open());
    }

    #[test]
    fn test_shift_summary_total_for_missing_currency_is_zero() {
        let summary = ShiftSummary {
            shift: Shift {
                id: "s".to_string(),
                operator_id: "op".to_string(),
                started_at: Utc::now(),
                ended_at: None,
            },
            completed_receipts: 1,
            cancelled_receipts: 0,
            totals: vec![CurrencyTotal {
                currency: "EUR".to_string(),
                total_cents: 10000,
            }],
        };
        assert_eq!(summary.total_for("EUR").cents(), 10000);
        assert!(summary.total_for("USD").is_zero());
    }

    #[test]
    fn test_lot_source_serializes_snake_case() {
        let json = serde_json::to_string(&LotSource::Salvage).unwrap();
        assert_eq!(json, "\"salvage\"");
        assert_eq!(LotSource::Procurement.to_string(), "procurement");
    }
}
