//! # Analytics Module
//!
//! Revenue, cost and margin rollups over historical sale lines.
//!
//! ## Data Flow
//! ```text
//! ┌────────────────────┐      ┌──────────────────────┐      ┌────────────────────┐
//! │ carlot-db          │      │ aggregate()          │      │ AnalyticsReport    │
//! │ lines of completed │ ───► │ group by product and │ ───► │ per_product        │
//! │ receipts in range  │      │ by currency          │      │ per_currency       │
//! └────────────────────┘      └──────────────────────┘      └────────────────────┘
//! ```
//!
//! Amounts are never summed across currencies: a product sold in two
//! currencies yields one row per currency.
//!
//! A line with unknown cost contributes zero cost and flags its row with
//! `has_unknown_cost`, so a 100% margin on salvage parts is visibly partial.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Margin, Money};

// =============================================================================
// Query Inputs
// =============================================================================

/// Half-open time range `[from, to)` on the receipt sale timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "String")]
    pub from: DateTime<Utc>,
    #[ts(as = "String")]
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// Builds a range, rejecting `to <= from`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, ValidationError> {
        if to <= from {
            return Err(ValidationError::InvalidDateRange);
        }
        Ok(DateRange { from, to })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at < self.to
    }
}

/// Optional narrowing of an analytics query. Empty means everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AnalyticsFilter {
    pub product_id: Option<String>,
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub operator_id: Option<String>,
    pub currency: Option<String>,
}

/// One sale line as read for aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLineRecord {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub sale_price_cents: i64,
    pub cost_price_cents: Option<i64>,
    pub currency: String,
}

impl SaleLineRecord {
    fn revenue(&self) -> Money {
        Money::from_cents(self.sale_price_cents).multiply_quantity(self.quantity)
    }

    fn cost(&self) -> Money {
        Money::from_cents(self.cost_price_cents.unwrap_or(0)).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Report
// =============================================================================

/// Rollup for one product in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSummary {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub currency: String,
    pub quantity: i64,
    pub revenue_cents: i64,
    pub cost_cents: i64,
    pub profit_cents: i64,
    pub margin_bps: i64,
    /// At least one contributing line had no realized cost.
    pub has_unknown_cost: bool,
}

/// Rollup for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CurrencySummary {
    pub currency: String,
    pub line_count: i64,
    pub quantity: i64,
    pub revenue_cents: i64,
    pub cost_cents: i64,
    pub profit_cents: i64,
    pub margin_bps: i64,
    pub has_unknown_cost: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AnalyticsReport {
    /// Ordered by revenue descending, then SKU.
    pub per_product: Vec<ProductSummary>,
    /// Ordered by currency code.
    pub per_currency: Vec<CurrencySummary>,
}

impl AnalyticsReport {
    pub fn currency(&self, code: &str) -> Option<&CurrencySummary> {
        self.per_currency.iter().find(|c| c.currency == code)
    }
}

#[derive(Default)]
struct Totals {
    lines: i64,
    quantity: i64,
    revenue: Money,
    cost: Money,
    unknown_cost: bool,
}

impl Totals {
    fn add(&mut self, record: &SaleLineRecord) {
        self.lines += 1;
        self.quantity += record.quantity;
        self.revenue += record.revenue();
        self.cost += record.cost();
        self.unknown_cost |= record.cost_price_cents.is_none();
    }

    fn profit(&self) -> Money {
        self.revenue - self.cost
    }

    fn margin(&self) -> Margin {
        Margin::of(self.profit(), self.cost)
    }
}

/// Groups sale lines into per-product and per-currency rollups.
///
/// The caller has already excluded cancelled receipts and applied the date
/// range and filters.
pub fn aggregate(records: &[SaleLineRecord]) -> AnalyticsReport {
    let mut by_product: BTreeMap<(&str, &str), (&SaleLineRecord, Totals)> = BTreeMap::new();
    let mut by_currency: BTreeMap<&str, Totals> = BTreeMap::new();

    for record in records {
        by_product
            .entry((record.product_id.as_str(), record.currency.as_str()))
            .or_insert_with(|| (record, Totals::default()))
            .1
            .add(record);
        by_currency
            .entry(record.currency.as_str())
            .or_default()
            .add(record);
    }

    let mut per_product: Vec<ProductSummary> = by_product
        .into_values()
        .map(|(first, t)| ProductSummary {
            product_id: first.product_id.clone(),
            sku: first.sku.clone(),
            name: first.name.clone(),
            currency: first.currency.clone(),
            quantity: t.quantity,
            revenue_cents: t.revenue.cents(),
            cost_cents: t.cost.cents(),
            profit_cents: t.profit().cents(),
            margin_bps: t.margin().bps(),
            has_unknown_cost: t.unknown_cost,
        })
        .collect();
    per_product.sort_by(|a, b| {
        b.revenue_cents
            .cmp(&a.revenue_cents)
            .then_with(|| a.sku.cmp(&b.sku))
            .then_with(|| a.currency.cmp(&b.currency))
    });

    let per_currency = by_currency
        .into_iter()
        .map(|(currency, t)| CurrencySummary {
            currency: currency.to_string(),
            line_count: t.lines,
            quantity: t.quantity,
            revenue_cents: t.revenue.cents(),
            cost_cents: t.cost.cents(),
            profit_cents: t.profit().cents(),
            margin_bps: t.margin().bps(),
            has_unknown_cost: t.unknown_cost,
        })
        .collect();

    AnalyticsReport {
        per_product,
        per_currency,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
