//! # Inventory Ledger
//!
//! Lots of stock per product, consumed oldest first.
//!
//! ## Deduction Inside a Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  deduct_fifo(conn, product, 7, "EUR")                                  │
//! │                                                                         │
//! │  1. SELECT lots WHERE quantity > 0 ORDER BY received_at, rowid         │
//! │  2. FifoQueue::allocate(7)            (carlot-core, pure)              │
//! │  3. shortfall > 0 ?  → InsufficientStock, nothing written              │
//! │  4. for each take:                                                      │
//! │       UPDATE inventory_lots SET quantity = quantity - take             │
//! │        WHERE id = lot AND quantity >= take                             │
//! │       0 rows → Conflict (another sale got there first)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guarded UPDATE means a stale read can never drive a lot negative; the
//! caller's transaction rolls back and the sale engine retries.
//!
//! Deduction and restore only run inside sale and cancel transactions; the
//! public surface here is receiving and read-only queries.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use carlot_core::ledger::{FifoAllocation, FifoQueue, LotSnapshot};
use carlot_core::validation::{
    validate_currency, validate_id, validate_lot_quantity, validate_optional_amount_cents,
};
use carlot_core::{new_id, CoreError, InventoryLot, NewLot, Product, StockLevel};

use super::catalog::require_product;
use crate::error::{DbError, DbResult};

const LOT_COLUMNS: &str = "id, product_id, source, source_ref, quantity, unit_cost_cents, \
                           sale_price_cents, currency, received_at, location, created_at";

/// On-hand quantity per product. `below_minimum` is computed by SQLite.
const STOCK_LEVELS_SQL: &str = r#"
    SELECT
        p.id AS product_id,
        p.sku AS sku,
        p.name AS name,
        COALESCE(SUM(l.quantity), 0) AS on_hand,
        p.min_stock AS min_stock,
        COALESCE(SUM(l.quantity), 0) < p.min_stock AS below_minimum
    FROM products p
    LEFT JOIN inventory_lots l ON l.product_id = p.id
    GROUP BY p.id
"#;

/// Repository for the inventory ledger.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Records a new lot from procurement receiving or car dismantling.
    ///
    /// ## Rules
    /// - quantity > 0
    /// - cost and price hint within `0..=MAX_AMOUNT_CENTS` when present
    /// - currency is normalised (" eur" → "EUR")
    /// - the product must exist
    pub async fn receive_lot(&self, new: &NewLot) -> DbResult<InventoryLot> {
        validate_id("product_id", &new.product_id)?;
        validate_lot_quantity(new.quantity)?;
        validate_optional_amount_cents("unit cost", new.unit_cost_cents)?;
        validate_optional_amount_cents("sale price", new.sale_price_cents)?;
        let currency = validate_currency(&new.currency)?;

        let mut conn = self.pool.acquire().await?;
        require_product(&mut conn, &new.product_id).await?;

        let now = Utc::now();
        let lot = InventoryLot {
            id: new_id(),
            product_id: new.product_id.clone(),
            source: new.source,
            source_ref: new.source_ref.clone(),
            quantity: new.quantity,
            unit_cost_cents: new.unit_cost_cents,
            sale_price_cents: new.sale_price_cents,
            currency,
            received_at: new.received_at.unwrap_or(now),
            location: new.location.clone(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO inventory_lots (
                id, product_id, source, source_ref, quantity,
                unit_cost_cents, sale_price_cents, currency,
                received_at, location, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&lot.id)
        .bind(&lot.product_id)
        .bind(lot.source)
        .bind(&lot.source_ref)
        .bind(lot.quantity)
        .bind(lot.unit_cost_cents)
        .bind(lot.sale_price_cents)
        .bind(&lot.currency)
        .bind(lot.received_at)
        .bind(&lot.location)
        .bind(lot.created_at)
        .execute(&mut *conn)
        .await?;

        info!(
            lot_id = %lot.id,
            product_id = %lot.product_id,
            source = %lot.source,
            quantity = lot.quantity,
            "Lot received"
        );

        Ok(lot)
    }

    /// Gets a lot by ID.
    pub async fn get_lot(&self, id: &str) -> DbResult<Option<InventoryLot>> {
        let sql = format!("SELECT {} FROM inventory_lots WHERE id = ?1", LOT_COLUMNS);
        let lot = sqlx::query_as::<_, InventoryLot>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lot)
    }

    /// Lots of a product in FIFO order.
    ///
    /// Exhausted lots are kept for cost history and only listed on request.
    pub async fn lots_for_product(
        &self,
        product_id: &str,
        include_exhausted: bool,
    ) -> DbResult<Vec<InventoryLot>> {
        let sql = format!(
            "SELECT {} FROM inventory_lots \
             WHERE product_id = ?1 AND (?2 OR quantity > 0) \
             ORDER BY received_at ASC, rowid ASC",
            LOT_COLUMNS
        );
        let lots = sqlx::query_as::<_, InventoryLot>(&sql)
            .bind(product_id)
            .bind(include_exhausted)
            .fetch_all(&self.pool)
            .await?;

        Ok(lots)
    }

    /// On-hand stock for one product.
    pub async fn stock_level(&self, product_id: &str) -> DbResult<StockLevel> {
        let sql = format!("SELECT * FROM ({}) WHERE product_id = ?1", STOCK_LEVELS_SQL);
        sqlx::query_as::<_, StockLevel>(&sql)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
    }

    /// On-hand stock for every product, by SKU.
    pub async fn stock_levels(&self) -> DbResult<Vec<StockLevel>> {
        let sql = format!("SELECT * FROM ({}) ORDER BY sku", STOCK_LEVELS_SQL);
        let levels = sqlx::query_as::<_, StockLevel>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(levels)
    }

    /// Products whose on-hand quantity is below their minimum.
    pub async fn low_stock(&self) -> DbResult<Vec<StockLevel>> {
        let sql = format!(
            "SELECT * FROM ({}) WHERE below_minimum ORDER BY sku",
            STOCK_LEVELS_SQL
        );
        let levels = sqlx::query_as::<_, StockLevel>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = levels.len(), "Low stock products");
        Ok(levels)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Reads the product's lots with stock into a FIFO queue.
///
/// Ties on `received_at` keep insertion order (`rowid`).
pub(crate) async fn load_fifo_queue(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<FifoQueue> {
    let sql = format!(
        "SELECT {} FROM inventory_lots \
         WHERE product_id = ?1 AND quantity > 0 \
         ORDER BY received_at ASC, rowid ASC",
        LOT_COLUMNS
    );
    let lots = sqlx::query_as::<_, InventoryLot>(&sql)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(FifoQueue::new(lots.iter().map(LotSnapshot::from)))
}

/// Takes `quantity` units of `product` from its oldest lots.
///
/// Either every take is written or the function fails; on failure the
/// caller must roll its transaction back.
pub(crate) async fn deduct_fifo(
    conn: &mut SqliteConnection,
    product: &Product,
    quantity: i64,
    sale_currency: &str,
) -> DbResult<FifoAllocation> {
    let queue = load_fifo_queue(conn, &product.id).await?;
    let allocation = queue.allocate(quantity, sale_currency);

    if !allocation.is_fulfilled() {
        warn!(
            product_id = %product.id,
            sku = %product.sku,
            available = queue.available(),
            requested = quantity,
            "Insufficient stock"
        );
        return Err(CoreError::InsufficientStock {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            available: queue.available(),
            requested: quantity,
            shortfall: allocation.shortfall,
        }
        .into());
    }

    for take in &allocation.consumptions {
        let result = sqlx::query(
            "UPDATE inventory_lots SET quantity = quantity - ?2 WHERE id = ?1 AND quantity >= ?2",
        )
        .bind(&take.lot_id)
        .bind(take.quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict(format!(
                "lot {} changed while deducting {}",
                take.lot_id, product.sku
            )));
        }

        debug!(lot_id = %take.lot_id, quantity = take.quantity, "Lot deducted");
    }

    Ok(allocation)
}

/// Adds `quantity` back to an existing lot. Never creates lots.
pub(crate) async fn restore_lot(
    conn: &mut SqliteConnection,
    lot_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE inventory_lots SET quantity = quantity + ?2 WHERE id = ?1")
        .bind(lot_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::LotNotFound(lot_id.to_string()).into());
    }

    debug!(lot_id = %lot_id, quantity, "Lot restored");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
