//! # Sale Engine
//!
//! Completes and cancels sales. This is the only code that moves stock while
//! the shop is trading.
//!
//! ## completeSale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleRequest::validate()          ← no I/O, nothing written on failure │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN ─────────────────────────────────────────────────────────────┐  │
//! │  │ 1. resolve shift   get_or_create  | open shift or NoActiveShift  │  │
//! │  │ 2. for each line   deduct_fifo    → InsufficientStock aborts all │  │
//! │  │ 3. receipt number  YYYYMMDD-NNNN  (per-day sequence)             │  │
//! │  │ 4. INSERT receipt, sale_lines, sale_line_lots                    │  │
//! │  COMMIT ────────────────────────────────────────────────────────────┘  │
//! │       │                                                                 │
//! │       ├── Busy / Conflict → rollback, sleep n × backoff, run again     │
//! │       └── anything else   → rollback, return the error                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## cancelReceipt
//! Flags the receipt (guarded on `cancelled = 0`) and adds every
//! `sale_line_lots` quantity back to its lot, in one transaction. Receipts
//! and lines are never deleted.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use carlot_core::sale::{format_receipt_number, receipt_number_prefix, SaleRequest};
use carlot_core::validation::validate_id;
use carlot_core::{
    new_id, CoreError, LotConsumption, Receipt, ReceiptDetails, SaleLine, SaleLineDetails,
};

use super::catalog::require_product;
use super::inventory::{deduct_fifo, restore_lot};
use super::shift::{find_open_shift, get_or_create_shift};
use crate::config::SalePolicy;
use crate::error::{DbError, DbResult};

const RECEIPT_COLUMNS: &str = "id, receipt_number, shift_id, operator_id, total_cents, currency, \
                               sold_at, cancelled, cancelled_at";

const LINE_COLUMNS: &str = "id, receipt_id, product_id, sku_snapshot, name_snapshot, quantity, \
                            sale_price_cents, cost_price_cents, currency, created_at";

/// Repository for sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    policy: SalePolicy,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool, policy: SalePolicy) -> Self {
        SaleRepository { pool, policy }
    }

    /// Completes a sale atomically.
    ///
    /// ## Returns
    /// The persisted receipt with its lines and the lots each line drew from.
    ///
    /// ## Errors
    /// - Validation: empty cart, quantity or price out of range, duplicate
    ///   product, currency mismatch (nothing is read or written)
    /// - `NoActiveShift` when implicit shift creation is off
    /// - `InsufficientStock` naming the product and shortfall
    /// - `Busy` / `Conflict` once the retries are used up
    pub async fn complete_sale(&self, request: &SaleRequest) -> DbResult<ReceiptDetails> {
        let currency = request.validate()?;
        let currency = currency.as_str();

        self.with_retry("complete_sale", || self.try_complete_sale(request, currency))
            .await
    }

    async fn try_complete_sale(
        &self,
        request: &SaleRequest,
        currency: &str,
    ) -> DbResult<ReceiptDetails> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let shift = if self.policy.implicit_shift_creation {
            get_or_create_shift(&mut tx, &request.operator_id, now).await?
        } else {
            find_open_shift(&mut tx, &request.operator_id)
                .await?
                .ok_or_else(|| CoreError::NoActiveShift {
                    operator_id: request.operator_id.clone(),
                })?
        };

        let mut planned = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let product = require_product(&mut tx, &line.product_id).await?;
            let allocation = deduct_fifo(&mut tx, &product, line.quantity, currency).await?;
            planned.push((line, product, allocation));
        }

        let receipt = Receipt {
            id: new_id(),
            receipt_number: next_receipt_number(&mut tx, now.date_naive()).await?,
            shift_id: shift.id.clone(),
            operator_id: request.operator_id.clone(),
            total_cents: request.total().cents(),
            currency: currency.to_string(),
            sold_at: now,
            cancelled: false,
            cancelled_at: None,
        };
        insert_receipt(&mut tx, &receipt).await?;

        let mut lines = Vec::with_capacity(planned.len());
        for (cart_line, product, allocation) in planned {
            let line = SaleLine {
                id: new_id(),
                receipt_id: receipt.id.clone(),
                product_id: product.id,
                sku_snapshot: product.sku,
                name_snapshot: product.name,
                quantity: cart_line.quantity,
                sale_price_cents: cart_line.sale_price_cents,
                cost_price_cents: allocation.realized_unit_cost_cents(),
                currency: currency.to_string(),
                created_at: now,
            };
            insert_line(&mut tx, &line).await?;

            let mut consumptions = Vec::with_capacity(allocation.consumptions.len());
            for take in allocation.consumptions {
                let consumption = LotConsumption {
                    id: new_id(),
                    sale_line_id: line.id.clone(),
                    lot_id: take.lot_id,
                    quantity: take.quantity,
                    unit_cost_cents: take.unit_cost_cents,
                };
                insert_consumption(&mut tx, &consumption).await?;
                consumptions.push(consumption);
            }

            lines.push(SaleLineDetails { line, consumptions });
        }

        tx.commit().await?;

        info!(
            receipt_id = %receipt.id,
            receipt_number = %receipt.receipt_number,
            operator_id = %receipt.operator_id,
            shift_id = %receipt.shift_id,
            total = %receipt.total().format_with(&receipt.currency),
            lines = lines.len(),
            "Sale completed"
        );

        Ok(ReceiptDetails { receipt, lines })
    }

    /// Cancels a receipt and puts its stock back.
    ///
    /// Works on receipts of closed shifts too; the shift's totals drop the
    /// receipt from then on.
    ///
    /// ## Errors
    /// - `ReceiptNotFound`
    /// - `ReceiptAlreadyCancelled`, with no lot touched
    pub async fn cancel_receipt(&self, receipt_id: &str) -> DbResult<Receipt> {
        validate_id("receipt_id", receipt_id)?;

        self.with_retry("cancel_receipt", || self.try_cancel_receipt(receipt_id))
            .await
    }

    async fn try_cancel_receipt(&self, receipt_id: &str) -> DbResult<Receipt> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let flagged = sqlx::query(
            "UPDATE receipts SET cancelled = 1, cancelled_at = ?2 WHERE id = ?1 AND cancelled = 0",
        )
        .bind(receipt_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if flagged.rows_affected() == 0 {
            let err = match find_receipt(&mut tx, receipt_id).await? {
                Some(_) => CoreError::ReceiptAlreadyCancelled(receipt_id.to_string()),
                None => CoreError::ReceiptNotFound(receipt_id.to_string()),
            };
            warn!(receipt_id = %receipt_id, error = %err, "Cancellation rejected");
            return Err(err.into());
        }

        let consumptions: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT sll.lot_id, sll.quantity
            FROM sale_line_lots sll
            JOIN sale_lines sl ON sl.id = sll.sale_line_id
            WHERE sl.receipt_id = ?1
            ORDER BY sll.rowid
            "#,
        )
        .bind(receipt_id)
        .fetch_all(&mut *tx)
        .await?;

        for (lot_id, quantity) in &consumptions {
            restore_lot(&mut tx, lot_id, *quantity).await?;
        }

        let receipt = find_receipt(&mut tx, receipt_id)
            .await?
            .ok_or_else(|| CoreError::ReceiptNotFound(receipt_id.to_string()))?;

        tx.commit().await?;

        info!(
            receipt_id = %receipt.id,
            receipt_number = %receipt.receipt_number,
            lots_restored = consumptions.len(),
            "Receipt cancelled"
        );

        Ok(receipt)
    }

    /// Gets a receipt by ID.
    pub async fn get_receipt(&self, receipt_id: &str) -> DbResult<Option<Receipt>> {
        let mut conn = self.pool.acquire().await?;
        find_receipt(&mut conn, receipt_id).await
    }

    /// Receipts of a shift in sale order, cancelled ones included.
    pub async fn get_shift_receipts(&self, shift_id: &str) -> DbResult<Vec<Receipt>> {
        let sql = format!(
            "SELECT {} FROM receipts WHERE shift_id = ?1 ORDER BY sold_at, rowid",
            RECEIPT_COLUMNS
        );
        let receipts = sqlx::query_as::<_, Receipt>(&sql)
            .bind(shift_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(shift_id = %shift_id, count = receipts.len(), "Loaded shift receipts");
        Ok(receipts)
    }

    /// A receipt with its lines and lot consumptions.
    pub async fn get_receipt_details(&self, receipt_id: &str) -> DbResult<ReceiptDetails> {
        let mut conn = self.pool.acquire().await?;

        let receipt = find_receipt(&mut conn, receipt_id)
            .await?
            .ok_or_else(|| CoreError::ReceiptNotFound(receipt_id.to_string()))?;

        let sql = format!(
            "SELECT {} FROM sale_lines WHERE receipt_id = ?1 ORDER BY rowid",
            LINE_COLUMNS
        );
        let lines = sqlx::query_as::<_, SaleLine>(&sql)
            .bind(receipt_id)
            .fetch_all(&mut *conn)
            .await?;

        let consumptions = sqlx::query_as::<_, LotConsumption>(
            r#"
            SELECT sll.id, sll.sale_line_id, sll.lot_id, sll.quantity, sll.unit_cost_cents
            FROM sale_line_lots sll
            JOIN sale_lines sl ON sl.id = sll.sale_line_id
            WHERE sl.receipt_id = ?1
            ORDER BY sll.rowid
            "#,
        )
        .bind(receipt_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_line: HashMap<String, Vec<LotConsumption>> = HashMap::new();
        for consumption in consumptions {
            by_line
                .entry(consumption.sale_line_id.clone())
                .or_default()
                .push(consumption);
        }

        let lines = lines
            .into_iter()
            .map(|line| SaleLineDetails {
                consumptions: by_line.remove(&line.id).unwrap_or_default(),
                line,
            })
            .collect();

        Ok(ReceiptDetails { receipt, lines })
    }

    /// Runs `attempt` until it succeeds, fails for a non-retryable reason,
    /// or the policy's retries are spent. Attempt `n` waits `n × backoff`.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let mut retries: u32 = 0;
        loop {
            match attempt().await {
                Err(e) if e.is_retryable() && retries < self.policy.max_retries => {
                    retries += 1;
                    warn!(operation, retries, error = %e, "Transaction aborted, retrying");
                    tokio::time::sleep(self.policy.retry_backoff * retries).await;
                }
                Err(e) if e.is_retryable() => {
                    warn!(operation, retries, error = %e, "Giving up after retries");
                    return Err(e);
                }
                result => return result,
            }
        }
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn find_receipt(conn: &mut SqliteConnection, receipt_id: &str) -> DbResult<Option<Receipt>> {
    let sql = format!("SELECT {} FROM receipts WHERE id = ?1", RECEIPT_COLUMNS);
    let receipt = sqlx::query_as::<_, Receipt>(&sql)
        .bind(receipt_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(receipt)
}

/// Next `YYYYMMDD-NNNN` for `date`, read inside the sale transaction.
async fn next_receipt_number(conn: &mut SqliteConnection, date: NaiveDate) -> DbResult<String> {
    let prefix = receipt_number_prefix(date);
    let last: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(CAST(substr(receipt_number, ?2) AS INTEGER)) \
         FROM receipts WHERE receipt_number LIKE ?1",
    )
    .bind(format!("{}%", prefix))
    .bind(prefix.len() as i64 + 1)
    .fetch_one(&mut *conn)
    .await?;

    Ok(format_receipt_number(date, last.unwrap_or(0) + 1))
}

async fn insert_receipt(conn: &mut SqliteConnection, receipt: &Receipt) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO receipts (
            id, receipt_number, shift_id, operator_id,
            total_cents, currency, sold_at, cancelled, cancelled_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL)
        "#,
    )
    .bind(&receipt.id)
    .bind(&receipt.receipt_number)
    .bind(&receipt.shift_id)
    .bind(&receipt.operator_id)
    .bind(receipt.total_cents)
    .bind(&receipt.currency)
    .bind(receipt.sold_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        // another register took this number first
        DbError::UniqueViolation { .. } => {
            DbError::Conflict(format!("receipt number {} taken", receipt.receipt_number))
        }
        other => other,
    })?;

    Ok(())
}

async fn insert_line(conn: &mut SqliteConnection, line: &SaleLine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_lines (
            id, receipt_id, product_id, sku_snapshot, name_snapshot,
            quantity, sale_price_cents, cost_price_cents, currency, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&line.id)
    .bind(&line.receipt_id)
    .bind(&line.product_id)
    .bind(&line.sku_snapshot)
    .bind(&line.name_snapshot)
    .bind(line.quantity)
    .bind(line.sale_price_cents)
    .bind(line.cost_price_cents)
    .bind(&line.currency)
    .bind(line.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(line_id = %line.id, product_id = %line.product_id, "Sale line written");
    Ok(())
}

async fn insert_consumption(
    conn: &mut SqliteConnection,
    consumption: &LotConsumption,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_line_lots (id, sale_line_id, lot_id, quantity, unit_cost_cents)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&consumption.id)
    .bind(&consumption.sale_line_id)
    .bind(&consumption.lot_id)
    .bind(consumption.quantity)
    .bind(consumption.unit_cost_cents)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Receipts sold in `[from, to)`; used by tests and reporting screens.
pub async fn receipts_between(
    pool: &SqlitePool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> DbResult<Vec<Receipt>> {
    let sql = format!(
        "SELECT {} FROM receipts WHERE sold_at >= ?1 AND sold_at < ?2 ORDER BY sold_at, rowid",
        RECEIPT_COLUMNS
    );
    let receipts = sqlx::query_as::<_, Receipt>(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    Ok(receipts)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use carlot_core::sale::{parse_receipt_sequence, CartLine};
    use carlot_core::ValidationError;

    use crate::error::ErrorKind;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::{receive, seed_product, test_db};

    fn sale(operator: &str, lines: Vec<CartLine>) -> SaleRequest {
        SaleRequest::new(operator, "EUR", lines)
    }

    async fn lot_quantity(db: &Database, lot_id: &str) -> i64 {
        db.inventory().get_lot(lot_id).await.unwrap().unwrap().quantity
    }

    async fn count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_complete_sale_fifo_and_weighted_cost() {
        let db = test_db().await;
        let product = seed_product(&db, "BRK-PAD", 0).await;
        let lot_a = receive(&db, &product.id, 5, Some(1000), 1).await;
        let lot_b = receive(&db, &product.id, 5, Some(2000), 2).await;

        let details = db
            .sales()
            .complete_sale(&sale("op-1", vec![CartLine::new(&product.id, 7, 2500)]))
            .await
            .unwrap();

        assert_eq!(lot_quantity(&db, &lot_a.id).await, 0);
        assert_eq!(lot_quantity(&db, &lot_b.id).await, 3);

        let line = &details.lines[0];
        assert_eq!(line.line.cost_price_cents, Some(1286));
        assert_eq!(line.line.sku_snapshot, "BRK-PAD");
        assert_eq!(line.consumptions.len(), 2);
        assert_eq!(line.consumptions[0].lot_id, lot_a.id);
        assert_eq!(line.consumptions[0].quantity, 5);
        assert_eq!(line.consumptions[1].quantity, 2);

        assert_eq!(details.receipt.total_cents, 7 * 2500);
        assert_eq!(details.lines_total(), details.receipt.total());
        assert_eq!(parse_receipt_sequence(&details.receipt.receipt_number), Some(1));
    }

    #[tokio::test]
    async fn test_receipt_total_matches_lines_and_details_round_trip() {
        let db = test_db().await;
        let pads = seed_product(&db, "PAD", 0).await;
        let disc = seed_product(&db, "DISC", 0).await;
        receive(&db, &pads.id, 10, Some(800), 1).await;
        receive(&db, &disc.id, 10, None, 1).await;

        let completed = db
            .sales()
            .complete_sale(&sale(
                "op-1",
                vec![CartLine::new(&pads.id, 3, 1999), CartLine::new(&disc.id, 2, 4550)],
            ))
            .await
            .unwrap();
        assert_eq!(completed.receipt.total_cents, 3 * 1999 + 2 * 4550);

        let loaded = db
            .sales()
            .get_receipt_details(&completed.receipt.id)
            .await
            .unwrap();
        assert_eq!(loaded.receipt.receipt_number, completed.receipt.receipt_number);
        assert_eq!(loaded.lines.len(), 2);
        assert_eq!(loaded.lines[0].line.id, completed.lines[0].line.id);
        assert_eq!(loaded.lines[0].consumptions, completed.lines[0].consumptions);
        assert_eq!(loaded.lines_total().cents(), loaded.receipt.total_cents);
        // salvage-only line has unknown cost, not zero
        assert_eq!(loaded.lines[1].line.cost_price_cents, None);
    }

    #[tokio::test]
    async fn test_invalid_request_writes_nothing() {
        let db = test_db().await;
        let product = seed_product(&db, "OIL", 0).await;
        let lot = receive(&db, &product.id, 5, Some(100), 1).await;

        let err = db.sales().complete_sale(&sale("op-1", vec![])).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::EmptyCart))
        ));

        let err = db
            .sales()
            .complete_sale(&sale("op-1", vec![CartLine::new(&product.id, 1, 0)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(count(&db, "shifts").await, 0);
        assert_eq!(count(&db, "receipts").await, 0);
        assert_eq!(lot_quantity(&db, &lot.id).await, 5);
    }

    #[tokio::test]
    async fn test_oversized_price_is_validation_error() {
        let db = test_db().await;
        let product = seed_product(&db, "GOLD", 0).await;
        let lot = receive(&db, &product.id, 999, Some(100), 1).await;

        let err = db
            .sales()
            .complete_sale(&sale(
                "op-1",
                vec![CartLine::new(&product.id, 999, i64::MAX / 100)],
            ))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(count(&db, "shifts").await, 0);
        assert_eq!(count(&db, "receipts").await, 0);
        assert_eq!(lot_quantity(&db, &lot.id).await, 999);
    }

    #[tokio::test]
    async fn test_shortfall_on_any_line_rolls_back_whole_sale() {
        let db = test_db().await;
        let plenty = seed_product(&db, "PLENTY", 0).await;
        let scarce = seed_product(&db, "SCARCE", 0).await;
        let plenty_lot = receive(&db, &plenty.id, 10, Some(100), 1).await;
        let scarce_lot = receive(&db, &scarce.id, 1, Some(100), 1).await;

        let err = db
            .sales()
            .complete_sale(&sale(
                "op-1",
                vec![CartLine::new(&plenty.id, 4, 500), CartLine::new(&scarce.id, 3, 500)],
            ))
            .await
            .unwrap_err();

        match &err {
            DbError::Domain(CoreError::InsufficientStock { sku, shortfall, .. }) => {
                assert_eq!(sku, "SCARCE");
                assert_eq!(*shortfall, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(lot_quantity(&db, &plenty_lot.id).await, 10);
        assert_eq!(lot_quantity(&db, &scarce_lot.id).await, 1);
        assert_eq!(count(&db, "receipts").await, 0);
        assert_eq!(count(&db, "sale_lines").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let db = test_db().await;
        let err = db
            .sales()
            .complete_sale(&sale("op-1", vec![CartLine::new("ghost", 1, 100)]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(count(&db, "receipts").await, 0);
    }

    #[tokio::test]
    async fn test_no_active_shift_when_implicit_creation_disabled() {
        let policy = SalePolicy {
            implicit_shift_creation: false,
            ..SalePolicy::default()
        };
        let db = Database::new(DbConfig::in_memory().sale_policy(policy))
            .await
            .unwrap();
        let product = seed_product(&db, "FUSE", 0).await;
        receive(&db, &product.id, 5, Some(10), 1).await;
        let request = sale("op-1", vec![CartLine::new(&product.id, 1, 50)]);

        let err = db.sales().complete_sale(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveShift);

        let shift = db.shifts().open("op-1", Utc::now()).await.unwrap();
        let details = db.sales().complete_sale(&request).await.unwrap();
        assert_eq!(details.receipt.shift_id, shift.id);

        // closed shift takes no further sales
        db.shifts().close(&shift.id).await.unwrap();
        let err = db.sales().complete_sale(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveShift);
    }

    #[tokio::test]
    async fn test_implicit_shift_reused_across_sales() {
        let db = test_db().await;
        let product = seed_product(&db, "BULB", 0).await;
        receive(&db, &product.id, 5, Some(10), 1).await;
        let request = sale("op-1", vec![CartLine::new(&product.id, 1, 50)]);

        let first = db.sales().complete_sale(&request).await.unwrap();
        let second = db.sales().complete_sale(&request).await.unwrap();
        assert_eq!(first.receipt.shift_id, second.receipt.shift_id);
        assert_eq!(count(&db, "shifts").await, 1);

        assert_eq!(parse_receipt_sequence(&second.receipt.receipt_number), Some(2));

        let receipts = db
            .sales()
            .get_shift_receipts(&first.receipt.shift_id)
            .await
            .unwrap();
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].id, first.receipt.id);
    }

    #[tokio::test]
    async fn test_sell_then_cancel_restores_exact_lots() {
        let db = test_db().await;
        let product = seed_product(&db, "WPR", 0).await;
        let lot_a = receive(&db, &product.id, 5, Some(1000), 1).await;
        let lot_b = receive(&db, &product.id, 5, Some(2000), 2).await;
        let lot_c = receive(&db, &product.id, 5, Some(3000), 3).await;

        let details = db
            .sales()
            .complete_sale(&sale("op-1", vec![CartLine::new(&product.id, 7, 4000)]))
            .await
            .unwrap();

        let cancelled = db.sales().cancel_receipt(&details.receipt.id).await.unwrap();
        assert!(cancelled.cancelled);
        assert!(cancelled.cancelled_at.is_some());

        assert_eq!(lot_quantity(&db, &lot_a.id).await, 5);
        assert_eq!(lot_quantity(&db, &lot_b.id).await, 5);
        assert_eq!(lot_quantity(&db, &lot_c.id).await, 5);

        // receipt and lines are kept
        assert_eq!(count(&db, "sale_lines").await, 1);
        let loaded = db.sales().get_receipt(&details.receipt.id).await.unwrap().unwrap();
        assert!(loaded.cancelled);
    }

    #[tokio::test]
    async fn test_cancel_twice_and_unknown() {
        let db = test_db().await;
        let product = seed_product(&db, "HOSE", 0).await;
        let lot = receive(&db, &product.id, 3, Some(100), 1).await;

        let details = db
            .sales()
            .complete_sale(&sale("op-1", vec![CartLine::new(&product.id, 2, 300)]))
            .await
            .unwrap();
        db.sales().cancel_receipt(&details.receipt.id).await.unwrap();

        let err = db.sales().cancel_receipt(&details.receipt.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyCancelled);
        // restored once only
        assert_eq!(lot_quantity(&db, &lot.id).await, 3);

        let err = db.sales().cancel_receipt("no-such-receipt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_cancelled_receipts_excluded_from_shift_totals() {
        let db = test_db().await;
        let product = seed_product(&db, "MAT", 0).await;
        receive(&db, &product.id, 10, Some(1000), 1).await;

        let kept = db
            .sales()
            .complete_sale(&sale("op-1", vec![CartLine::new(&product.id, 1, 10000)]))
            .await
            .unwrap();
        let voided = db
            .sales()
            .complete_sale(&sale("op-1", vec![CartLine::new(&product.id, 1, 5000)]))
            .await
            .unwrap();
        db.sales().cancel_receipt(&voided.receipt.id).await.unwrap();

        let summary = db.shifts().summary(&kept.receipt.shift_id).await.unwrap();
        assert_eq!(summary.completed_receipts, 1);
        assert_eq!(summary.cancelled_receipts, 1);
        assert_eq!(summary.total_for("EUR").cents(), 10000);
    }

    #[tokio::test]
    async fn test_cancel_after_shift_closed() {
        let db = test_db().await;
        let product = seed_product(&db, "CAP", 0).await;
        let lot = receive(&db, &product.id, 2, Some(100), 1).await;

        let details = db
            .sales()
            .complete_sale(&sale("op-1", vec![CartLine::new(&product.id, 2, 300)]))
            .await
            .unwrap();
        db.shifts().close(&details.receipt.shift_id).await.unwrap();

        db.sales().cancel_receipt(&details.receipt.id).await.unwrap();
        assert_eq!(lot_quantity(&db, &lot.id).await, 2);
    }

    #[tokio::test]
    async fn test_receipts_between_is_half_open() {
        let db = test_db().await;
        let product = seed_product(&db, "NUT", 0).await;
        receive(&db, &product.id, 2, Some(1), 1).await;
        let details = db
            .sales()
            .complete_sale(&sale("op-1", vec![CartLine::new(&product.id, 1, 5)]))
            .await
            .unwrap();
        let at = details.receipt.sold_at;

        let hit = receipts_between(db.pool(), at, at + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(hit.len(), 1);
        let miss = receipts_between(db.pool(), at - chrono::Duration::seconds(1), at)
            .await
            .unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sales_of_last_unit_cannot_both_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("race.db"))
            .max_connections(4)
            .busy_timeout(Duration::from_secs(5))
            .sale_policy(SalePolicy {
                implicit_shift_creation: true,
                max_retries: 5,
                retry_backoff: Duration::from_millis(5),
            });
        let db = Database::new(config).await.unwrap();

        let product = seed_product(&db, "LAST-ONE", 0).await;
        let lot = receive(&db, &product.id, 1, Some(1000), 1).await;

        let mut handles = Vec::new();
        for operator in ["op-1", "op-2", "op-3", "op-4"] {
            let db = db.clone();
            let request = sale(operator, vec![CartLine::new(&product.id, 1, 1500)]);
            handles.push(tokio::spawn(async move {
                db.sales().complete_sale(&request).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => assert!(
                    matches!(e.kind(), ErrorKind::InsufficientStock | ErrorKind::Conflict),
                    "unexpected error: {:?}",
                    e
                ),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(lot_quantity(&db, &lot.id).await, 0);
        assert_eq!(count(&db, "receipts").await, 1);
    }
}
