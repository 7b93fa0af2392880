//! # Analytics Repository
//!
//! Read-only revenue, cost and margin rollups over historical sale lines.
//!
//! The SQL side only selects lines (completed receipts, `[from, to)`,
//! optional filters); grouping and arithmetic happen in
//! [`carlot_core::analytics::aggregate`] so the same rules apply everywhere.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use carlot_core::analytics::{
    aggregate, AnalyticsFilter, AnalyticsReport, DateRange, SaleLineRecord,
};
use carlot_core::validation::validate_currency;

use crate::error::DbResult;

/// Repository for sales analytics.
#[derive(Debug, Clone)]
pub struct AnalyticsRepository {
    pool: SqlitePool,
}

impl AnalyticsRepository {
    /// Creates a new AnalyticsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AnalyticsRepository { pool }
    }

    /// Rolls up completed sales in `range`.
    ///
    /// Cancelled receipts never count. Lines with unknown cost add 0 to the
    /// cost total and set `has_unknown_cost` on their rows.
    pub async fn aggregate(
        &self,
        range: &DateRange,
        filter: &AnalyticsFilter,
    ) -> DbResult<AnalyticsReport> {
        let records = self.sale_lines(range, filter).await?;
        let report = aggregate(&records);

        debug!(
            lines = records.len(),
            products = report.per_product.len(),
            currencies = report.per_currency.len(),
            "Aggregated sales"
        );
        Ok(report)
    }

    /// The sale lines an aggregation would read.
    pub async fn sale_lines(
        &self,
        range: &DateRange,
        filter: &AnalyticsFilter,
    ) -> DbResult<Vec<SaleLineRecord>> {
        let currency = filter
            .currency
            .as_deref()
            .map(validate_currency)
            .transpose()?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT
                sl.product_id AS product_id,
                sl.sku_snapshot AS sku,
                sl.name_snapshot AS name,
                sl.quantity AS quantity,
                sl.sale_price_cents AS sale_price_cents,
                sl.cost_price_cents AS cost_price_cents,
                sl.currency AS currency
            FROM sale_lines sl
            JOIN receipts r ON r.id = sl.receipt_id
            LEFT JOIN products p ON p.id = sl.product_id
            LEFT JOIN subcategories s ON s.id = p.subcategory_id
            WHERE r.cancelled = 0
            "#,
        );

        qb.push(" AND r.sold_at >= ").push_bind(range.from);
        qb.push(" AND r.sold_at < ").push_bind(range.to);

        if let Some(product_id) = &filter.product_id {
            qb.push(" AND sl.product_id = ").push_bind(product_id.clone());
        }
        if let Some(subcategory_id) = &filter.subcategory_id {
            qb.push(" AND p.subcategory_id = ").push_bind(subcategory_id.clone());
        }
        if let Some(category_id) = &filter.category_id {
            qb.push(" AND s.category_id = ").push_bind(category_id.clone());
        }
        if let Some(operator_id) = &filter.operator_id {
            qb.push(" AND r.operator_id = ").push_bind(operator_id.clone());
        }
        if let Some(currency) = currency {
            qb.push(" AND sl.currency = ").push_bind(currency);
        }

        qb.push(" ORDER BY r.sold_at, sl.rowid");

        let records = qb
            .build_query_as::<SaleLineRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use carlot_core::sale::{CartLine, SaleRequest};
    use carlot_core::Product;

    use crate::error::ErrorKind;
    use crate::pool::Database;
    use crate::repository::test_support::{receive, receive_in, seed_product, test_db};

    fn around_now() -> DateRange {
        let now = Utc::now();
        DateRange::new(now - Duration::hours(1), now + Duration::hours(1)).unwrap()
    }

    async fn sell(
        db: &Database,
        operator: &str,
        currency: &str,
        product: &Product,
        qty: i64,
        price: i64,
    ) -> String {
        db.sales()
            .complete_sale(&SaleRequest::new(
                operator,
                currency,
                vec![CartLine::new(&product.id, qty, price)],
            ))
            .await
            .unwrap()
            .receipt
            .id
    }

    #[tokio::test]
    async fn test_margin_over_cost() {
        let db = test_db().await;
        let product = seed_product(&db, "ALT", 0).await;
        receive(&db, &product.id, 2, Some(5000), 1).await;
        sell(&db, "op-1", "EUR", &product, 2, 7500).await;

        let report = db
            .analytics()
            .aggregate(&around_now(), &AnalyticsFilter::default())
            .await
            .unwrap();

        assert_eq!(report.per_product.len(), 1);
        let row = &report.per_product[0];
        assert_eq!(row.quantity, 2);
        assert_eq!(row.revenue_cents, 15000);
        assert_eq!(row.cost_cents, 10000);
        assert_eq!(row.profit_cents, 5000);
        assert_eq!(row.margin_bps, 5000);
        assert!(!row.has_unknown_cost);

        let eur = report.currency("EUR").unwrap();
        assert_eq!(eur.line_count, 1);
        assert_eq!(eur.revenue_cents, 15000);
    }

    #[tokio::test]
    async fn test_cancelled_receipts_do_not_count() {
        let db = test_db().await;
        let product = seed_product(&db, "RAD", 0).await;
        receive(&db, &product.id, 5, Some(1000), 1).await;
        sell(&db, "op-1", "EUR", &product, 1, 3000).await;
        let voided = sell(&db, "op-1", "EUR", &product, 2, 3000).await;
        db.sales().cancel_receipt(&voided).await.unwrap();

        let report = db
            .analytics()
            .aggregate(&around_now(), &AnalyticsFilter::default())
            .await
            .unwrap();
        assert_eq!(report.per_product[0].quantity, 1);
        assert_eq!(report.per_product[0].revenue_cents, 3000);
    }

    #[tokio::test]
    async fn test_unknown_cost_flagged_and_zero_cost_margin() {
        let db = test_db().await;
        let product = seed_product(&db, "DOOR", 0).await;
        receive(&db, &product.id, 1, None, 1).await;
        sell(&db, "op-1", "EUR", &product, 1, 12000).await;

        let report = db
            .analytics()
            .aggregate(&around_now(), &AnalyticsFilter::default())
            .await
            .unwrap();
        let row = &report.per_product[0];
        assert_eq!(row.cost_cents, 0);
        assert_eq!(row.margin_bps, 0);
        assert!(row.has_unknown_cost);
    }

    #[tokio::test]
    async fn test_currencies_stay_separate() {
        let db = test_db().await;
        let product = seed_product(&db, "SEAT", 0).await;
        receive(&db, &product.id, 5, Some(1000), 1).await;
        receive_in(&db, &product.id, 5, Some(900), "USD", 2).await;
        sell(&db, "op-1", "EUR", &product, 1, 2000).await;
        sell(&db, "op-1", "usd", &product, 1, 2500).await;

        let report = db
            .analytics()
            .aggregate(&around_now(), &AnalyticsFilter::default())
            .await
            .unwrap();
        assert_eq!(report.per_product.len(), 2);
        assert_eq!(report.per_currency.len(), 2);
        assert_eq!(report.currency("USD").unwrap().revenue_cents, 2500);

        let usd_only = AnalyticsFilter {
            currency: Some(" usd".to_string()),
            ..AnalyticsFilter::default()
        };
        let report = db.analytics().aggregate(&around_now(), &usd_only).await.unwrap();
        assert_eq!(report.per_product.len(), 1);
        assert_eq!(report.per_product[0].currency, "USD");

        let bad = AnalyticsFilter {
            currency: Some("dollars".to_string()),
            ..AnalyticsFilter::default()
        };
        let err = db.analytics().aggregate(&around_now(), &bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_filters_and_range() {
        let db = test_db().await;
        let lamp = seed_product(&db, "LAMP", 0).await;
        let horn = seed_product(&db, "HORN", 0).await;
        receive(&db, &lamp.id, 5, Some(100), 1).await;
        receive(&db, &horn.id, 5, Some(100), 1).await;
        sell(&db, "op-1", "EUR", &lamp, 1, 500).await;
        sell(&db, "op-2", "EUR", &horn, 1, 700).await;

        let subcategory = db
            .catalog()
            .list_subcategories(None)
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.id == lamp.subcategory_id)
            .unwrap();

        let by_category = AnalyticsFilter {
            category_id: Some(subcategory.category_id.clone()),
            ..AnalyticsFilter::default()
        };
        let report = db.analytics().aggregate(&around_now(), &by_category).await.unwrap();
        assert_eq!(report.per_product.len(), 1);
        assert_eq!(report.per_product[0].sku, "LAMP");

        let by_operator = AnalyticsFilter {
            operator_id: Some("op-2".to_string()),
            ..AnalyticsFilter::default()
        };
        let report = db.analytics().aggregate(&around_now(), &by_operator).await.unwrap();
        assert_eq!(report.per_product[0].sku, "HORN");

        let by_product = AnalyticsFilter {
            product_id: Some(horn.id.clone()),
            subcategory_id: Some(horn.subcategory_id.clone()),
            ..AnalyticsFilter::default()
        };
        let lines = db.analytics().sale_lines(&around_now(), &by_product).await.unwrap();
        assert_eq!(lines.len(), 1);

        // ends before the sales happened
        let past = DateRange::new(
            Utc::now() - Duration::days(2),
            Utc::now() - Duration::days(1),
        )
        .unwrap();
        let report = db
            .analytics()
            .aggregate(&past, &AnalyticsFilter::default())
            .await
            .unwrap();
        assert!(report.per_product.is_empty());
        assert!(report.per_currency.is_empty());
    }
}
