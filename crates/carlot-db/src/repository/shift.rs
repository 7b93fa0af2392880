//! # Shift Manager
//!
//! Cash-register sessions, one open shift per operator.
//!
//! ## Uniqueness
//! ```text
//! CREATE UNIQUE INDEX idx_shifts_one_open ON shifts(operator_id)
//!     WHERE ended_at IS NULL;
//!
//!  open()          INSERT ...           unique violation → ShiftAlreadyOpen
//!  get_or_create() INSERT OR IGNORE ... then SELECT the open row
//! ```
//!
//! The partial index makes both paths safe when two registers race: the
//! loser of `open` gets a conflict, the loser of `get_or_create` reads the
//! winner's row.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use carlot_core::validation::validate_id;
use carlot_core::{new_id, CoreError, CurrencyTotal, Shift, ShiftSummary};

use crate::error::{DbError, DbResult};

const SHIFT_COLUMNS: &str = "id, operator_id, started_at, ended_at";

/// Repository for shifts.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    /// Creates a new ShiftRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Opens a shift for the operator.
    ///
    /// ## Errors
    /// - `ShiftAlreadyOpen` when the operator has an open shift; no second
    ///   row is written
    pub async fn open(&self, operator_id: &str, started_at: DateTime<Utc>) -> DbResult<Shift> {
        validate_id("operator_id", operator_id)?;

        let shift = Shift {
            id: new_id(),
            operator_id: operator_id.to_string(),
            started_at,
            ended_at: None,
        };

        let inserted = sqlx::query(
            "INSERT INTO shifts (id, operator_id, started_at, ended_at) VALUES (?1, ?2, ?3, NULL)",
        )
        .bind(&shift.id)
        .bind(&shift.operator_id)
        .bind(shift.started_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from);

        match inserted {
            Ok(_) => {
                info!(shift_id = %shift.id, operator_id = %operator_id, "Shift opened");
                Ok(shift)
            }
            Err(DbError::UniqueViolation { .. }) => {
                let existing = self.get_open(operator_id).await?;
                warn!(operator_id = %operator_id, "Shift already open");
                Err(CoreError::ShiftAlreadyOpen {
                    operator_id: operator_id.to_string(),
                    shift_id: existing.map(|s| s.id).unwrap_or_default(),
                }
                .into())
            }
            Err(e) => Err(e),
        }
    }

    /// Closes an open shift. A closed shift takes no further sales.
    ///
    /// ## Errors
    /// - `ShiftNotFound` when no open shift has this id
    pub async fn close(&self, shift_id: &str) -> DbResult<Shift> {
        let now = Utc::now();

        let result =
            sqlx::query("UPDATE shifts SET ended_at = ?2 WHERE id = ?1 AND ended_at IS NULL")
                .bind(shift_id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ShiftNotFound(shift_id.to_string()).into());
        }

        info!(shift_id = %shift_id, "Shift closed");

        self.get(shift_id)
            .await?
            .ok_or_else(|| CoreError::ShiftNotFound(shift_id.to_string()).into())
    }

    /// Gets a shift by ID, open or closed.
    pub async fn get(&self, shift_id: &str) -> DbResult<Option<Shift>> {
        let sql = format!("SELECT {} FROM shifts WHERE id = ?1", SHIFT_COLUMNS);
        let shift = sqlx::query_as::<_, Shift>(&sql)
            .bind(shift_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(shift)
    }

    /// The operator's open shift, if any.
    pub async fn get_open(&self, operator_id: &str) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        find_open_shift(&mut conn, operator_id).await
    }

    /// The operator's open shift, opened now if there is none.
    ///
    /// Idempotent under concurrency: every caller gets the same row.
    pub async fn get_or_create(&self, operator_id: &str) -> DbResult<Shift> {
        validate_id("operator_id", operator_id)?;

        let mut conn = self.pool.acquire().await?;
        get_or_create_shift(&mut conn, operator_id, Utc::now()).await
    }

    /// The operator's shifts, newest first.
    pub async fn list(&self, operator_id: &str) -> DbResult<Vec<Shift>> {
        let sql = format!(
            "SELECT {} FROM shifts WHERE operator_id = ?1 ORDER BY started_at DESC, rowid DESC",
            SHIFT_COLUMNS
        );
        let shifts = sqlx::query_as::<_, Shift>(&sql)
            .bind(operator_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(shifts)
    }

    /// Receipt counts and per-currency totals of a shift.
    ///
    /// Cancelled receipts are counted separately and excluded from totals.
    pub async fn summary(&self, shift_id: &str) -> DbResult<ShiftSummary> {
        let shift = self
            .get(shift_id)
            .await?
            .ok_or_else(|| CoreError::ShiftNotFound(shift_id.to_string()))?;

        let (completed, cancelled): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN cancelled = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN cancelled = 1 THEN 1 ELSE 0 END), 0)
            FROM receipts
            WHERE shift_id = ?1
            "#,
        )
        .bind(shift_id)
        .fetch_one(&self.pool)
        .await?;

        let totals = sqlx::query_as::<_, CurrencyTotal>(
            r#"
            SELECT currency, SUM(total_cents) AS total_cents
            FROM receipts
            WHERE shift_id = ?1 AND cancelled = 0
            GROUP BY currency
            ORDER BY currency
            "#,
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(shift_id = %shift_id, completed, cancelled, "Shift summary");

        Ok(ShiftSummary {
            shift,
            completed_receipts: completed,
            cancelled_receipts: cancelled,
            totals,
        })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn find_open_shift(
    conn: &mut SqliteConnection,
    operator_id: &str,
) -> DbResult<Option<Shift>> {
    let sql = format!(
        "SELECT {} FROM shifts WHERE operator_id = ?1 AND ended_at IS NULL",
        SHIFT_COLUMNS
    );
    let shift = sqlx::query_as::<_, Shift>(&sql)
        .bind(operator_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(shift)
}

/// Returns the operator's open shift, inserting one if needed.
///
/// `INSERT OR IGNORE` against the partial unique index turns a lost race
/// into a no-op; the SELECT then sees whichever row won.
pub(crate) async fn get_or_create_shift(
    conn: &mut SqliteConnection,
    operator_id: &str,
    now: DateTime<Utc>,
) -> DbResult<Shift> {
    let id = new_id();
    let result = sqlx::query(
        "INSERT OR IGNORE INTO shifts (id, operator_id, started_at, ended_at) \
         VALUES (?1, ?2, ?3, NULL)",
    )
    .bind(&id)
    .bind(operator_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        info!(shift_id = %id, operator_id = %operator_id, "Shift opened implicitly");
    }

    find_open_shift(conn, operator_id)
        .await?
        .ok_or_else(|| {
            CoreError::NoActiveShift {
                operator_id: operator_id.to_string(),
            }
            .into()
        })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::{day, test_db};

    async fn shift_rows(db: &Database, operator_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM shifts WHERE operator_id = ?1")
            .bind(operator_id)
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_and_close() {
        let db = test_db().await;
        let shift = db.shifts().open("op-1", day(0)).await.unwrap();
        assert!(shift.is_open());

        let open = db.shifts().get_open("op-1").await.unwrap().unwrap();
        assert_eq!(open.id, shift.id);

        let closed = db.shifts().close(&shift.id).await.unwrap();
        assert!(!closed.is_open());
        assert!(db.shifts().get_open("op-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_open_conflicts_without_second_row() {
        let db = test_db().await;
        let first = db.shifts().open("op-1", day(0)).await.unwrap();

        let err = db.shifts().open("op-1", day(0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        match err {
            DbError::Domain(CoreError::ShiftAlreadyOpen { shift_id, .. }) => {
                assert_eq!(shift_id, first.id)
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(shift_rows(&db, "op-1").await, 1);

        // another operator is unaffected
        db.shifts().open("op-2", day(0)).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_unknown_or_closed_shift() {
        let db = test_db().await;
        let err = db.shifts().close("nope").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ShiftNotFound(_))));

        let shift = db.shifts().open("op-1", day(0)).await.unwrap();
        db.shifts().close(&shift.id).await.unwrap();
        let err = db.shifts().close(&shift.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_reopen_after_close_and_list_newest_first() {
        let db = test_db().await;
        let first = db.shifts().open("op-1", day(0)).await.unwrap();
        db.shifts().close(&first.id).await.unwrap();
        let second = db.shifts().open("op-1", day(1)).await.unwrap();

        let shifts = db.shifts().list("op-1").await.unwrap();
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].id, second.id);
        assert_eq!(shifts[1].id, first.id);
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let db = test_db().await;
        let a = db.shifts().get_or_create("op-1").await.unwrap();
        let b = db.shifts().get_or_create("op-1").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(shift_rows(&db, "op-1").await, 1);
    }

    #[tokio::test]
    async fn test_get_or_create_race_yields_one_shift() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("shifts.db")).max_connections(4))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.shifts().get_or_create("op-race").await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(shift_rows(&db, "op-race").await, 1);
    }

    #[tokio::test]
    async fn test_summary_of_empty_shift() {
        let db = test_db().await;
        let shift = db.shifts().open("op-1", day(0)).await.unwrap();
        let summary = db.shifts().summary(&shift.id).await.unwrap();
        assert_eq!(summary.completed_receipts, 0);
        assert!(summary.totals.is_empty());

        let err = db.shifts().summary("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ShiftNotFound(ref id)) if id == "missing"
        ));
    }
}
