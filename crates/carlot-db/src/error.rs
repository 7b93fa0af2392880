//! # Database Error Types
//!
//! Error types for database operations, plus the classification that
//! collaborators see.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Domain rule (CoreError)           │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──────────── DbError::Domain                   │
//! │       │                                                                 │
//! │       ├── is_retryable() → sale engine retries Busy / Conflict         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  kind() + public_message() ← what the PoS UI is allowed to see         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use carlot_core::{CoreError, ValidationError};

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU
    /// - Opening a second shift for an operator (partial unique index)
    /// - Duplicate receipt number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative lot quantity, unpriced line).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The database was locked by another writer past the busy timeout.
    #[error("Database busy: {0}")]
    Busy(String),

    /// A concurrent transaction changed the rows this one planned against.
    ///
    /// ## When This Occurs
    /// - A guarded lot decrement matched no row (another sale took the stock)
    /// - Two sales raced for the same receipt number
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),

    /// A domain rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),
}

impl DbError {
    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether retrying the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::Conflict(_))
    }

    /// Classifies the error for collaborators.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Domain(core) => match core {
                CoreError::Validation(_) => ErrorKind::Validation,
                CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
                CoreError::NoActiveShift { .. } => ErrorKind::NoActiveShift,
                CoreError::ShiftAlreadyOpen { .. } => ErrorKind::Conflict,
                CoreError::ReceiptAlreadyCancelled(_) => ErrorKind::AlreadyCancelled,
                CoreError::ProductNotFound(_)
                | CoreError::LotNotFound(_)
                | CoreError::ShiftNotFound(_)
                | CoreError::ReceiptNotFound(_) => ErrorKind::NotFound,
            },
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } | DbError::Busy(_) | DbError::Conflict(_) => {
                ErrorKind::Conflict
            }
            DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => {
                ErrorKind::Validation
            }
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::PoolExhausted
            | DbError::Config(_)
            | DbError::Internal(_) => ErrorKind::Storage,
        }
    }

    /// Message safe to show an operator.
    ///
    /// Domain errors keep their full text (product, shortfall). Storage
    /// errors collapse to a generic line; the detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            DbError::Domain(core) => core.to_string(),
            DbError::NotFound { entity, id } => format!("{} not found: {}", entity, id),
            DbError::UniqueViolation { .. } => "Record already exists".to_string(),
            DbError::Busy(_) | DbError::Conflict(_) => {
                "Another register changed the same stock, please retry".to_string()
            }
            DbError::ForeignKeyViolation { .. } => "Invalid reference".to_string(),
            DbError::CheckViolation { .. } => "Invalid value".to_string(),
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::PoolExhausted
            | DbError::Config(_)
            | DbError::Internal(_) => "Database operation failed".to_string(),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

// =============================================================================
// Error Kind
// =============================================================================

/// Machine-readable error category for collaborators.
///
/// ```text
/// switch (e.kind) {
///   case "INSUFFICIENT_STOCK": showShortfall(e.message); break;
///   case "CONFLICT":           retryLater(); break;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    InsufficientStock,
    NoActiveShift,
    Conflict,
    NotFound,
    AlreadyCancelled,
    Storage,
}

/// Error payload handed to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&DbError> for PublicError {
    fn from(err: &DbError) -> Self {
        PublicError {
            kind: err.kind(),
            message: err.public_message(),
        }
    }
}

// =============================================================================
// sqlx Conversions
// =============================================================================

/// SQLite primary result codes (extended code & 0xff).
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → constraint kind, or Busy on SQLITE_BUSY/LOCKED
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                let busy = db_err
                    .code()
                    .and_then(|code| code.parse::<i64>().ok())
                    .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
                    .unwrap_or(false);
                if busy {
                    return DbError::Busy(msg);
                }

                match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => {
                        // "UNIQUE constraint failed: <table>.<column>"
                        let field = msg
                            .split("UNIQUE constraint failed: ")
                            .nth(1)
                            .unwrap_or("unknown")
                            .to_string();
                        DbError::UniqueViolation {
                            field,
                            value: "unknown".to_string(),
                        }
                    }
                    sqlx::error::ErrorKind::ForeignKeyViolation => {
                        DbError::ForeignKeyViolation { message: msg }
                    }
                    sqlx::error::ErrorKind::CheckViolation
                    | sqlx::error::ErrorKind::NotNullViolation => {
                        DbError::CheckViolation { message: msg }
                    }
                    _ => DbError::QueryFailed(msg),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
