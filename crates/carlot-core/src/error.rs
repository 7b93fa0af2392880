//! # Error Types
//!
//! Domain-specific error types for carlot-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  carlot-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  carlot-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures + Domain(CoreError)           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ErrorKind → caller      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, shortfall)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Product cannot be found in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Inventory lot cannot be found.
    #[error("Inventory lot not found: {0}")]
    LotNotFound(String),

    /// FIFO lots cannot cover the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// completeSale(brake-pad × 5)
    ///      │
    ///      ▼
    /// FIFO lots on hand: 3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "BRK-PAD", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole sale rolled back, lots unchanged
    /// ```
    #[error(
        "Insufficient stock for {sku}: available {available}, requested {requested} \
         (short by {shortfall})"
    )]
    InsufficientStock {
        product_id: String,
        sku: String,
        available: i64,
        requested: i64,
        shortfall: i64,
    },

    /// The operator has no open shift and implicit creation is disabled.
    #[error("Operator {operator_id} has no active shift")]
    NoActiveShift { operator_id: String },

    /// The operator already has an open shift.
    #[error("Operator {operator_id} already has an open shift ({shift_id})")]
    ShiftAlreadyOpen {
        operator_id: String,
        shift_id: String,
    },

    /// No open shift with the given id exists.
    #[error("Open shift not found: {0}")]
    ShiftNotFound(String),

    /// Receipt cannot be found.
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),

    /// The receipt was already cancelled by an earlier request.
    #[error("Receipt {0} is already cancelled")]
    ReceiptAlreadyCancelled(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state mutation is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The sale request has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The same product appears on more than one line.
    #[error("Product {product_id} appears on more than one cart line")]
    DuplicateLine { product_id: String },

    /// A line names a currency different from the receipt currency.
    #[error("Line currency {line} does not match receipt currency {receipt}")]
    CurrencyMismatch { receipt: String, line: String },

    /// Date range end is not after its start.
    #[error("Date range end must be after its start")]
    InvalidDateRange,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
