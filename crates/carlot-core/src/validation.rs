//! # Validation Module
//!
//! Input validation for the Carlot PoS core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Collaborator (PoS UI, procurement screens)                   │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (Rust)                                           │
//! │  └── Runs before any transaction is opened                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0), CHECK (sale_price_cents > 0)               │
//! │  ├── UNIQUE (one open shift per operator)                              │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use carlot_core::validation::{validate_currency, validate_quantity};
//!
//! assert_eq!(validate_currency(" eur ").unwrap(), "EUR");
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_AMOUNT_CENTS, MAX_CART_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only letters, numbers, hyphens and underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, category).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an identifier supplied by a collaborator (operator, product,
/// receipt). Identity itself is the auth layer's concern; here it only has
/// to be present and bounded.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates and normalises a currency code.
///
/// ## Rules
/// - Trimmed and upper-cased first
/// - Exactly three ASCII letters (ISO 4217 style: EUR, USD, GEL)
///
/// ## Returns
/// The normalised code.
pub fn validate_currency(code: &str) -> ValidationResult<String> {
    let code = code.trim().to_ascii_uppercase();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter currency code".to_string(),
        });
    }

    Ok(code)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a received lot quantity (no cart cap applies).
pub fn validate_lot_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "lot quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates an operator-entered sale price in cents.
///
/// ## Rules
/// - Must be positive: an unpriced line is rejected before any stock moves
/// - At most MAX_AMOUNT_CENTS
pub fn validate_sale_price_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "sale price".to_string(),
        });
    }

    if cents > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "sale price".to_string(),
            min: 1,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates an optional cost or price hint in cents.
///
/// ## Rules
/// - Must be non-negative when present (zero-basis salvage is allowed)
/// - At most MAX_AMOUNT_CENTS
pub fn validate_optional_amount_cents(field: &str, cents: Option<i64>) -> ValidationResult<()> {
    match cents {
        Some(c) if !(0..=MAX_AMOUNT_CENTS).contains(&c) => Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        }),
        _ => Ok(()),
    }
}

/// Validates a minimum stock threshold.
pub fn validate_min_stock(min_stock: i64) -> ValidationResult<()> {
    if min_stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "min_stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in a sale request.
///
/// ## Rules
/// - At least one line
/// - At most MAX_CART_LINES (100)
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::EmptyCart);
    }

    if lines > MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 1,
            max: MAX_CART_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("BRK-PAD-01").is_ok());
        assert!(validate_sku("oil_5w30").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_currency_normalises() {
        assert_eq!(validate_currency("eur").unwrap(), "EUR");
        assert_eq!(validate_currency(" GEL ").unwrap(), "GEL");

        assert!(matches!(
            validate_currency(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_currency("EURO").is_err());
        assert!(validate_currency("E1R").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_sale_price_rejects_unpriced_line() {
        assert!(validate_sale_price_cents(1).is_ok());
        assert!(validate_sale_price_cents(0).is_err());
        assert!(validate_sale_price_cents(-100).is_err());

        assert!(validate_sale_price_cents(MAX_AMOUNT_CENTS).is_ok());
        assert_eq!(
            validate_sale_price_cents(i64::MAX / 100),
            Err(ValidationError::OutOfRange {
                field: "sale price".to_string(),
                min: 1,
                max: MAX_AMOUNT_CENTS,
            })
        );
    }

    #[test]
    fn test_validate_optional_amount() {
        assert!(validate_optional_amount_cents("unit cost", None).is_ok());
        assert!(validate_optional_amount_cents("unit cost", Some(0)).is_ok());
        assert!(validate_optional_amount_cents("unit cost", Some(-1)).is_err());
        assert!(validate_optional_amount_cents("unit cost", Some(MAX_AMOUNT_CENTS)).is_ok());
        assert!(validate_optional_amount_cents("unit cost", Some(i64::MAX / 4)).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert_eq!(validate_cart_size(0), Err(ValidationError::EmptyCart));
        assert!(validate_cart_size(1).is_ok());
        assert!(validate_cart_size(MAX_CART_LINES).is_ok());
        assert!(validate_cart_size(MAX_CART_LINES + 1).is_err());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("operator_id", "op-7").is_ok());
        assert!(validate_id("operator_id", "  ").is_err());
        assert!(validate_id("operator_id", &"x".repeat(65)).is_err());
    }
}
