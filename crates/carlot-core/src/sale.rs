//! # Sale Request
//!
//! The cart as an explicit request payload, plus receipt arithmetic.
//!
//! ## Lifecycle
//! ```text
//! ┌──────────────┐   validate()    ┌──────────────┐  carlot-db SaleEngine  ┌──────────┐
//! │ SaleRequest  │ ──────────────► │ normalised   │ ─────────────────────► │ Receipt  │
//! │ (from UI)    │   no mutation   │ currency     │   one transaction      │ + lines  │
//! └──────────────┘                 └──────────────┘                        └──────────┘
//! ```
//!
//! Nothing about a cart is held server-side: the PoS UI sends the whole
//! request and the engine either commits all of it or none of it.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::MAX_AMOUNT_CENTS;
use crate::validation::{
    validate_cart_size, validate_currency, validate_id, validate_quantity,
    validate_sale_price_cents,
};

// =============================================================================
// Request Payload
// =============================================================================

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    /// Operator-entered price per unit, in cents.
    pub sale_price_cents: i64,
    /// Optional; when present it must equal the receipt currency.
    #[serde(default)]
    pub currency: Option<String>,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, sale_price_cents: i64) -> Self {
        CartLine {
            product_id: product_id.into(),
            quantity,
            sale_price_cents,
            currency: None,
        }
    }

    /// Quantity × sale price. `None` if it does not fit in `i64`.
    #[inline]
    pub fn checked_total(&self) -> Option<Money> {
        Money::from_cents(self.sale_price_cents).checked_multiply_quantity(self.quantity)
    }
}

/// A complete sale request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    pub operator_id: String,
    pub currency: String,
    pub lines: Vec<CartLine>,
}

impl SaleRequest {
    pub fn new(
        operator_id: impl Into<String>,
        currency: impl Into<String>,
        lines: Vec<CartLine>,
    ) -> Self {
        SaleRequest {
            operator_id: operator_id.into(),
            currency: currency.into(),
            lines,
        }
    }

    /// Checks every precondition of a sale before anything is written.
    ///
    /// ## Rules
    /// - operator id present
    /// - 1 to 100 lines, each product at most once
    /// - every quantity in 1..=999, every sale price > 0
    /// - line currencies (when given) equal the receipt currency
    ///
    /// ## Returns
    /// The normalised receipt currency.
    pub fn validate(&self) -> CoreResult<String> {
        validate_id("operator_id", &self.operator_id)?;
        let currency = validate_currency(&self.currency)?;
        validate_cart_size(self.lines.len())?;

        let mut seen = HashSet::with_capacity(self.lines.len());
        for line in &self.lines {
            validate_id("product_id", &line.product_id)?;
            validate_quantity(line.quantity)?;
            validate_sale_price_cents(line.sale_price_cents)?;

            if let Some(line_currency) = &line.currency {
                let line_currency = validate_currency(line_currency)?;
                if line_currency != currency {
                    return Err(ValidationError::CurrencyMismatch {
                        receipt: currency,
                        line: line_currency,
                    }
                    .into());
                }
            }

            if !seen.insert(line.product_id.as_str()) {
                return Err(ValidationError::DuplicateLine {
                    product_id: line.product_id.clone(),
                }
                .into());
            }
        }

        if self.checked_total().is_none() {
            return Err(ValidationError::OutOfRange {
                field: "receipt total".to_string(),
                min: 1,
                max: i64::MAX,
            }
            .into());
        }

        Ok(currency)
    }

    /// Σ line quantity × sale price, `None` on overflow.
    pub fn checked_total(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.checked_total()?))
    }

    /// Σ line quantity × sale price. This is the receipt total.
    ///
    /// Exact for any request that passed [`validate`](Self::validate);
    /// saturates otherwise.
    pub fn total(&self) -> Money {
        let cents: i128 = self
            .lines
            .iter()
            .map(|l| l.sale_price_cents as i128 * l.quantity as i128)
            .sum();
        Money::from_cents(cents.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }
}

// =============================================================================
// Receipt Numbers
// =============================================================================

/// Formats a receipt number as `YYYYMMDD-NNNN`.
///
/// The sequence restarts every day; past 9999 it simply widens.
///
/// ```rust
/// use carlot_core::sale::format_receipt_number;
/// use chrono::NaiveDate;
///
/// let day = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
/// assert_eq!(format_receipt_number(day, 42), "20260307-0042");
/// ```
pub fn format_receipt_number(date: NaiveDate, sequence: i64) -> String {
    format!("{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// The `YYYYMMDD-` prefix shared by every receipt number of `date`.
pub fn receipt_number_prefix(date: NaiveDate) -> String {
    format!("{}-", date.format("%Y%m%d"))
}

/// Parses the sequence part back out of a receipt number.
pub fn parse_receipt_sequence(receipt_number: &str) -> Option<i64> {
    let (date, seq) = receipt_number.split_once('-')?;
    if date.len() != 8 || !date.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    seq.parse().ok()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

    fn request(lines: Vec<CartLine>) -> SaleRequest {
        SaleRequest::new("op-1", "eur", lines)
    }

    #[test]
    fn test_valid_request_normalises_currency() {
        let req = request(vec![CartLine::new("p-1", 2, 1500), CartLine::new("p-2", 1, 700)]);
        assert_eq!(req.validate().unwrap(), "EUR");
        assert_eq!(req.total().cents(), 3700);
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = request(vec![]).validate().unwrap_err();
        assert_eq!(err, CoreError::Validation(ValidationError::EmptyCart));
    }

    #[test]
    fn test_zero_quantity_and_unpriced_lines_rejected() {
        assert!(request(vec![CartLine::new("p-1", 0, 1500)]).validate().is_err());
        assert!(request(vec![CartLine::new("p-1", 1, 0)]).validate().is_err());
        assert!(request(vec![CartLine::new("p-1", 1000, 100)]).validate().is_err());
    }

    #[test]
    fn test_oversized_price_rejected_without_overflow() {
        let line = CartLine::new("p-1", 999, i64::MAX / 100);
        assert_eq!(line.checked_total(), None);

        let err = request(vec![line]).validate().unwrap_err();
        match err {
            CoreError::Validation(ValidationError::OutOfRange { field, .. }) => {
                assert_eq!(field, "sale price");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // largest accepted cart still totals exactly
        let lines: Vec<CartLine> = (0..MAX_CART_LINES)
            .map(|i| CartLine::new(format!("p-{}", i), MAX_LINE_QUANTITY, MAX_AMOUNT_CENTS))
            .collect();
        let req = request(lines);
        assert!(req.validate().is_ok());
        assert_eq!(
            req.total().cents(),
            MAX_CART_LINES as i64 * MAX_LINE_QUANTITY * MAX_AMOUNT_CENTS
        );
        assert_eq!(req.checked_total(), Some(req.total()));
    }

    #[test]
    fn test_duplicate_product_rejected() {
        let err = request(vec![CartLine::new("p-1", 1, 100), CartLine::new("p-1", 2, 100)])
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::DuplicateLine { .. })
        ));
    }

    #[test]
    fn test_line_currency_must_match_receipt() {
        let mut line = CartLine::new("p-1", 1, 100);
        line.currency = Some("usd".to_string());
        let err = request(vec![line.clone()]).validate().unwrap_err();
        assert_eq!(
            err,
            CoreError::Validation(ValidationError::CurrencyMismatch {
                receipt: "EUR".to_string(),
                line: "USD".to_string(),
            })
        );

        line.currency = Some("Eur".to_string());
        assert!(request(vec![line]).validate().is_ok());
    }

    #[test]
    fn test_missing_operator_rejected() {
        let req = SaleRequest::new("", "EUR", vec![CartLine::new("p-1", 1, 100)]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_receipt_number_round_trip() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        let number = format_receipt_number(day, 7);
        assert_eq!(number, "20260131-0007");
        assert!(number.starts_with(&receipt_number_prefix(day)));
        assert_eq!(parse_receipt_sequence(&number), Some(7));
        assert_eq!(parse_receipt_sequence("garbage"), None);
    }
}
