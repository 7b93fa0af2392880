//! # Money Module
//!
//! Provides the `Money` type for monetary values and the `Margin` type for
//! profit ratios.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Weighted cost of 7 units drawn from two lots:                          │
//! │    (5 × 10.00 + 2 × 20.00) / 7 = 12.857142…                            │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents + explicit rounding                        │
//! │    9000 cents / 7 = 1285.71 → 1286 cents (half-up, i128 intermediate)  │
//! │                                                                         │
//! │  Inputs are capped (MAX_AMOUNT_CENTS), sums are checked or i128.        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Amounts carry no currency. The currency code travels next to the amount
//! (on the lot, receipt or line) and amounts of different currencies are
//! never added together.
//!
//! ## Usage
//! ```rust
//! use carlot_core::money::Money;
//!
//! let price = Money::from_cents(1099); // 10.99
//! let line_total = price * 3;          // 32.97
//! assert_eq!(line_total.cents(), 3297);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: net profit can be negative
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use carlot_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use carlot_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(2500);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 7500);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Like [`multiply_quantity`](Self::multiply_quantity), `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use carlot_core::money::Money;
    ///
    /// let price = Money::from_cents(2500);
    /// assert_eq!(price.checked_multiply_quantity(3), Some(Money::from_cents(7500)));
    /// assert_eq!(Money::from_cents(i64::MAX / 100).checked_multiply_quantity(999), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Addition returning `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Formats the amount followed by its currency code ("12.86 EUR").
    pub fn format_with(&self, currency: &str) -> String {
        format!("{} {}", self, currency)
    }
}

/// Integer division rounding half away from zero.
///
/// `den` must be positive.
pub(crate) fn div_round_half_away(num: i128, den: i128) -> i64 {
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    rounded as i64
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering ("-5.50"); currency symbols belong to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Margin
// =============================================================================

/// Profit margin over cost, in basis points.
///
/// ## Why Basis Points?
/// 1 basis point = 0.01%. `5000` bps = 50.00%.
/// Same integer representation as every other ratio in the system, so no
/// floats enter stored or compared values.
///
/// ## Formula
/// ```text
/// margin % = net profit / cost × 100
///          = 0 when cost is 0 (no division by zero)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Margin(i64);

impl Margin {
    /// Creates a margin from basis points.
    #[inline]
    pub const fn from_bps(bps: i64) -> Self {
        Margin(bps)
    }

    /// Computes the margin of `profit` over `cost`.
    ///
    /// ## Example
    /// ```rust
    /// use carlot_core::money::{Margin, Money};
    ///
    /// let margin = Margin::of(Money::from_cents(5000), Money::from_cents(10000));
    /// assert_eq!(margin.bps(), 5000); // 50.00%
    ///
    /// let free = Margin::of(Money::from_cents(15000), Money::zero());
    /// assert_eq!(free.bps(), 0);
    /// ```
    pub fn of(profit: Money, cost: Money) -> Self {
        if cost.is_zero() {
            return Margin(0);
        }
        let num = profit.cents() as i128 * 10_000;
        let den = cost.cents() as i128;
        // Normalise the sign onto the numerator so rounding sees a positive divisor.
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        Margin(div_round_half_away(num, den))
    }

    /// Returns the margin in basis points.
    #[inline]
    pub const fn bps(&self) -> i64 {
        self.0
    }

    /// Returns the margin as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Margin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}%", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
