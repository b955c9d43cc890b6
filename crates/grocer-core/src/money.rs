//! # Money Module
//!
//! Provides the `Money` type for monetary values in integer minor units.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │                                                                         │
//! │  A discount of 5% on LKR 1,500.00 must be exactly LKR 75.00, and the   │
//! │  sum of line discounts must equal the sale's total_discount to the     │
//! │  cent. We store cents (i64) and round once, at a known place:          │
//! │                                                                         │
//! │    percentage:  (cents × bps + 5000) / 10000        half-up            │
//! │    fractional:  round(cents × qty)                  half away from 0   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use grocer_core::money::Money;
//!
//! let price = Money::from_cents(15000);        // LKR 150.00 per kg
//! let line = price.multiply_fractional(2.5);   // 2.5 kg
//! assert_eq!(line.cents(), 37500);
//!
//! let five_percent = line.percentage(500);
//! assert_eq!(five_percent.cents(), 1875);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// Currency code used when formatting amounts for humans.
pub const CURRENCY_CODE: &str = "LKR";

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Where Money is Used
/// ```text
/// Product.price_for(tier) ──► SaleItem.unit_price ──► SaleItem.subtotal
///                                                          │
///                            DiscountRule ──► discount_amount
///                                                          │
///                                                          ▼
/// Sale.subtotal - Sale.total_discount + tax ──────────► Sale.total
///                                                          │
///                                  LoyaltySettings ──► points earned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(1500, 0).cents(), 150000);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
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

    /// Returns the amount in major units as a float.
    ///
    /// Only for ratios (discount percent, loyalty points). Never feed the
    /// result back into a Money.
    #[inline]
    pub fn as_major_f64(&self) -> f64 {
        self.0 as f64 / 100.0
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

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Calculates tax at the given rate, rounding half-up.
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::money::Money;
    /// use grocer_core::types::TaxRate;
    ///
    /// let taxable = Money::from_cents(1000);
    /// let tax = taxable.calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83); // 82.5 → 83
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percentage(rate.bps())
    }

    /// Returns `bps` basis points of this amount, rounding half-up.
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(150000); // 1500.00
    /// assert_eq!(subtotal.percentage(500).cents(), 7500); // 5% = 75.00
    /// ```
    pub fn percentage(&self, bps: u32) -> Money {
        // i128 keeps large totals from overflowing during the multiply
        let cents = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money::from_cents(cents as i64)
    }

    /// Multiplies money by a whole quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies money by a fractional quantity (weighed goods), rounding
    /// to the nearest cent, half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::money::Money;
    ///
    /// let per_kg = Money::from_cents(333);
    /// assert_eq!(per_kg.multiply_fractional(1.5).cents(), 500); // 499.5 → 500
    /// ```
    pub fn multiply_fractional(&self, qty: f64) -> Self {
        Money((self.0 as f64 * qty).round() as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Human-readable form, e.g. `LKR 10.99`. For logs and audit descriptions.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}{} {}.{:02}",
            sign,
            CURRENCY_CODE,
            self.major().abs(),
            self.minor()
        )
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

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "LKR 10.99");
        assert_eq!(Money::from_cents(500).to_string(), "LKR 5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-LKR 5.50");
        assert_eq!(Money::zero().to_string(), "LKR 0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!(a.min(b), b);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 5% of 1500.00
        assert_eq!(Money::from_cents(150000).percentage(500).cents(), 7500);
        // 8.25% of 10.00 = 82.5 cents
        assert_eq!(Money::from_cents(1000).percentage(825).cents(), 83);
        // 2% of 0.25 = 0.5 cents
        assert_eq!(Money::from_cents(25).percentage(200).cents(), 1);
        assert_eq!(Money::from_cents(1000).percentage(0).cents(), 0);
    }

    #[test]
    fn test_tax_calculation() {
        let amount = Money::from_cents(1000);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(1000)).cents(), 100);
        assert_eq!(amount.calculate_tax(TaxRate::zero()).cents(), 0);
    }

    #[test]
    fn test_multiply_fractional() {
        let per_kg = Money::from_cents(15000);
        assert_eq!(per_kg.multiply_fractional(2.5).cents(), 37500);
        assert_eq!(per_kg.multiply_fractional(0.333).cents(), 4995);
        assert_eq!(Money::from_cents(5000).multiply_fractional(20.0).cents(), 100000);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
        assert!(Money::from_cents(-1).is_negative());
    }

    #[test]
    fn test_serializes_as_plain_cents() {
        let json = serde_json::to_string(&Money::from_cents(7500)).unwrap();
        assert_eq!(json, "7500");
    }
}
