//! # grocer-core: Pure Business Logic for Grocer POS
//!
//! Discount evaluation, sale totals and loyalty point math as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Grocer POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP layer (outside this workspace)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          grocer-db services (transactions, SQLite)              │   │
//! │  │   DiscountService  SettlementService  LoyaltyService  Inventory │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ grocer-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────────┐ ┌───────┐ │   │
//! │  │  │  types  │ │  money  │ │ discount │ │ settlement │ │loyalty│ │   │
//! │  │  └─────────┘ └─────────┘ └──────────┘ └────────────┘ └───────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Customer, InventoryLog, ...)
//! - [`money`] - Integer money with explicit rounding
//! - [`discount`] - Discount rules and the best-rule evaluator
//! - [`settlement`] - Sale intake validation, totals, invoice numbers
//! - [`loyalty`] - Point accrual, tiers and redemption capping
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use grocer_core::money::Money;
//! use grocer_core::types::TaxRate;
//!
//! let taxable = Money::from_cents(142500);
//! let vat = taxable.calculate_tax(TaxRate::from_bps(1800));
//! assert_eq!(vat.cents(), 25650);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod loyalty;
pub mod money;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on a single sale.
pub const MAX_SALE_ITEMS: usize = 200;

/// Maximum quantity on a single line.
///
/// Bulk rice and sugar are sold by the kilo, so this is well above a
/// typical piece count.
pub const MAX_ITEM_QUANTITY: f64 = 10_000.0;

/// Decimal places kept on stock levels (grams of a kilo).
pub const STOCK_DECIMALS: i32 = 3;

/// Rounds a stock level or movement to [`STOCK_DECIMALS`] places.
///
/// ```rust
/// use grocer_core::round_stock;
///
/// assert_eq!(round_stock(0.3 - 0.1), 0.2);
/// assert_eq!(round_stock(-0.1000000001), -0.1);
/// ```
pub fn round_stock(qty: f64) -> f64 {
    let scale = 10f64.powi(STOCK_DECIMALS);
    (qty * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_stock() {
        assert_eq!(round_stock(0.3 - 0.1), 0.2);
        assert_eq!(round_stock(1.0 - 0.9), 0.1);
        assert_eq!(round_stock(12.0), 12.0);
        assert_eq!(round_stock(-2.5), -2.5);
        assert_eq!(round_stock(0.0004), 0.0);
    }
}
