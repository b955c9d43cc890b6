//! # Sale Settlement (pure part)
//!
//! Everything about settling a sale that does not touch storage: intake
//! validation, totals, invoice number formatting and the settlement policy.
//! The transactional half lives in `grocer-db::service::settlement`.
//!
//! ## Totals
//! ```text
//! item.total        = item.subtotal - item.discount_amount
//! sale.subtotal     = Σ item.subtotal
//! sale.discount     = Σ item.discount_amount
//! sale.tax          = (subtotal - discount) × tax_rate      (half-up)
//! sale.total        = subtotal - discount + tax
//! ```
//!
//! ## Invoice Numbers
//! `INV-{YYYYMMDD}-{NNNN}`: UTC date of the sale plus a per-day sequence,
//! zero-padded to four digits (a fifth digit appears after 9999 sales).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Payment, PriceTier, Sale, SaleItem, SaleStatus, TaxRate};
use crate::validation::{
    validate_item_count, validate_payment_amount, validate_price_cents, validate_quantity,
    validate_required, ValidationResult,
};

// =============================================================================
// Invoice Number
// =============================================================================

const INVOICE_PREFIX: &str = "INV";

/// A parsed `INV-YYYYMMDD-NNNN` invoice number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InvoiceNumber {
    pub date: NaiveDate,
    pub sequence: u32,
}

impl InvoiceNumber {
    pub fn new(date: NaiveDate, sequence: u32) -> Self {
        InvoiceNumber { date, sequence }
    }

    /// Key of the per-day sequence counter (`YYYYMMDD`).
    pub fn day_key(date: NaiveDate) -> String {
        date.format("%Y%m%d").to_string()
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:04}",
            INVOICE_PREFIX,
            Self::day_key(self.date),
            self.sequence
        )
    }
}

impl FromStr for InvoiceNumber {
    type Err = ValidationError;

    /// ## Example
    /// ```rust
    /// use grocer_core::settlement::InvoiceNumber;
    ///
    /// let inv: InvoiceNumber = "INV-20240315-0042".parse().unwrap();
    /// assert_eq!(inv.sequence, 42);
    /// assert_eq!(inv.to_string(), "INV-20240315-0042");
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "invoice_number".to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.trim().splitn(3, '-');
        let (Some(prefix), Some(day), Some(seq)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid("expected INV-YYYYMMDD-NNNN"));
        };

        if prefix != INVOICE_PREFIX {
            return Err(invalid("must start with INV-"));
        }
        let date = NaiveDate::parse_from_str(day, "%Y%m%d").map_err(|_| invalid("bad date"))?;
        if seq.len() < 4 || !seq.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("sequence must be at least four digits"));
        }
        let sequence: u32 = seq.parse().map_err(|_| invalid("sequence out of range"))?;
        if sequence == 0 {
            return Err(invalid("sequence starts at 0001"));
        }

        Ok(InvoiceNumber { date, sequence })
    }
}

// =============================================================================
// Policy
// =============================================================================

/// What to do when a sale line references a product that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnMissingProduct {
    /// Settle anyway, skip the stock update and log a warning.
    Skip,
    /// Reject the whole sale.
    Fail,
}

impl Default for OnMissingProduct {
    fn default() -> Self {
        OnMissingProduct::Skip
    }
}

impl FromStr for OnMissingProduct {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OnMissingProduct::Skip),
            "fail" => Ok(OnMissingProduct::Fail),
            _ => Err(ValidationError::not_allowed("on_missing_product", &["skip", "fail"])),
        }
    }
}

/// Store-level knobs for settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementPolicy {
    pub tax_rate: TaxRate,
    pub on_missing_product: OnMissingProduct,
    /// When false, a sale that would drive stock below zero is rejected.
    pub allow_negative_stock: bool,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        SettlementPolicy {
            tax_rate: TaxRate::zero(),
            on_missing_product: OnMissingProduct::Skip,
            allow_negative_stock: true,
        }
    }
}

// =============================================================================
// Draft
// =============================================================================

/// A sale as submitted by the register, before settlement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDraft {
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub price_tier: PriceTier,
    pub items: Vec<SaleItem>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub status: SaleStatus,
    /// Normally generated; imports may carry their own.
    pub invoice_number: Option<String>,
    pub terminal_name: Option<String>,
    pub cashier_name: Option<String>,
    pub notes: Option<String>,
}

impl SaleDraft {
    /// Intake validation. Runs before any write.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_item_count(self.items.len())?;

        for item in &self.items {
            validate_required("product_id", &item.product_id)?;
            validate_required("sku", &item.sku)?;
            validate_quantity(item.quantity)?;
            validate_price_cents("unit_price", item.unit_price_cents)?;
            validate_price_cents("subtotal", item.subtotal_cents)?;
            validate_price_cents("discount_amount", item.discount_amount_cents)?;

            if item.discount_amount_cents > item.subtotal_cents {
                return Err(ValidationError::InvalidFormat {
                    field: "discount_amount".to_string(),
                    reason: format!("exceeds subtotal on line {}", item.sku),
                });
            }
        }

        for payment in &self.payments {
            validate_payment_amount(payment.amount_cents)?;
        }

        if let Some(invoice) = &self.invoice_number {
            invoice.parse::<InvoiceNumber>()?;
        }

        Ok(())
    }

    /// Builds the settled sale: recomputes totals and stamps identity.
    pub fn finalize(
        mut self,
        id: String,
        invoice_number: String,
        tax_rate: TaxRate,
        created_at: DateTime<Utc>,
    ) -> Sale {
        let totals = compute_totals(&mut self.items, tax_rate);

        Sale {
            id,
            invoice_number,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            price_tier: self.price_tier,
            items: self.items,
            payments: self.payments,
            subtotal_cents: totals.subtotal.cents(),
            total_discount_cents: totals.total_discount.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            status: self.status,
            terminal_name: self.terminal_name,
            cashier_name: self.cashier_name,
            notes: self.notes,
            created_at,
        }
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Money summary of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub total_discount: Money,
    pub tax: Money,
    pub total: Money,
}

/// Recomputes each line total and the sale totals.
///
/// ## Example
/// ```rust
/// use grocer_core::settlement::compute_totals;
/// use grocer_core::types::{SaleItem, TaxRate};
///
/// let mut items = vec![SaleItem {
///     product_id: "p1".into(), sku: "RICE".into(), name: "Rice".into(),
///     category: None, quantity: 15.0, unit_price_cents: 10000,
///     subtotal_cents: 150000, discount_amount_cents: 7500,
///     discount_percent: 5.0, applied_rule: None, total_cents: 0,
/// }];
///
/// let totals = compute_totals(&mut items, TaxRate::zero());
/// assert_eq!(items[0].total_cents, 142500);
/// assert_eq!(totals.total.cents(), 142500);
/// ```
pub fn compute_totals(items: &mut [SaleItem], tax_rate: TaxRate) -> SaleTotals {
    let mut subtotal = Money::zero();
    let mut total_discount = Money::zero();

    for item in items.iter_mut() {
        item.total_cents = item.subtotal_cents - item.discount_amount_cents;
        subtotal += item.subtotal();
        total_discount += item.discount_amount();
    }

    let tax = (subtotal - total_discount).calculate_tax(tax_rate);

    SaleTotals {
        subtotal,
        total_discount,
        tax,
        total: subtotal - total_discount + tax,
    }
}

/// Note written on the inventory log of each sold line.
pub fn sale_log_note(invoice_number: &str) -> String {
    format!("Sale {invoice_number}")
}

// =============================================================================
// Unit Tests
// =============================================================================
