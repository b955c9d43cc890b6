//! # Domain Types
//!
//! Core domain types used throughout Grocer POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  sku, barcodes  │   │  invoice_number │   │  loyalty_points │       │
//! │  │  4 price tiers  │   │  items[]        │   │  lifetime pts   │       │
//! │  │  stock (f64)    │   │  payments[]     │   │  loyalty_tier   │       │
//! │  └────────┬────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │           │ mutated by          │ writes              │ audited by     │
//! │           ▼                     ▼                     ▼                │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  InventoryLog   │◄──│   settlement    │   │ LoyaltyTxn      │       │
//! │  │  receive/adjust │   │                 │   │  earn / redeem  │       │
//! │  │  /sale          │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Discount rules live in [`crate::discount`]; loyalty settings in
//! [`crate::loyalty`].
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4, immutable, used for relations
//! - Business ID: sku, invoice_number, phone

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1800 bps = 18% VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Price Tier
// =============================================================================

/// Which of a product's four prices a sale is rung up at.
///
/// The tier also gates discount eligibility through
/// [`DiscountPolicy`](crate::discount::DiscountPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Retail,
    Wholesale,
    Credit,
    Other,
}

impl PriceTier {
    /// Every tier, in display order.
    pub const ALL: [PriceTier; 4] = [
        PriceTier::Retail,
        PriceTier::Wholesale,
        PriceTier::Credit,
        PriceTier::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTier::Retail => "retail",
            PriceTier::Wholesale => "wholesale",
            PriceTier::Credit => "credit",
            PriceTier::Other => "other",
        }
    }
}

impl Default for PriceTier {
    fn default() -> Self {
        PriceTier::Retail
    }
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PriceTier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ValidationError::not_allowed(
                    "price_tier",
                    &["retail", "wholesale", "credit", "other"],
                )
            })
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// All barcodes printed on this product's packaging.
    pub barcodes: Vec<String>,

    /// English display name.
    pub name_en: String,

    /// Sinhala display name.
    pub name_si: Option<String>,

    /// Tamil display name.
    pub name_ta: Option<String>,

    /// Selling unit ("pcs", "kg", "l").
    pub unit: String,

    /// Category name, matched by category-scoped discount rules.
    pub category: Option<String>,

    pub price_retail_cents: i64,
    pub price_wholesale_cents: i64,
    pub price_credit_cents: i64,
    pub price_other_cents: i64,

    /// Current stock level. Fractional for weighed goods; may go negative
    /// when the store allows selling past zero.
    pub stock: f64,

    /// Stock at or below this level raises a low-stock alert.
    pub reorder_level: f64,

    /// Sold by weight from a scale.
    pub weight_based: bool,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price for a tier.
    pub fn price_for(&self, tier: PriceTier) -> Money {
        Money::from_cents(match tier {
            PriceTier::Retail => self.price_retail_cents,
            PriceTier::Wholesale => self.price_wholesale_cents,
            PriceTier::Credit => self.price_credit_cents,
            PriceTier::Other => self.price_other_cents,
        })
    }

    /// Stock is at or below the reorder level.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.reorder_level
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Paid and finalized; stock is deducted.
    Completed,
    /// Parked at the register to be resumed later.
    Hold,
    /// Abandoned before payment.
    Cancelled,
}

impl SaleStatus {
    /// Only completed sales move stock.
    #[inline]
    pub fn affects_inventory(&self) -> bool {
        matches!(self, SaleStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Hold => "hold",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Completed
    }
}

// =============================================================================
// Payment
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// LankaQR / bank app transfer.
    Qr,
    Other,
}

/// A payment towards a sale.
/// A sale can have multiple payments for split tender.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// Card auth code, QR transaction id, etc.
    pub reference: Option<String>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
///
/// Product data (sku, name, category, price) is snapshotted when the line
/// is created so later product edits never rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    /// Snapshotted for category-scoped discount matching.
    pub category: Option<String>,
    pub quantity: f64,
    pub unit_price_cents: i64,
    /// `unit_price × quantity`, before discount.
    pub subtotal_cents: i64,
    pub discount_amount_cents: i64,
    /// Discount as a percentage of subtotal (display only).
    pub discount_percent: f64,
    /// Name of the discount rule that produced `discount_amount_cents`.
    pub applied_rule: Option<String>,
    /// `subtotal - discount_amount`.
    pub total_cents: i64,
}

impl SaleItem {
    /// Builds an undiscounted line priced at `tier`.
    ///
    /// ## Example
    /// ```rust
    /// # use chrono::Utc;
    /// # use grocer_core::types::{PriceTier, Product, SaleItem};
    /// # let product = Product {
    /// #     id: "p1".into(), sku: "SUGAR-1KG".into(), barcodes: vec![],
    /// #     name_en: "White Sugar 1kg".into(), name_si: None, name_ta: None,
    /// #     unit: "pcs".into(), category: Some("Sugar".into()),
    /// #     price_retail_cents: 27000, price_wholesale_cents: 25000,
    /// #     price_credit_cents: 28000, price_other_cents: 27000,
    /// #     stock: 100.0, reorder_level: 10.0, weight_based: false,
    /// #     is_active: true, created_at: Utc::now(), updated_at: Utc::now(),
    /// # };
    /// let item = SaleItem::from_product(&product, 2.0, PriceTier::Wholesale);
    /// assert_eq!(item.subtotal_cents, 50000);
    /// assert_eq!(item.total_cents, 50000);
    /// ```
    pub fn from_product(product: &Product, quantity: f64, tier: PriceTier) -> Self {
        let unit_price = product.price_for(tier);
        let subtotal = unit_price.multiply_fractional(quantity);

        SaleItem {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name_en.clone(),
            category: product.category.clone(),
            quantity,
            unit_price_cents: unit_price.cents(),
            subtotal_cents: subtotal.cents(),
            discount_amount_cents: 0,
            discount_percent: 0.0,
            applied_rule: None,
            total_cents: subtotal.cents(),
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount_amount(&self) -> Money {
        Money::from_cents(self.discount_amount_cents)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Clears any applied discount.
    pub fn clear_discount(&mut self) {
        self.discount_amount_cents = 0;
        self.discount_percent = 0.0;
        self.applied_rule = None;
        self.total_cents = self.subtotal_cents;
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A settled sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// `INV-YYYYMMDD-NNNN`, unique.
    pub invoice_number: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub price_tier: PriceTier,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
    pub subtotal_cents: i64,
    pub total_discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: SaleStatus,
    pub terminal_name: Option<String>,
    pub cashier_name: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Sum of all payments.
    pub fn amount_paid(&self) -> Money {
        self.payments.iter().map(Payment::amount).sum()
    }
}

// =============================================================================
// Inventory Log
// =============================================================================

/// What caused a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InventoryLogType {
    /// Goods received (GRN).
    Receive,
    /// Stock count correction.
    Adjust,
    /// Deducted by a completed sale.
    Sale,
}

/// Immutable audit row, one per stock mutation.
///
/// `new_stock - previous_stock == quantity` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryLog {
    pub id: String,
    pub product_id: String,
    pub log_type: InventoryLogType,
    /// Signed delta: negative for sales.
    pub quantity: f64,
    pub previous_stock: f64,
    pub new_stock: f64,
    /// Invoice number for sales, GRN number for receipts.
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Customer & Loyalty
// =============================================================================

/// Loyalty tier, derived from lifetime points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    pub const ALL: [LoyaltyTier; 4] = [
        LoyaltyTier::Bronze,
        LoyaltyTier::Silver,
        LoyaltyTier::Gold,
        LoyaltyTier::Platinum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoyaltyTier::Bronze => "bronze",
            LoyaltyTier::Silver => "silver",
            LoyaltyTier::Gold => "gold",
            LoyaltyTier::Platinum => "platinum",
        }
    }
}

impl Default for LoyaltyTier {
    fn default() -> Self {
        LoyaltyTier::Bronze
    }
}

impl fmt::Display for LoyaltyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Tier the register defaults to for this customer.
    pub price_tier: PriceTier,
    /// Spendable balance. Never negative.
    pub loyalty_points: f64,
    /// Total ever earned. Never decreases.
    pub lifetime_loyalty_points: f64,
    pub loyalty_tier: LoyaltyTier,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTransactionType {
    Earn,
    Redeem,
}

/// Immutable audit row for a points movement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyTransaction {
    pub id: String,
    pub customer_id: String,
    pub transaction_type: LoyaltyTransactionType,
    /// Signed delta: negative for redemptions.
    pub points: f64,
    pub balance_after: f64,
    /// Invoice number of the sale that triggered the movement.
    pub reference: Option<String>,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rice() -> Product {
        Product {
            id: "p-rice".to_string(),
            sku: "RICE-SAMBA".to_string(),
            barcodes: vec!["4790000000011".to_string()],
            name_en: "Samba Rice".to_string(),
            name_si: None,
            name_ta: None,
            unit: "kg".to_string(),
            category: Some("Rice".to_string()),
            price_retail_cents: 26000,
            price_wholesale_cents: 24000,
            price_credit_cents: 27000,
            price_other_cents: 26000,
            stock: 12.0,
            reorder_level: 20.0,
            weight_based: true,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(1800);
        assert_eq!(rate.bps(), 1800);
        assert!((rate.percentage() - 18.0).abs() < 0.001);
    }

    #[test]
    fn test_price_for_tier() {
        let product = rice();
        assert_eq!(product.price_for(PriceTier::Retail).cents(), 26000);
        assert_eq!(product.price_for(PriceTier::Wholesale).cents(), 24000);
        assert_eq!(product.price_for(PriceTier::Credit).cents(), 27000);
        assert!(product.is_low_stock());
    }

    #[test]
    fn test_price_tier_parse() {
        assert_eq!("wholesale".parse::<PriceTier>().unwrap(), PriceTier::Wholesale);
        assert_eq!(" Retail ".parse::<PriceTier>().unwrap(), PriceTier::Retail);
        assert!("vip".parse::<PriceTier>().is_err());
    }

    #[test]
    fn test_sale_item_from_weighed_product() {
        let item = SaleItem::from_product(&rice(), 2.5, PriceTier::Retail);
        assert_eq!(item.subtotal_cents, 65000);
        assert_eq!(item.total_cents, 65000);
        assert_eq!(item.category.as_deref(), Some("Rice"));
        assert!(item.applied_rule.is_none());
    }

    #[test]
    fn test_only_completed_sales_affect_inventory() {
        assert!(SaleStatus::Completed.affects_inventory());
        assert!(!SaleStatus::Hold.affects_inventory());
        assert!(!SaleStatus::Cancelled.affects_inventory());
        assert_eq!(SaleStatus::default(), SaleStatus::Completed);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentMethod::Qr).unwrap(), "\"qr\"");
        assert_eq!(
            serde_json::to_string(&InventoryLogType::Receive).unwrap(),
            "\"receive\""
        );
        assert_eq!(LoyaltyTier::Platinum.to_string(), "platinum");
    }
}
