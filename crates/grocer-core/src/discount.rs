//! # Discount Evaluator
//!
//! Picks and applies the single best auto-apply discount rule for each line
//! of a cart.
//!
//! ## Evaluation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for each SaleItem                                                      │
//! │                                                                         │
//! │   1. reset          discount = 0, total = subtotal, applied_rule = ∅   │
//! │        │                                                                │
//! │   2. match scope    Product(id|sku) │ Category(name) │ LineItem         │
//! │        │                                                                │
//! │   3. qty bounds     min_quantity ≤ qty ≤ max_quantity  (0 = unbounded) │
//! │        │                                                                │
//! │   4. amount         Percent: subtotal × bps   Fixed: value × qty       │
//! │        │            cap at max_discount, then at subtotal              │
//! │        │                                                                │
//! │   5. reduce         strictly largest amount wins, first rule on ties   │
//! │        │                                                                │
//! │   6. apply          discount_amount, discount_percent, total, rule     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rules never stack: a line carries at most one rule. Evaluation is pure
//! and idempotent, so a cart can be re-evaluated after every edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{PriceTier, Sale, SaleItem, SaleStatus};
use crate::validation::{validate_bps, validate_name, validate_price_cents, ValidationResult};

// =============================================================================
// Scope
// =============================================================================

/// Which lines a rule can apply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "scope", content = "target", rename_all = "snake_case")]
pub enum DiscountScope {
    /// Every line.
    LineItem,
    /// Lines whose product category equals the target.
    Category(String),
    /// Lines whose product id or sku equals the target.
    Product(String),
}

impl DiscountScope {
    /// Builds a scope from its stored `(scope, target)` pair.
    ///
    /// ## Example
    /// ```rust
    /// use grocer_core::discount::DiscountScope;
    ///
    /// let scope = DiscountScope::parse("category", Some("Rice")).unwrap();
    /// assert_eq!(scope, DiscountScope::Category("Rice".into()));
    ///
    /// assert!(DiscountScope::parse("brand", Some("Anchor")).is_err());
    /// assert!(DiscountScope::parse("product", None).is_err());
    /// ```
    pub fn parse(scope: &str, target: Option<&str>) -> ValidationResult<Self> {
        let target = target.map(str::trim).filter(|t| !t.is_empty());

        match scope.trim() {
            "line_item" => Ok(DiscountScope::LineItem),
            "category" => target
                .map(|t| DiscountScope::Category(t.to_string()))
                .ok_or_else(|| ValidationError::required("target")),
            "product" => target
                .map(|t| DiscountScope::Product(t.to_string()))
                .ok_or_else(|| ValidationError::required("target")),
            _ => Err(ValidationError::not_allowed(
                "scope",
                &["line_item", "category", "product"],
            )),
        }
    }

    /// Stored scope name.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscountScope::LineItem => "line_item",
            DiscountScope::Category(_) => "category",
            DiscountScope::Product(_) => "product",
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            DiscountScope::LineItem => None,
            DiscountScope::Category(t) | DiscountScope::Product(t) => Some(t),
        }
    }

    /// Whether this scope selects `item`.
    pub fn matches(&self, item: &SaleItem) -> bool {
        match self {
            DiscountScope::LineItem => true,
            DiscountScope::Category(name) => item.category.as_deref() == Some(name.as_str()),
            DiscountScope::Product(target) => item.product_id == *target || item.sku == *target,
        }
    }
}

// =============================================================================
// Mechanism
// =============================================================================

/// How a rule computes its discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountMechanism {
    /// Percentage of the line subtotal, in basis points.
    Percent { bps: u32 },
    /// Fixed amount per unit sold.
    Fixed { per_unit_cents: i64 },
}

impl DiscountMechanism {
    /// Builds a mechanism from its stored `(type, value)` pair.
    pub fn parse(kind: &str, value: i64) -> ValidationResult<Self> {
        match kind.trim() {
            "percent" | "percentage" => {
                let bps = u32::try_from(value).map_err(|_| ValidationError::OutOfRange {
                    field: "value".to_string(),
                    min: 0,
                    max: 10000,
                })?;
                Ok(DiscountMechanism::Percent { bps })
            }
            "fixed" => Ok(DiscountMechanism::Fixed {
                per_unit_cents: value,
            }),
            _ => Err(ValidationError::not_allowed("type", &["percent", "fixed"])),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DiscountMechanism::Percent { .. } => "percent",
            DiscountMechanism::Fixed { .. } => "fixed",
        }
    }

    /// Stored value: bps for percent, cents for fixed.
    pub fn value(&self) -> i64 {
        match self {
            DiscountMechanism::Percent { bps } => *bps as i64,
            DiscountMechanism::Fixed { per_unit_cents } => *per_unit_cents,
        }
    }

    /// Uncapped discount for a line.
    fn raw_amount(&self, item: &SaleItem) -> Money {
        match self {
            DiscountMechanism::Percent { bps } => item.subtotal().percentage(*bps),
            DiscountMechanism::Fixed { per_unit_cents } => {
                Money::from_cents(*per_unit_cents).multiply_fractional(item.quantity)
            }
        }
    }
}

// =============================================================================
// Rules
// =============================================================================

/// A stored discount rule.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRule {
    pub id: String,
    pub name: String,
    pub scope: DiscountScope,
    pub mechanism: DiscountMechanism,
    /// Per-line cap. Zero means uncapped.
    pub max_discount_cents: i64,
    /// Zero means no lower bound.
    pub min_quantity: f64,
    /// Zero means no upper bound.
    pub max_quantity: f64,
    /// Only auto-apply rules are considered by the evaluator.
    pub auto_apply: bool,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl DiscountRule {
    /// Whether the evaluator may pick this rule at all.
    #[inline]
    pub fn is_eligible(&self) -> bool {
        self.auto_apply && self.is_active
    }

    fn quantity_in_bounds(&self, qty: f64) -> bool {
        if self.min_quantity > 0.0 && qty < self.min_quantity {
            return false;
        }
        if self.max_quantity > 0.0 && qty > self.max_quantity {
            return false;
        }
        true
    }

    /// Discount this rule would give `item`, or `None` when it does not
    /// apply.
    ///
    /// The amount is capped at `max_discount` and never exceeds the line
    /// subtotal.
    pub fn discount_for(&self, item: &SaleItem) -> Option<Money> {
        if !self.scope.matches(item) || !self.quantity_in_bounds(item.quantity) {
            return None;
        }

        let mut amount = self.mechanism.raw_amount(item);
        if self.max_discount_cents > 0 {
            amount = amount.min(Money::from_cents(self.max_discount_cents));
        }

        Some(amount.min(item.subtotal()).max(Money::zero()))
    }

    /// Validates an edited rule before it is stored.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_terms(
            &self.name,
            &self.mechanism,
            self.max_discount_cents,
            self.min_quantity,
            self.max_quantity,
        )
    }
}

/// A rule as submitted for creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewDiscountRule {
    pub name: String,
    pub scope: DiscountScope,
    pub mechanism: DiscountMechanism,
    #[serde(default)]
    pub max_discount_cents: i64,
    #[serde(default)]
    pub min_quantity: f64,
    #[serde(default)]
    pub max_quantity: f64,
    #[serde(default = "default_auto_apply")]
    pub auto_apply: bool,
}

fn default_auto_apply() -> bool {
    true
}

impl NewDiscountRule {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_terms(
            &self.name,
            &self.mechanism,
            self.max_discount_cents,
            self.min_quantity,
            self.max_quantity,
        )
    }
}

fn validate_terms(
    name: &str,
    mechanism: &DiscountMechanism,
    max_discount_cents: i64,
    min_quantity: f64,
    max_quantity: f64,
) -> ValidationResult<()> {
    validate_name("name", name)?;

    match mechanism {
        DiscountMechanism::Percent { bps } => validate_bps("value", *bps)?,
        DiscountMechanism::Fixed { per_unit_cents } => validate_price_cents("value", *per_unit_cents)?,
    }

    validate_price_cents("max_discount", max_discount_cents)?;

    for (field, qty) in [("min_quantity", min_quantity), ("max_quantity", max_quantity)] {
        if !qty.is_finite() || qty < 0.0 {
            return Err(ValidationError::InvalidFormat {
                field: field.to_string(),
                reason: "must be a finite, non-negative number".to_string(),
            });
        }
    }

    if min_quantity > 0.0 && max_quantity > 0.0 && min_quantity > max_quantity {
        return Err(ValidationError::InvalidFormat {
            field: "max_quantity".to_string(),
            reason: "must not be below min_quantity".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Policy
// =============================================================================

/// Which carts the evaluator discounts at all.
///
/// Defaults to every price tier. A store that prices wholesale carts net
/// can restrict this to `[Retail]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountPolicy {
    pub eligible_tiers: Vec<PriceTier>,
}

impl DiscountPolicy {
    pub fn allows(&self, tier: PriceTier) -> bool {
        self.eligible_tiers.contains(&tier)
    }
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        DiscountPolicy {
            eligible_tiers: PriceTier::ALL.to_vec(),
        }
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Applies the best eligible rule to every line.
///
/// ## Example
/// ```rust
/// # use chrono::Utc;
/// use grocer_core::discount::{apply_discounts, DiscountMechanism, DiscountPolicy, DiscountRule, DiscountScope};
/// use grocer_core::types::{PriceTier, SaleItem};
///
/// let rule = DiscountRule {
///     id: "r1".into(),
///     name: "Bulk Rice Discount".into(),
///     scope: DiscountScope::Category("Rice".into()),
///     mechanism: DiscountMechanism::Percent { bps: 500 },
///     max_discount_cents: 0,
///     min_quantity: 10.0,
///     max_quantity: 0.0,
///     auto_apply: true,
///     is_active: true,
///     created_at: Utc::now(),
/// };
/// let item = SaleItem {
///     product_id: "p1".into(), sku: "RICE-NADU".into(), name: "Nadu".into(),
///     category: Some("Rice".into()), quantity: 15.0, unit_price_cents: 10000,
///     subtotal_cents: 150000, discount_amount_cents: 0, discount_percent: 0.0,
///     applied_rule: None, total_cents: 150000,
/// };
///
/// let items = apply_discounts(vec![item], PriceTier::Retail, &[rule], &DiscountPolicy::default());
/// assert_eq!(items[0].discount_amount_cents, 7500);
/// assert_eq!(items[0].total_cents, 142500);
/// ```
pub fn apply_discounts(
    mut items: Vec<SaleItem>,
    tier: PriceTier,
    rules: &[DiscountRule],
    policy: &DiscountPolicy,
) -> Vec<SaleItem> {
    let allowed = policy.allows(tier);

    for item in &mut items {
        item.clear_discount();
        if allowed {
            apply_best_rule(item, rules);
        }
    }

    items
}

/// Picks the best rule for one line and writes it into the line.
///
/// Returns the winning rule, if any.
pub fn apply_best_rule<'r>(item: &mut SaleItem, rules: &'r [DiscountRule]) -> Option<&'r DiscountRule> {
    item.clear_discount();

    let (amount, rule) = best_rule(item, rules)?;
    let subtotal = item.subtotal();

    item.discount_amount_cents = amount.cents();
    item.discount_percent = if subtotal.is_zero() {
        0.0
    } else {
        amount.cents() as f64 / subtotal.cents() as f64 * 100.0
    };
    item.total_cents = (subtotal - amount).cents();
    item.applied_rule = Some(rule.name.clone());

    Some(rule)
}

fn best_rule<'r>(item: &SaleItem, rules: &'r [DiscountRule]) -> Option<(Money, &'r DiscountRule)> {
    rules
        .iter()
        .filter(|rule| rule.is_eligible())
        .filter_map(|rule| rule.discount_for(item).map(|amount| (amount, rule)))
        .fold(None, |best, (amount, rule)| match best {
            Some((best_amount, _)) if amount <= best_amount => best,
            _ if amount.is_positive() => Some((amount, rule)),
            _ => best,
        })
}

// =============================================================================
// Usage Report
// =============================================================================

/// How much one rule gave away across a set of sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountUsage {
    pub rule_name: String,
    /// Number of lines the rule was applied to.
    pub lines: u64,
    /// Number of distinct sales the rule appeared on.
    pub sales: u64,
    pub total_discount_cents: i64,
}

/// Summarizes applied rules over completed sales, largest give-away first.
pub fn summarize_discount_usage(sales: &[Sale]) -> Vec<DiscountUsage> {
    let mut by_rule: BTreeMap<&str, DiscountUsage> = BTreeMap::new();

    for sale in sales.iter().filter(|s| s.status == SaleStatus::Completed) {
        let mut seen_on_sale: Vec<&str> = Vec::new();

        for item in &sale.items {
            let Some(rule_name) = item.applied_rule.as_deref() else {
                continue;
            };

            let usage = by_rule.entry(rule_name).or_insert_with(|| DiscountUsage {
                rule_name: rule_name.to_string(),
                lines: 0,
                sales: 0,
                total_discount_cents: 0,
            });
            usage.lines += 1;
            usage.total_discount_cents += item.discount_amount_cents;

            if !seen_on_sale.contains(&rule_name) {
                seen_on_sale.push(rule_name);
                usage.sales += 1;
            }
        }
    }

    let mut report: Vec<DiscountUsage> = by_rule.into_values().collect();
    report.sort_by(|a, b| b.total_discount_cents.cmp(&a.total_discount_cents));
    report
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: &str, sku: &str, category: Option<&str>, qty: f64, subtotal: i64) -> SaleItem {
        SaleItem {
            product_id: product_id.to_string(),
            sku: sku.to_string(),
            name: sku.to_string(),
            category: category.map(str::to_string),
            quantity: qty,
            unit_price_cents: (subtotal as f64 / qty).round() as i64,
            subtotal_cents: subtotal,
            discount_amount_cents: 0,
            discount_percent: 0.0,
            applied_rule: None,
            total_cents: subtotal,
        }
    }

    fn rule(name: &str, scope: DiscountScope, mechanism: DiscountMechanism) -> DiscountRule {
        DiscountRule {
            id: format!("rule-{name}"),
            name: name.to_string(),
            scope,
            mechanism,
            max_discount_cents: 0,
            min_quantity: 0.0,
            max_quantity: 0.0,
            auto_apply: true,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn bulk_rice() -> DiscountRule {
        DiscountRule {
            min_quantity: 10.0,
            ..rule(
                "Bulk Rice Discount",
                DiscountScope::Category("Rice".into()),
                DiscountMechanism::Percent { bps: 500 },
            )
        }
    }

    fn evaluate(items: Vec<SaleItem>, rules: &[DiscountRule]) -> Vec<SaleItem> {
        apply_discounts(items, PriceTier::Retail, rules, &DiscountPolicy::default())
    }

    #[test]
    fn test_category_percent_rule() {
        let out = evaluate(vec![item("p1", "RICE", Some("Rice"), 15.0, 150000)], &[bulk_rice()]);

        assert_eq!(out[0].discount_amount_cents, 7500);
        assert_eq!(out[0].total_cents, 142500);
        assert!((out[0].discount_percent - 5.0).abs() < 1e-9);
        assert_eq!(out[0].applied_rule.as_deref(), Some("Bulk Rice Discount"));
    }

    #[test]
    fn test_min_quantity_blocks_rule() {
        let out = evaluate(vec![item("p1", "RICE", Some("Rice"), 9.0, 90000)], &[bulk_rice()]);

        assert_eq!(out[0].discount_amount_cents, 0);
        assert_eq!(out[0].total_cents, 90000);
        assert!(out[0].applied_rule.is_none());
    }

    #[test]
    fn test_max_quantity_blocks_rule() {
        let capped_qty = DiscountRule {
            max_quantity: 5.0,
            ..rule(
                "Small Basket",
                DiscountScope::LineItem,
                DiscountMechanism::Percent { bps: 1000 },
            )
        };

        let out = evaluate(
            vec![item("p1", "A", None, 5.0, 5000), item("p2", "B", None, 6.0, 6000)],
            &[capped_qty],
        );

        assert_eq!(out[0].discount_amount_cents, 500);
        assert_eq!(out[1].discount_amount_cents, 0);
    }

    #[test]
    fn test_fixed_rule_below_subtotal() {
        let sugar = DiscountRule {
            min_quantity: 20.0,
            ..rule(
                "Wholesale Sugar Special",
                DiscountScope::Category("Sugar".into()),
                DiscountMechanism::Fixed { per_unit_cents: 5000 },
            )
        };

        let out = evaluate(vec![item("p1", "SUGAR", Some("Sugar"), 20.0, 135000)], &[sugar]);

        assert_eq!(out[0].discount_amount_cents, 100000);
        assert_eq!(out[0].total_cents, 35000);
    }

    #[test]
    fn test_fixed_rule_clamped_to_subtotal() {
        let generous = rule(
            "Clearance",
            DiscountScope::Category("Sugar".into()),
            DiscountMechanism::Fixed { per_unit_cents: 10000 },
        );

        let out = evaluate(vec![item("p1", "SUGAR", Some("Sugar"), 20.0, 135000)], &[generous]);

        assert_eq!(out[0].discount_amount_cents, 135000);
        assert_eq!(out[0].total_cents, 0);
        assert!((out[0].discount_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_discount_caps_amount() {
        let general = DiscountRule {
            max_discount_cents: 10000,
            min_quantity: 5.0,
            ..rule(
                "General Line Item Discount",
                DiscountScope::LineItem,
                DiscountMechanism::Percent { bps: 200 },
            )
        };

        // 2% of 10,000.00 = 200.00, capped at 100.00
        let out = evaluate(vec![item("p1", "OIL", None, 10.0, 1_000_000)], &[general]);
        assert_eq!(out[0].discount_amount_cents, 10000);
        assert_eq!(out[0].total_cents, 990000);
    }

    #[test]
    fn test_product_rule_matches_id_or_sku() {
        let by_sku = rule(
            "Milk Promo",
            DiscountScope::Product("MILK-1L".into()),
            DiscountMechanism::Fixed { per_unit_cents: 2000 },
        );
        let by_id = rule(
            "Bread Promo",
            DiscountScope::Product("p-bread".into()),
            DiscountMechanism::Fixed { per_unit_cents: 1000 },
        );

        let out = evaluate(
            vec![
                item("p-milk", "MILK-1L", None, 2.0, 80000),
                item("p-bread", "BREAD", None, 1.0, 20000),
                item("p-eggs", "EGGS", None, 1.0, 50000),
            ],
            &[by_sku, by_id],
        );

        assert_eq!(out[0].discount_amount_cents, 4000);
        assert_eq!(out[1].discount_amount_cents, 1000);
        assert_eq!(out[2].discount_amount_cents, 0);
    }

    #[test]
    fn test_best_rule_wins_without_stacking() {
        let general = rule(
            "General",
            DiscountScope::LineItem,
            DiscountMechanism::Percent { bps: 200 },
        );

        let out = evaluate(
            vec![item("p1", "RICE", Some("Rice"), 15.0, 150000)],
            &[general, bulk_rice()],
        );

        // 5% beats 2%, and only one rule is applied
        assert_eq!(out[0].discount_amount_cents, 7500);
        assert_eq!(out[0].applied_rule.as_deref(), Some("Bulk Rice Discount"));
    }

    #[test]
    fn test_tie_keeps_first_rule() {
        let first = rule("First", DiscountScope::LineItem, DiscountMechanism::Percent { bps: 500 });
        let second = rule(
            "Second",
            DiscountScope::Category("Rice".into()),
            DiscountMechanism::Percent { bps: 500 },
        );

        let out = evaluate(vec![item("p1", "RICE", Some("Rice"), 1.0, 10000)], &[first, second]);
        assert_eq!(out[0].applied_rule.as_deref(), Some("First"));
    }

    #[test]
    fn test_zero_discount_never_applied() {
        let nothing = rule("Nothing", DiscountScope::LineItem, DiscountMechanism::Percent { bps: 0 });

        let out = evaluate(vec![item("p1", "A", None, 1.0, 10000)], &[nothing]);
        assert!(out[0].applied_rule.is_none());
    }

    #[test]
    fn test_inactive_and_manual_rules_ignored() {
        let inactive = DiscountRule {
            is_active: false,
            ..rule("Old", DiscountScope::LineItem, DiscountMechanism::Percent { bps: 5000 })
        };
        let manual = DiscountRule {
            auto_apply: false,
            ..rule("Manager", DiscountScope::LineItem, DiscountMechanism::Percent { bps: 5000 })
        };

        let out = evaluate(vec![item("p1", "A", None, 1.0, 10000)], &[inactive, manual]);
        assert_eq!(out[0].discount_amount_cents, 0);
    }

    #[test]
    fn test_zero_subtotal_line() {
        let fixed = rule("Fixed", DiscountScope::LineItem, DiscountMechanism::Fixed { per_unit_cents: 100 });

        let out = evaluate(vec![item("p1", "FREEBIE", None, 1.0, 0)], &[fixed]);
        assert_eq!(out[0].discount_amount_cents, 0);
        assert_eq!(out[0].discount_percent, 0.0);
        assert_eq!(out[0].total_cents, 0);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let rules = [
            bulk_rice(),
            rule("General", DiscountScope::LineItem, DiscountMechanism::Percent { bps: 200 }),
        ];
        let items = vec![
            item("p1", "RICE", Some("Rice"), 15.0, 150000),
            item("p2", "DHAL", Some("Pulses"), 3.0, 120000),
        ];

        let once = evaluate(items, &rules);
        let twice = evaluate(once.clone(), &rules);

        for (a, b) in once.iter().zip(&twice) {
            assert_eq!(a.discount_amount_cents, b.discount_amount_cents);
            assert_eq!(a.total_cents, b.total_cents);
            assert_eq!(a.applied_rule, b.applied_rule);
        }
    }

    #[test]
    fn test_stale_discount_is_reset() {
        let mut stale = item("p1", "A", None, 1.0, 10000);
        stale.discount_amount_cents = 9999;
        stale.total_cents = 1;
        stale.applied_rule = Some("Deleted Rule".into());

        let out = evaluate(vec![stale], &[]);
        assert_eq!(out[0].discount_amount_cents, 0);
        assert_eq!(out[0].total_cents, 10000);
        assert!(out[0].applied_rule.is_none());
    }

    #[test]
    fn test_policy_gates_tiers() {
        let retail_only = DiscountPolicy {
            eligible_tiers: vec![PriceTier::Retail],
        };
        let items = vec![item("p1", "RICE", Some("Rice"), 15.0, 150000)];

        let wholesale = apply_discounts(items.clone(), PriceTier::Wholesale, &[bulk_rice()], &retail_only);
        assert_eq!(wholesale[0].discount_amount_cents, 0);

        let retail = apply_discounts(items, PriceTier::Retail, &[bulk_rice()], &retail_only);
        assert_eq!(retail[0].discount_amount_cents, 7500);
    }

    #[test]
    fn test_totals_and_caps_hold_across_lines() {
        let capped = DiscountRule {
            max_discount_cents: 2500,
            ..rule("Capped", DiscountScope::LineItem, DiscountMechanism::Percent { bps: 1500 })
        };
        let fixed = rule(
            "Per Unit",
            DiscountScope::Category("Snacks".into()),
            DiscountMechanism::Fixed { per_unit_cents: 750 },
        );
        let rules = [capped.clone(), fixed];

        let items: Vec<SaleItem> = (1..=40)
            .map(|n| {
                let category = if n % 3 == 0 { Some("Snacks") } else { None };
                item(&format!("p{n}"), &format!("SKU{n}"), category, n as f64 * 0.5, n * 1337)
            })
            .collect();

        for line in evaluate(items, &rules) {
            assert_eq!(line.total_cents, line.subtotal_cents - line.discount_amount_cents);
            assert!(line.discount_amount_cents <= line.subtotal_cents);
            if line.applied_rule.as_deref() == Some("Capped") {
                assert!(line.discount_amount_cents <= capped.max_discount_cents);
            }
        }
    }

    #[test]
    fn test_scope_parse_round_trip_names() {
        let scope = DiscountScope::parse("product", Some(" SUGAR-1KG ")).unwrap();
        assert_eq!(scope.kind(), "product");
        assert_eq!(scope.target(), Some("SUGAR-1KG"));
        assert_eq!(DiscountScope::parse("line_item", None).unwrap(), DiscountScope::LineItem);
        assert!(DiscountScope::parse("category", Some("  ")).is_err());
    }

    #[test]
    fn test_mechanism_parse() {
        assert_eq!(
            DiscountMechanism::parse("percent", 500).unwrap(),
            DiscountMechanism::Percent { bps: 500 }
        );
        assert_eq!(DiscountMechanism::parse("fixed", 5000).unwrap().value(), 5000);
        assert!(DiscountMechanism::parse("percent", -1).is_err());
        assert!(DiscountMechanism::parse("bogo", 1).is_err());
    }

    #[test]
    fn test_new_rule_validation() {
        let valid = NewDiscountRule {
            name: "Bulk Rice Discount".into(),
            scope: DiscountScope::Category("Rice".into()),
            mechanism: DiscountMechanism::Percent { bps: 500 },
            max_discount_cents: 0,
            min_quantity: 10.0,
            max_quantity: 0.0,
            auto_apply: true,
        };
        assert!(valid.validate().is_ok());

        let over_100 = NewDiscountRule {
            mechanism: DiscountMechanism::Percent { bps: 12000 },
            ..valid.clone()
        };
        assert!(over_100.validate().is_err());

        let inverted = NewDiscountRule {
            min_quantity: 10.0,
            max_quantity: 5.0,
            ..valid.clone()
        };
        assert!(inverted.validate().is_err());

        let unnamed = NewDiscountRule {
            name: " ".into(),
            ..valid
        };
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_scope_serde_shape() {
        let json = serde_json::to_value(DiscountScope::Category("Rice".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "scope": "category", "target": "Rice" }));
    }

    #[test]
    fn test_usage_report_counts_completed_sales_only() {
        let discounted = |rule: &str, cents: i64| SaleItem {
            discount_amount_cents: cents,
            applied_rule: Some(rule.to_string()),
            ..item("p1", "A", None, 1.0, 100000)
        };
        let sale = |status: SaleStatus, items: Vec<SaleItem>| Sale {
            id: "s".into(),
            invoice_number: "INV-20240101-0001".into(),
            customer_id: None,
            customer_name: None,
            price_tier: PriceTier::Retail,
            items,
            payments: vec![],
            subtotal_cents: 0,
            total_discount_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            status,
            terminal_name: None,
            cashier_name: None,
            notes: None,
            created_at: Utc::now(),
        };

        let sales = vec![
            sale(
                SaleStatus::Completed,
                vec![discounted("Bulk", 500), discounted("Bulk", 700), discounted("General", 100)],
            ),
            sale(SaleStatus::Completed, vec![discounted("General", 200)]),
            sale(SaleStatus::Hold, vec![discounted("Bulk", 99999)]),
        ];

        let report = summarize_discount_usage(&sales);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].rule_name, "Bulk");
        assert_eq!(report[0].lines, 2);
        assert_eq!(report[0].sales, 1);
        assert_eq!(report[0].total_discount_cents, 1200);
        assert_eq!(report[1].rule_name, "General");
        assert_eq!(report[1].sales, 2);
        assert_eq!(report[1].total_discount_cents, 300);
    }
}
