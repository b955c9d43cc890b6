//! # Discount Service
//!
//! Runs the grocer-core evaluator against the stored auto-apply rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::{DiscountRuleRepository, ProductRepository, SaleRepository};
use grocer_core::discount::{self, DiscountPolicy, DiscountUsage};
use grocer_core::validation::validate_quantity;
use grocer_core::{CoreError, PriceTier, SaleItem};

/// A product and quantity scanned at the register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: f64,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: f64) -> Self {
        CartLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscountService {
    pool: SqlitePool,
    policy: DiscountPolicy,
}

impl DiscountService {
    pub fn new(pool: SqlitePool, policy: DiscountPolicy) -> Self {
        DiscountService { pool, policy }
    }

    /// Re-evaluates discounts on `items`.
    ///
    /// Any discount already on a line is replaced, so calling this again
    /// after a cart edit gives the same result as a fresh evaluation.
    pub async fn apply_discounts(&self, items: Vec<SaleItem>, tier: PriceTier) -> DbResult<Vec<SaleItem>> {
        let rules = DiscountRuleRepository::new(self.pool.clone())
            .list_auto_apply()
            .await?;

        let items = discount::apply_discounts(items, tier, &rules, &self.policy);

        debug!(
            lines = items.len(),
            rules = rules.len(),
            tier = %tier,
            discounted = items.iter().filter(|i| i.applied_rule.is_some()).count(),
            "Discounts evaluated"
        );

        Ok(items)
    }

    /// Prices cart lines at `tier` from the catalogue, then discounts them.
    pub async fn price_cart(&self, lines: &[CartLine], tier: PriceTier) -> DbResult<Vec<SaleItem>> {
        let products = ProductRepository::new(self.pool.clone());
        let mut items = Vec::with_capacity(lines.len());

        for line in lines {
            validate_quantity(line.quantity)?;

            let product = products
                .get_by_id(&line.product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

            items.push(SaleItem::from_product(&product, line.quantity, tier));
        }

        self.apply_discounts(items, tier).await
    }

    /// Per-rule totals over completed sales in `[from, to)`.
    pub async fn usage_report(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<Vec<DiscountUsage>> {
        let sales = SaleRepository::new(self.pool.clone())
            .list_completed_between(from, to)
            .await?;

        Ok(discount::summarize_discount_usage(&sales))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::tests::product;
    use grocer_core::discount::{DiscountMechanism, DiscountScope, NewDiscountRule};
    use grocer_core::settlement::{SaleDraft, SettlementPolicy};
    use grocer_core::{ErrorKind, SaleStatus};

    fn rule(name: &str, scope: DiscountScope, mechanism: DiscountMechanism, min_qty: f64) -> NewDiscountRule {
        NewDiscountRule {
            name: name.into(),
            scope,
            mechanism,
            max_discount_cents: 0,
            min_quantity: min_qty,
            max_quantity: 0.0,
            auto_apply: true,
        }
    }

    async fn seeded() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rice = db.products().insert(&product("RICE-NADU", "Rice", 10000, 100.0)).await.unwrap();
        let sugar = db.products().insert(&product("SUGAR-1KG", "Sugar", 6750, 100.0)).await.unwrap();

        db.discount_rules()
            .create(rule(
                "Bulk Rice Discount",
                DiscountScope::Category("Rice".into()),
                DiscountMechanism::Percent { bps: 500 },
                10.0,
            ))
            .await
            .unwrap();
        db.discount_rules()
            .create(rule(
                "Wholesale Sugar Special",
                DiscountScope::Category("Sugar".into()),
                DiscountMechanism::Fixed { per_unit_cents: 5000 },
                20.0,
            ))
            .await
            .unwrap();

        (db, rice.id, sugar.id)
    }

    #[tokio::test]
    async fn test_bulk_rice_scenario() {
        let (db, rice, _) = seeded().await;

        let items = db
            .discounts(DiscountPolicy::default())
            .price_cart(&[CartLine::new(&rice, 15.0)], PriceTier::Retail)
            .await
            .unwrap();

        assert_eq!(items[0].subtotal_cents, 150000);
        assert_eq!(items[0].discount_amount_cents, 7500);
        assert_eq!(items[0].total_cents, 142500);
        assert_eq!(items[0].applied_rule.as_deref(), Some("Bulk Rice Discount"));
    }

    #[tokio::test]
    async fn test_fixed_sugar_scenario() {
        let (db, _, sugar) = seeded().await;
        let svc = db.discounts(DiscountPolicy::default());

        let items = svc
            .price_cart(&[CartLine::new(&sugar, 20.0)], PriceTier::Retail)
            .await
            .unwrap();
        assert_eq!(items[0].subtotal_cents, 135000);
        assert_eq!(items[0].discount_amount_cents, 100000);
        assert_eq!(items[0].total_cents, 35000);

        // Below the minimum quantity nothing applies
        let items = svc
            .price_cart(&[CartLine::new(&sugar, 19.0)], PriceTier::Retail)
            .await
            .unwrap();
        assert_eq!(items[0].discount_amount_cents, 0);
        assert!(items[0].applied_rule.is_none());
    }

    #[tokio::test]
    async fn test_reevaluation_is_idempotent() {
        let (db, rice, sugar) = seeded().await;
        let svc = db.discounts(DiscountPolicy::default());

        let once = svc
            .price_cart(&[CartLine::new(&rice, 12.0), CartLine::new(&sugar, 25.0)], PriceTier::Retail)
            .await
            .unwrap();
        let twice = svc.apply_discounts(once.clone(), PriceTier::Retail).await.unwrap();

        for (a, b) in once.iter().zip(&twice) {
            assert_eq!(a.discount_amount_cents, b.discount_amount_cents);
            assert_eq!(a.total_cents, b.total_cents);
            assert_eq!(a.applied_rule, b.applied_rule);
        }
    }

    #[tokio::test]
    async fn test_policy_excludes_tier() {
        let (db, rice, _) = seeded().await;
        let retail_only = DiscountPolicy {
            eligible_tiers: vec![PriceTier::Retail],
        };

        let items = db
            .discounts(retail_only)
            .price_cart(&[CartLine::new(&rice, 15.0)], PriceTier::Wholesale)
            .await
            .unwrap();

        assert_eq!(items[0].discount_amount_cents, 0);
        assert_eq!(items[0].total_cents, items[0].subtotal_cents);
    }

    #[tokio::test]
    async fn test_unknown_product_and_bad_quantity() {
        let (db, rice, _) = seeded().await;
        let svc = db.discounts(DiscountPolicy::default());

        let err = svc
            .price_cart(&[CartLine::new("ghost", 1.0)], PriceTier::Retail)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = svc
            .price_cart(&[CartLine::new(&rice, 0.0)], PriceTier::Retail)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_usage_report_over_settled_sales() {
        let (db, rice, sugar) = seeded().await;
        let svc = db.discounts(DiscountPolicy::default());
        let start = Utc::now() - chrono::Duration::minutes(1);

        let items = svc
            .price_cart(&[CartLine::new(&rice, 15.0), CartLine::new(&sugar, 2.0)], PriceTier::Retail)
            .await
            .unwrap();
        let draft = SaleDraft {
            customer_id: None,
            customer_name: None,
            price_tier: PriceTier::Retail,
            items,
            payments: vec![],
            status: SaleStatus::Completed,
            invoice_number: None,
            terminal_name: None,
            cashier_name: None,
            notes: None,
        };
        db.settlement(SettlementPolicy::default()).settle_sale(draft).await.unwrap();

        let report = svc
            .usage_report(start, Utc::now() + chrono::Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].rule_name, "Bulk Rice Discount");
        assert_eq!(report[0].lines, 1);
        assert_eq!(report[0].total_discount_cents, 7500);
    }
}
