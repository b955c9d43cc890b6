//! # Loyalty Service
//!
//! Earning and redeeming points against customer balances.
//!
//! ## Earn
//! ```text
//! BEGIN
//!   settings ─┐
//!   customer ─┼─► plan_earn (grocer-core) ─► None?  → zero outcome, no write
//!             │                             Some(plan)
//!             │                                │
//!             └── lifetime read here ──► UPDATE … WHERE lifetime = read
//!                                              │ 0 rows → ConcurrentUpdate
//!                                              ▼
//!                                        INSERT earn transaction
//! COMMIT
//! ```
//!
//! ## Redeem
//! ```text
//! BEGIN
//!   settings + customer ─► plan_redemption ─► points capped by sale share
//!   UPDATE … SET points = points - n WHERE points >= n
//!   INSERT redeem transaction (negative delta)
//! COMMIT
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::{CustomerRepository, LoyaltyRepository};
use grocer_core::loyalty::{
    earn_description, plan_earn, plan_redemption, redeem_description, tier_for, CustomerPoints,
    EarnOutcome, LoyaltySettings, LoyaltyStats, PointsSnapshot, RedeemOutcome,
};
use grocer_core::{
    CoreError, LoyaltyTransaction, LoyaltyTransactionType, Money, Sale, SaleStatus,
    ValidationError,
};

#[derive(Debug, Clone)]
pub struct LoyaltyService {
    pool: SqlitePool,
}

impl LoyaltyService {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyService { pool }
    }

    fn records(&self) -> LoyaltyRepository {
        LoyaltyRepository::new(self.pool.clone())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn settings(&self) -> DbResult<LoyaltySettings> {
        self.records().settings().await
    }

    /// Validates and stores new program settings.
    ///
    /// Stored tiers are re-derived under the new thresholds; balances are
    /// left alone.
    pub async fn update_settings(&self, settings: LoyaltySettings) -> DbResult<LoyaltySettings> {
        settings.validate()?;
        self.records().save_settings(&settings).await?;
        Ok(settings)
    }

    // =========================================================================
    // Earn
    // =========================================================================

    /// Awards points for a purchase of `sale_total`.
    pub async fn earn_points(
        &self,
        customer_id: &str,
        sale_total: Money,
        reference: Option<&str>,
    ) -> DbResult<EarnOutcome> {
        self.earn_points_at(customer_id, sale_total, reference, Utc::now()).await
    }

    pub async fn earn_points_at(
        &self,
        customer_id: &str,
        sale_total: Money,
        reference: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<EarnOutcome> {
        let mut tx = self.pool.begin().await?;

        let settings = LoyaltyRepository::settings_in(&mut *tx).await?;
        let customer = CustomerRepository::fetch(&mut *tx, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        let snapshot = PointsSnapshot {
            balance: customer.loyalty_points,
            lifetime: customer.lifetime_loyalty_points,
            tier: tier_for(customer.lifetime_loyalty_points, &settings.tier_thresholds),
        };

        let Some(plan) = plan_earn(&settings, snapshot, sale_total, now) else {
            debug!(customer_id = %customer_id, total = %sale_total, "No points earned");
            return Ok(unchanged(customer_id, snapshot));
        };

        let applied =
            LoyaltyRepository::credit_points(&mut *tx, customer_id, snapshot.lifetime, &plan).await?;
        if !applied {
            return Err(CoreError::ConcurrentUpdate {
                entity: "Customer".to_string(),
                id: customer_id.to_string(),
            }
            .into());
        }

        let txn = LoyaltyTransaction {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            transaction_type: LoyaltyTransactionType::Earn,
            points: plan.points,
            balance_after: plan.new_balance,
            reference: reference.map(str::to_string),
            description: earn_description(reference.unwrap_or("-")),
            created_at: now,
            expires_at: plan.expires_at,
        };
        LoyaltyRepository::insert_transaction(&mut *tx, &txn).await?;

        tx.commit().await?;

        let tier_changed = plan.new_tier != snapshot.tier;
        info!(
            customer_id = %customer_id,
            points = plan.points,
            balance = plan.new_balance,
            tier = %plan.new_tier,
            tier_changed,
            "Loyalty points earned"
        );

        Ok(EarnOutcome {
            customer_id: customer_id.to_string(),
            points_earned: plan.points,
            new_balance: plan.new_balance,
            lifetime_points: plan.new_lifetime,
            tier: plan.new_tier,
            tier_changed,
        })
    }

    /// Awards points for a settled sale. `None` for walk-in customers and
    /// sales that are not completed.
    pub async fn earn_for_sale(&self, sale: &Sale) -> DbResult<Option<EarnOutcome>> {
        let Some(customer_id) = sale.customer_id.as_deref() else {
            return Ok(None);
        };
        if sale.status != SaleStatus::Completed {
            return Ok(None);
        }

        self.earn_points_at(customer_id, sale.total(), Some(&sale.invoice_number), Utc::now())
            .await
            .map(Some)
    }

    // =========================================================================
    // Redeem
    // =========================================================================

    /// Converts up to `points` into a discount on a sale of `sale_total`.
    ///
    /// The discount is capped at the configured share of the sale; when the
    /// cap bites, fewer points are taken.
    pub async fn redeem_points(
        &self,
        customer_id: &str,
        points: i64,
        sale_total: Money,
    ) -> DbResult<RedeemOutcome> {
        self.redeem_points_at(customer_id, points, sale_total, Utc::now()).await
    }

    pub async fn redeem_points_at(
        &self,
        customer_id: &str,
        points: i64,
        sale_total: Money,
        now: DateTime<Utc>,
    ) -> DbResult<RedeemOutcome> {
        if sale_total.is_negative() {
            return Err(ValidationError::must_be_positive("sale_total").into());
        }

        let mut tx = self.pool.begin().await?;

        let settings = LoyaltyRepository::settings_in(&mut *tx).await?;
        let customer = CustomerRepository::fetch(&mut *tx, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        let plan = plan_redemption(&settings, customer.loyalty_points, points, sale_total)?;
        let message = redeem_description(plan.points_redeemed, plan.discount);

        if plan.points_redeemed == 0 {
            debug!(customer_id = %customer_id, "Redemption cap allows no points");
            return Ok(RedeemOutcome {
                customer_id: customer_id.to_string(),
                discount_amount_cents: 0,
                points_redeemed: 0,
                new_balance: customer.loyalty_points,
                message,
            });
        }

        let new_balance = LoyaltyRepository::debit_points(&mut *tx, customer_id, plan.points_redeemed)
            .await?
            .ok_or(CoreError::InsufficientPoints {
                available: customer.loyalty_points,
                requested: plan.points_redeemed,
            })?;

        let txn = LoyaltyTransaction {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            transaction_type: LoyaltyTransactionType::Redeem,
            points: -(plan.points_redeemed as f64),
            balance_after: new_balance,
            reference: None,
            description: message.clone(),
            created_at: now,
            expires_at: None,
        };
        LoyaltyRepository::insert_transaction(&mut *tx, &txn).await?;

        tx.commit().await?;

        info!(
            customer_id = %customer_id,
            points = plan.points_redeemed,
            discount = %plan.discount,
            balance = new_balance,
            "Loyalty points redeemed"
        );

        Ok(RedeemOutcome {
            customer_id: customer_id.to_string(),
            discount_amount_cents: plan.discount.cents(),
            points_redeemed: plan.points_redeemed,
            new_balance,
            message,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn customer_points(&self, customer_id: &str) -> DbResult<CustomerPoints> {
        let settings = self.settings().await?;
        let customer = CustomerRepository::new(self.pool.clone())
            .get_by_id(customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;

        Ok(CustomerPoints::new(
            customer.id,
            customer.name,
            customer.loyalty_points,
            customer.lifetime_loyalty_points,
            &settings,
        ))
    }

    /// Ledger entries for a customer, newest first.
    pub async fn transactions(&self, customer_id: &str, limit: u32) -> DbResult<Vec<LoyaltyTransaction>> {
        self.records().transactions(customer_id, limit).await
    }

    pub async fn stats(&self) -> DbResult<LoyaltyStats> {
        let settings = self.settings().await?;
        self.records().stats(&settings).await
    }
}

fn unchanged(customer_id: &str, snapshot: PointsSnapshot) -> EarnOutcome {
    EarnOutcome {
        customer_id: customer_id.to_string(),
        points_earned: 0.0,
        new_balance: snapshot.balance,
        lifetime_points: snapshot.lifetime,
        tier: snapshot.tier,
        tier_changed: false,
    }
}

// =============================================================================
// Tests
// =============================================================================
