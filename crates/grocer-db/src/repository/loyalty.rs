//! # Loyalty Repository
//!
//! Program settings, customer balance writes, and the points ledger.
//!
//! ## Balance Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  credit_points (earn)                                                  │
//! │    UPDATE customers SET loyalty_points, lifetime, tier                  │
//! │     WHERE id = ? AND lifetime_loyalty_points = <value read earlier>     │
//! │    0 rows → another earn won the race → ConcurrentUpdate                │
//! │                                                                         │
//! │  debit_points (redeem)                                                  │
//! │    UPDATE customers SET loyalty_points = loyalty_points - ?             │
//! │     WHERE id = ? AND loyalty_points >= ?                                │
//! │    0 rows → balance spent elsewhere → InsufficientPoints                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use grocer_core::loyalty::{
    EarnPlan, LoyaltySettings, LoyaltyStats, TierDistribution, TierMultipliers, TierThresholds,
};
use grocer_core::{LoyaltyTier, LoyaltyTransaction, LoyaltyTransactionType};

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    enabled: bool,
    spend_per_point_cents: i64,
    value_per_point_cents: i64,
    min_purchase_for_points_cents: i64,
    min_points_for_redemption: i64,
    max_redemption_bps: i64,
    points_expiry_days: Option<i64>,
    silver_threshold: f64,
    gold_threshold: f64,
    platinum_threshold: f64,
    bronze_multiplier: f64,
    silver_multiplier: f64,
    gold_multiplier: f64,
    platinum_multiplier: f64,
}

impl TryFrom<SettingsRow> for LoyaltySettings {
    type Error = DbError;

    fn try_from(row: SettingsRow) -> DbResult<Self> {
        let max_redemption_bps = u32::try_from(row.max_redemption_bps)
            .map_err(|e| DbError::corrupt("LoyaltySettings", "1", e))?;
        let points_expiry_days = row
            .points_expiry_days
            .map(u32::try_from)
            .transpose()
            .map_err(|e| DbError::corrupt("LoyaltySettings", "1", e))?;

        Ok(LoyaltySettings {
            enabled: row.enabled,
            spend_per_point_cents: row.spend_per_point_cents,
            value_per_point_cents: row.value_per_point_cents,
            min_purchase_for_points_cents: row.min_purchase_for_points_cents,
            min_points_for_redemption: row.min_points_for_redemption,
            max_redemption_bps,
            points_expiry_days,
            tier_thresholds: TierThresholds {
                silver: row.silver_threshold,
                gold: row.gold_threshold,
                platinum: row.platinum_threshold,
            },
            tier_multipliers: TierMultipliers {
                bronze: row.bronze_multiplier,
                silver: row.silver_multiplier,
                gold: row.gold_multiplier,
                platinum: row.platinum_multiplier,
            },
        })
    }
}

/// Tier implied by `lifetime_loyalty_points`; binds silver, gold and
/// platinum thresholds as ?1, ?2, ?3.
const TIER_FROM_LIFETIME: &str = "CASE \
     WHEN lifetime_loyalty_points >= ?3 THEN 'platinum' \
     WHEN lifetime_loyalty_points >= ?2 THEN 'gold' \
     WHEN lifetime_loyalty_points >= ?1 THEN 'silver' \
     ELSE 'bronze' END";

const TRANSACTION_COLUMNS: &str =
    "id, customer_id, transaction_type, points, balance_after, reference, description, created_at, expires_at";

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    customer_id: String,
    transaction_type: LoyaltyTransactionType,
    points: f64,
    balance_after: f64,
    reference: Option<String>,
    description: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<TransactionRow> for LoyaltyTransaction {
    fn from(row: TransactionRow) -> Self {
        LoyaltyTransaction {
            id: row.id,
            customer_id: row.customer_id,
            transaction_type: row.transaction_type,
            points: row.points,
            balance_after: row.balance_after,
            reference: row.reference,
            description: row.description,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: SqlitePool,
}

impl LoyaltyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyRepository { pool }
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Current program settings; the defaults until someone saves a row.
    pub async fn settings(&self) -> DbResult<LoyaltySettings> {
        let mut conn = self.pool.acquire().await?;
        Self::settings_in(&mut conn).await
    }

    pub async fn settings_in(conn: &mut SqliteConnection) -> DbResult<LoyaltySettings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT enabled, spend_per_point_cents, value_per_point_cents,
                   min_purchase_for_points_cents, min_points_for_redemption,
                   max_redemption_bps, points_expiry_days,
                   silver_threshold, gold_threshold, platinum_threshold,
                   bronze_multiplier, silver_multiplier, gold_multiplier, platinum_multiplier
            FROM loyalty_settings WHERE id = 1
            "#,
        )
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => LoyaltySettings::try_from(row),
            None => Ok(LoyaltySettings::default()),
        }
    }

    /// Stores settings and re-derives every stored tier under the new
    /// thresholds, in one transaction. Callers validate first.
    pub async fn save_settings(&self, settings: &LoyaltySettings) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO loyalty_settings (
                id, enabled, spend_per_point_cents, value_per_point_cents,
                min_purchase_for_points_cents, min_points_for_redemption,
                max_redemption_bps, points_expiry_days,
                silver_threshold, gold_threshold, platinum_threshold,
                bronze_multiplier, silver_multiplier, gold_multiplier, platinum_multiplier,
                updated_at
            ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT (id) DO UPDATE SET
                enabled = excluded.enabled,
                spend_per_point_cents = excluded.spend_per_point_cents,
                value_per_point_cents = excluded.value_per_point_cents,
                min_purchase_for_points_cents = excluded.min_purchase_for_points_cents,
                min_points_for_redemption = excluded.min_points_for_redemption,
                max_redemption_bps = excluded.max_redemption_bps,
                points_expiry_days = excluded.points_expiry_days,
                silver_threshold = excluded.silver_threshold,
                gold_threshold = excluded.gold_threshold,
                platinum_threshold = excluded.platinum_threshold,
                bronze_multiplier = excluded.bronze_multiplier,
                silver_multiplier = excluded.silver_multiplier,
                gold_multiplier = excluded.gold_multiplier,
                platinum_multiplier = excluded.platinum_multiplier,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(settings.enabled)
        .bind(settings.spend_per_point_cents)
        .bind(settings.value_per_point_cents)
        .bind(settings.min_purchase_for_points_cents)
        .bind(settings.min_points_for_redemption)
        .bind(i64::from(settings.max_redemption_bps))
        .bind(settings.points_expiry_days.map(i64::from))
        .bind(settings.tier_thresholds.silver)
        .bind(settings.tier_thresholds.gold)
        .bind(settings.tier_thresholds.platinum)
        .bind(settings.tier_multipliers.bronze)
        .bind(settings.tier_multipliers.silver)
        .bind(settings.tier_multipliers.gold)
        .bind(settings.tier_multipliers.platinum)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let retiered = Self::retier_customers(&mut *tx, &settings.tier_thresholds).await?;

        tx.commit().await?;

        info!(enabled = settings.enabled, retiered, "Loyalty settings saved");
        Ok(())
    }

    /// Rewrites `loyalty_tier` wherever it disagrees with lifetime points.
    pub async fn retier_customers(
        conn: &mut SqliteConnection,
        thresholds: &TierThresholds,
    ) -> DbResult<u64> {
        let sql = format!(
            "UPDATE customers SET loyalty_tier = {TIER_FROM_LIFETIME} \
             WHERE loyalty_tier <> {TIER_FROM_LIFETIME}"
        );
        let result = sqlx::query(&sql)
            .bind(thresholds.silver)
            .bind(thresholds.gold)
            .bind(thresholds.platinum)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Balance writes
    // =========================================================================

    /// Applies an earn plan if the customer's lifetime total is still
    /// `expected_lifetime`. Returns `false` when it moved.
    pub async fn credit_points(
        conn: &mut SqliteConnection,
        customer_id: &str,
        expected_lifetime: f64,
        plan: &EarnPlan,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET loyalty_points = ?2, lifetime_loyalty_points = ?3, loyalty_tier = ?4
            WHERE id = ?1 AND lifetime_loyalty_points = ?5
            "#,
        )
        .bind(customer_id)
        .bind(plan.new_balance)
        .bind(plan.new_lifetime)
        .bind(plan.new_tier)
        .bind(expected_lifetime)
        .execute(&mut *conn)
        .await?;

        debug!(customer_id = %customer_id, points = plan.points, applied = result.rows_affected() == 1, "Credit points");
        Ok(result.rows_affected() == 1)
    }

    /// Deducts `points` if the balance covers them. Returns the new
    /// balance, or `None` when it does not.
    pub async fn debit_points(
        conn: &mut SqliteConnection,
        customer_id: &str,
        points: i64,
    ) -> DbResult<Option<f64>> {
        let new_balance: Option<f64> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET loyalty_points = ROUND(loyalty_points - ?2, 2)
            WHERE id = ?1 AND loyalty_points >= ?2
            RETURNING loyalty_points
            "#,
        )
        .bind(customer_id)
        .bind(points as f64)
        .fetch_optional(&mut *conn)
        .await?;

        debug!(customer_id = %customer_id, points, ?new_balance, "Debit points");
        Ok(new_balance)
    }

    pub async fn insert_transaction(conn: &mut SqliteConnection, txn: &LoyaltyTransaction) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO loyalty_transactions (
                id, customer_id, transaction_type, points, balance_after,
                reference, description, created_at, expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&txn.id)
        .bind(&txn.customer_id)
        .bind(txn.transaction_type)
        .bind(txn.points)
        .bind(txn.balance_after)
        .bind(&txn.reference)
        .bind(&txn.description)
        .bind(txn.created_at)
        .bind(txn.expires_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// A customer's ledger, newest first.
    pub async fn transactions(&self, customer_id: &str, limit: u32) -> DbResult<Vec<LoyaltyTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM loyalty_transactions \
             WHERE customer_id = ?1 \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(customer_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(LoyaltyTransaction::from).collect())
    }

    /// Program-wide totals over active customers. Tiers are counted from
    /// lifetime points under `settings`.
    pub async fn stats(&self, settings: &LoyaltySettings) -> DbResult<LoyaltyStats> {
        let sql = format!(
            "SELECT {TIER_FROM_LIFETIME} AS tier, COUNT(*) FROM customers \
             WHERE is_active = 1 GROUP BY tier"
        );
        let tiers: Vec<(LoyaltyTier, i64)> = sqlx::query_as(&sql)
            .bind(settings.tier_thresholds.silver)
            .bind(settings.tier_thresholds.gold)
            .bind(settings.tier_thresholds.platinum)
            .fetch_all(&self.pool)
            .await?;

        let mut tier_distribution = TierDistribution::default();
        let mut total_customers = 0u64;
        for (tier, count) in tiers {
            let count = u64::try_from(count).unwrap_or_default();
            tier_distribution.add(tier, count);
            total_customers += count;
        }

        let (points_in_circulation, lifetime_points_awarded): (f64, f64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(loyalty_points), 0.0), COALESCE(SUM(lifetime_loyalty_points), 0.0)
            FROM customers WHERE is_active = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let total_transactions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loyalty_transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(LoyaltyStats {
            enabled: settings.enabled,
            total_customers,
            tier_distribution,
            points_in_circulation,
            lifetime_points_awarded,
            total_transactions: u64::try_from(total_transactions).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::customer::tests::customer;

    #[tokio::test]
    async fn test_settings_default_then_saved() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.loyalty_records();

        assert_eq!(repo.settings().await.unwrap(), LoyaltySettings::default());

        let custom = LoyaltySettings {
            enabled: false,
            max_redemption_bps: 1000,
            points_expiry_days: Some(365),
            ..LoyaltySettings::default()
        };
        repo.save_settings(&custom).await.unwrap();
        assert_eq!(repo.settings().await.unwrap(), custom);

        // Upsert keeps a single row
        repo.save_settings(&LoyaltySettings::default()).await.unwrap();
        assert_eq!(repo.settings().await.unwrap(), LoyaltySettings::default());
    }

    #[tokio::test]
    async fn test_credit_is_compare_and_swap() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let c = db.customers().insert(&customer("Sunil", "0701112222", 450.0)).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let plan = EarnPlan {
            points: 100.0,
            new_balance: 550.0,
            new_lifetime: 550.0,
            new_tier: LoyaltyTier::Silver,
            expires_at: None,
        };

        assert!(LoyaltyRepository::credit_points(&mut conn, &c.id, 450.0, &plan).await.unwrap());
        // Stale expectation loses
        assert!(!LoyaltyRepository::credit_points(&mut conn, &c.id, 450.0, &plan).await.unwrap());
    }

    #[tokio::test]
    async fn test_debit_is_guarded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let c = db.customers().insert(&customer("Chamari", "0703334444", 30.0)).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(LoyaltyRepository::debit_points(&mut conn, &c.id, 20).await.unwrap(), Some(10.0));
        assert_eq!(LoyaltyRepository::debit_points(&mut conn, &c.id, 20).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stats() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers().insert(&customer("Anil", "0705556666", 2500.0)).await.unwrap();
        db.customers().insert(&customer("Dilani", "0707778888", 100.0)).await.unwrap();

        let settings = LoyaltySettings::default();
        let stats = db.loyalty_records().stats(&settings).await.unwrap();
        assert!(stats.enabled);
        assert_eq!(stats.total_customers, 2);
        assert_eq!(stats.tier_distribution.gold, 1);
        assert_eq!(stats.tier_distribution.bronze, 1);
        assert_eq!(stats.points_in_circulation, 2600.0);
        assert_eq!(stats.total_transactions, 0);
    }

    #[tokio::test]
    async fn test_saving_thresholds_retiers_customers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let anil = db.customers().insert(&customer("Anil", "0705556666", 2500.0)).await.unwrap();
        let dilani = db.customers().insert(&customer("Dilani", "0707778888", 600.0)).await.unwrap();
        assert_eq!(anil.loyalty_tier, LoyaltyTier::Gold);
        assert_eq!(dilani.loyalty_tier, LoyaltyTier::Silver);

        let mut settings = LoyaltySettings::default();
        settings.tier_thresholds = TierThresholds {
            silver: 1000.0,
            gold: 2400.0,
            platinum: 3000.0,
        };
        db.loyalty_records().save_settings(&settings).await.unwrap();

        let anil = db.customers().get_by_id(&anil.id).await.unwrap().unwrap();
        let dilani = db.customers().get_by_id(&dilani.id).await.unwrap().unwrap();
        assert_eq!(anil.loyalty_tier, LoyaltyTier::Gold);
        assert_eq!(dilani.loyalty_tier, LoyaltyTier::Bronze);

        let stats = db.loyalty_records().stats(&settings).await.unwrap();
        assert_eq!(stats.tier_distribution.bronze, 1);
        assert_eq!(stats.tier_distribution.silver, 0);
        assert_eq!(stats.tier_distribution.gold, 1);
    }
}
