//! # Discount Rule Repository
//!
//! Rules are stored flat (`scope`, `target`, `discount_type`, `value`) and
//! rebuilt into [`DiscountScope`] / [`DiscountMechanism`] on read.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use grocer_core::discount::{DiscountMechanism, DiscountRule, DiscountScope, NewDiscountRule};
use grocer_core::CoreError;

const RULE_COLUMNS: &str = "id, name, scope, target, discount_type, value, max_discount_cents, \
     min_quantity, max_quantity, auto_apply, is_active, created_at";

#[derive(Debug, sqlx::FromRow)]
struct DiscountRuleRow {
    id: String,
    name: String,
    scope: String,
    target: Option<String>,
    discount_type: String,
    value: i64,
    max_discount_cents: i64,
    min_quantity: f64,
    max_quantity: f64,
    auto_apply: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<DiscountRuleRow> for DiscountRule {
    type Error = DbError;

    fn try_from(row: DiscountRuleRow) -> DbResult<Self> {
        let scope = DiscountScope::parse(&row.scope, row.target.as_deref())
            .map_err(|e| DbError::corrupt("DiscountRule", &row.id, e))?;
        let mechanism = DiscountMechanism::parse(&row.discount_type, row.value)
            .map_err(|e| DbError::corrupt("DiscountRule", &row.id, e))?;

        Ok(DiscountRule {
            id: row.id,
            name: row.name,
            scope,
            mechanism,
            max_discount_cents: row.max_discount_cents,
            min_quantity: row.min_quantity,
            max_quantity: row.max_quantity,
            auto_apply: row.auto_apply,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

fn into_rules(rows: Vec<DiscountRuleRow>) -> DbResult<Vec<DiscountRule>> {
    rows.into_iter().map(DiscountRule::try_from).collect()
}

#[derive(Debug, Clone)]
pub struct DiscountRuleRepository {
    pool: SqlitePool,
}

impl DiscountRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DiscountRuleRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<DiscountRule>> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM discount_rules WHERE id = ?1");
        sqlx::query_as::<_, DiscountRuleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(DiscountRule::try_from)
            .transpose()
    }

    /// Active rules in creation order. Includes manual (non auto-apply)
    /// rules for the back office.
    pub async fn list_active(&self) -> DbResult<Vec<DiscountRule>> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM discount_rules WHERE is_active = 1 ORDER BY created_at, rowid"
        );
        let rows = sqlx::query_as::<_, DiscountRuleRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        into_rules(rows)
    }

    /// The rule set the evaluator runs against.
    ///
    /// Creation order matters: on an exact tie the earliest rule wins.
    pub async fn list_auto_apply(&self) -> DbResult<Vec<DiscountRule>> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM discount_rules \
             WHERE is_active = 1 AND auto_apply = 1 \
             ORDER BY created_at, rowid"
        );
        let rows = sqlx::query_as::<_, DiscountRuleRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        into_rules(rows)
    }

    /// Validates and stores a new rule.
    pub async fn create(&self, new_rule: NewDiscountRule) -> DbResult<DiscountRule> {
        new_rule.validate()?;

        let rule = DiscountRule {
            id: Uuid::new_v4().to_string(),
            name: new_rule.name.trim().to_string(),
            scope: new_rule.scope,
            mechanism: new_rule.mechanism,
            max_discount_cents: new_rule.max_discount_cents,
            min_quantity: new_rule.min_quantity,
            max_quantity: new_rule.max_quantity,
            auto_apply: new_rule.auto_apply,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO discount_rules (
                id, name, scope, target, discount_type, value, max_discount_cents,
                min_quantity, max_quantity, auto_apply, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.name)
        .bind(rule.scope.kind())
        .bind(rule.scope.target())
        .bind(rule.mechanism.kind())
        .bind(rule.mechanism.value())
        .bind(rule.max_discount_cents)
        .bind(rule.min_quantity)
        .bind(rule.max_quantity)
        .bind(rule.auto_apply)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await?;

        info!(id = %rule.id, name = %rule.name, scope = rule.scope.kind(), "Discount rule created");
        Ok(rule)
    }

    /// Replaces a rule's terms. `created_at` is kept.
    pub async fn update(&self, rule: &DiscountRule) -> DbResult<()> {
        rule.validate()?;
        debug!(id = %rule.id, "Updating discount rule");

        let result = sqlx::query(
            r#"
            UPDATE discount_rules SET
                name = ?2, scope = ?3, target = ?4, discount_type = ?5, value = ?6,
                max_discount_cents = ?7, min_quantity = ?8, max_quantity = ?9,
                auto_apply = ?10, is_active = ?11
            WHERE id = ?1
            "#,
        )
        .bind(&rule.id)
        .bind(rule.name.trim())
        .bind(rule.scope.kind())
        .bind(rule.scope.target())
        .bind(rule.mechanism.kind())
        .bind(rule.mechanism.value())
        .bind(rule.max_discount_cents)
        .bind(rule.min_quantity)
        .bind(rule.max_quantity)
        .bind(rule.auto_apply)
        .bind(rule.is_active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::DiscountRuleNotFound(rule.id.clone()).into());
        }

        Ok(())
    }

    /// Soft-deletes a rule. Sales that already carry its name keep it.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE discount_rules SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::DiscountRuleNotFound(id.to_string()).into());
        }

        info!(id = %id, "Discount rule deactivated");
        Ok(())
    }
}
