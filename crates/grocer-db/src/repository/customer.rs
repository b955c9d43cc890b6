//! # Customer Repository
//!
//! Customer records. Loyalty balances are read here but written only by
//! [`LoyaltyRepository`](super::LoyaltyRepository).

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::LoyaltyRepository;
use crate::error::{DbError, DbResult};
use grocer_core::loyalty::tier_for;
use grocer_core::validation::{validate_name, validate_uuid};
use grocer_core::{Customer, LoyaltyTier, PriceTier};

const CUSTOMER_COLUMNS: &str = "id, name, phone, email, price_tier, loyalty_points, \
     lifetime_loyalty_points, loyalty_tier, is_active, created_at";

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    price_tier: PriceTier,
    loyalty_points: f64,
    lifetime_loyalty_points: f64,
    loyalty_tier: LoyaltyTier,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            price_tier: row.price_tier,
            loyalty_points: row.loyalty_points,
            lifetime_loyalty_points: row.lifetime_loyalty_points,
            loyalty_tier: row.loyalty_tier,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    pub async fn get_by_phone(&self, phone: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE phone = ?1 AND is_active = 1");
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(phone.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Customer::from))
    }

    /// Active customers by name.
    pub async fn list(&self, limit: u32, offset: u32) -> DbResult<Vec<Customer>> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE is_active = 1 \
             ORDER BY name LIMIT ?1 OFFSET ?2"
        );
        let rows = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }

    /// Inserts a customer. The stored tier is derived from
    /// `lifetime_loyalty_points` under the current program thresholds;
    /// whatever tier the caller set is ignored.
    pub async fn insert(&self, customer: &Customer) -> DbResult<Customer> {
        debug!(id = %customer.id, "Inserting customer");
        validate_uuid(&customer.id)?;
        validate_name("name", &customer.name)?;

        let mut conn = self.pool.acquire().await?;
        let settings = LoyaltyRepository::settings_in(&mut conn).await?;
        let customer = Customer {
            loyalty_tier: tier_for(customer.lifetime_loyalty_points, &settings.tier_thresholds),
            ..customer.clone()
        };

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, phone, email, price_tier, loyalty_points,
                lifetime_loyalty_points, loyalty_tier, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.price_tier)
        .bind(customer.loyalty_points)
        .bind(customer.lifetime_loyalty_points)
        .bind(customer.loyalty_tier)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(customer)
    }

    /// Updates contact details and price tier. Loyalty columns are left alone.
    pub async fn update_profile(&self, customer: &Customer) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE customers SET name = ?2, phone = ?3, email = ?4, price_tier = ?5, is_active = ?6 WHERE id = ?1",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.price_tier)
        .bind(customer.is_active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", &customer.id));
        }

        Ok(())
    }

    /// Reads a customer on an existing connection or transaction.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.map(Customer::from))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    pub(crate) fn customer(name: &str, phone: &str, lifetime: f64) -> Customer {
        Customer {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: Some(phone.to_string()),
            email: None,
            price_tier: PriceTier::Retail,
            loyalty_points: lifetime,
            lifetime_loyalty_points: lifetime,
            loyalty_tier: LoyaltyTier::Bronze,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let kamala = db.customers().insert(&customer("Kamala Perera", "0771234567", 120.0)).await.unwrap();

        let by_id = db.customers().get_by_id(&kamala.id).await.unwrap().unwrap();
        assert_eq!(by_id.loyalty_points, 120.0);
        assert_eq!(by_id.loyalty_tier, LoyaltyTier::Bronze);

        let by_phone = db.customers().get_by_phone("0771234567").await.unwrap().unwrap();
        assert_eq!(by_phone.id, kamala.id);

        assert!(db.customers().get_by_id("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_derives_tier_from_lifetime() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut nimal = customer("Nimal Fernando", "0712345678", 600.0);
        nimal.loyalty_tier = LoyaltyTier::Platinum;
        let inserted = db.customers().insert(&nimal).await.unwrap();
        assert_eq!(inserted.loyalty_tier, LoyaltyTier::Silver);

        let stored = db.customers().get_by_id(&nimal.id).await.unwrap().unwrap();
        assert_eq!(stored.loyalty_tier, LoyaltyTier::Silver);
    }

    #[tokio::test]
    async fn test_update_profile_keeps_points() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut c = db.customers().insert(&customer("Ruwan", "0712223333", 75.5)).await.unwrap();

        c.price_tier = PriceTier::Wholesale;
        c.loyalty_points = 0.0;
        db.customers().update_profile(&c).await.unwrap();

        let stored = db.customers().get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(stored.price_tier, PriceTier::Wholesale);
        assert_eq!(stored.loyalty_points, 75.5);

        let listed = db.customers().list(10, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
