//! # Inventory Log Repository
//!
//! Append-only audit trail of stock movements. Rows are only ever written
//! on the same transaction as the stock change they describe.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use grocer_core::{InventoryLog, InventoryLogType};

const LOG_COLUMNS: &str = "id, product_id, log_type, quantity, previous_stock, new_stock, \
     reference, notes, created_by, created_at";

#[derive(Debug, sqlx::FromRow)]
struct InventoryLogRow {
    id: String,
    product_id: String,
    log_type: InventoryLogType,
    quantity: f64,
    previous_stock: f64,
    new_stock: f64,
    reference: Option<String>,
    notes: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<InventoryLogRow> for InventoryLog {
    fn from(row: InventoryLogRow) -> Self {
        InventoryLog {
            id: row.id,
            product_id: row.product_id,
            log_type: row.log_type,
            quantity: row.quantity,
            previous_stock: row.previous_stock,
            new_stock: row.new_stock,
            reference: row.reference,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InventoryLogRepository {
    pool: SqlitePool,
}

impl InventoryLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLogRepository { pool }
    }

    /// Newest first, optionally for one product.
    pub async fn list(&self, product_id: Option<&str>, limit: u32) -> DbResult<Vec<InventoryLog>> {
        let sql = format!(
            "SELECT {LOG_COLUMNS} FROM inventory_logs \
             WHERE (?1 IS NULL OR product_id = ?1) \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, InventoryLogRow>(&sql)
            .bind(product_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(InventoryLog::from).collect())
    }

    /// All movements carrying `reference` (an invoice or GRN number), in
    /// the order they were written.
    pub async fn list_by_reference(&self, reference: &str) -> DbResult<Vec<InventoryLog>> {
        let sql = format!(
            "SELECT {LOG_COLUMNS} FROM inventory_logs WHERE reference = ?1 ORDER BY rowid"
        );
        let rows = sqlx::query_as::<_, InventoryLogRow>(&sql)
            .bind(reference)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(InventoryLog::from).collect())
    }

    pub async fn insert(conn: &mut SqliteConnection, log: &InventoryLog) -> DbResult<()> {
        debug!(
            product_id = %log.product_id,
            log_type = ?log.log_type,
            quantity = log.quantity,
            "Writing inventory log"
        );

        sqlx::query(
            r#"
            INSERT INTO inventory_logs (
                id, product_id, log_type, quantity, previous_stock, new_stock,
                reference, notes, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&log.id)
        .bind(&log.product_id)
        .bind(log.log_type)
        .bind(log.quantity)
        .bind(log.previous_stock)
        .bind(log.new_stock)
        .bind(&log.reference)
        .bind(&log.notes)
        .bind(&log.created_by)
        .bind(log.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::tests::product;

    fn log(product_id: &str, log_type: InventoryLogType, qty: f64, prev: f64, reference: &str) -> InventoryLog {
        InventoryLog {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            log_type,
            quantity: qty,
            previous_stock: prev,
            new_stock: prev + qty,
            reference: Some(reference.to_string()),
            notes: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let soap = db.products().insert(&product("SOAP-90G", "Household", 12000, 10.0)).await.unwrap();
        let salt = db.products().insert(&product("SALT-400G", "Spices", 9000, 10.0)).await.unwrap();

        {
            let mut conn = db.pool().acquire().await.unwrap();
            InventoryLogRepository::insert(&mut conn, &log(&soap.id, InventoryLogType::Receive, 24.0, 10.0, "GRN-1"))
                .await
                .unwrap();
            InventoryLogRepository::insert(&mut conn, &log(&soap.id, InventoryLogType::Sale, -2.0, 34.0, "INV-20240115-0001"))
                .await
                .unwrap();
            InventoryLogRepository::insert(&mut conn, &log(&salt.id, InventoryLogType::Sale, -1.0, 10.0, "INV-20240115-0001"))
                .await
                .unwrap();
        }

        let soap_logs = db.inventory_logs().list(Some(&soap.id), 10).await.unwrap();
        assert_eq!(soap_logs.len(), 2);
        assert_eq!(soap_logs[0].log_type, InventoryLogType::Sale);
        assert_eq!(soap_logs[1].log_type, InventoryLogType::Receive);

        assert_eq!(db.inventory_logs().list(None, 2).await.unwrap().len(), 2);

        let by_invoice = db.inventory_logs().list_by_reference("INV-20240115-0001").await.unwrap();
        assert_eq!(by_invoice.len(), 2);
        assert!(by_invoice.iter().all(|l| l.new_stock - l.previous_stock == l.quantity));
    }

    #[tokio::test]
    async fn test_log_requires_existing_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let err = InventoryLogRepository::insert(&mut conn, &log("ghost", InventoryLogType::Adjust, 1.0, 0.0, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::DbError::ForeignKeyViolation { .. }));
    }
}
