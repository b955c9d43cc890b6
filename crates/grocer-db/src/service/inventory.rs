//! # Inventory Service
//!
//! Goods receipts, stock count corrections, the movement log and
//! low-stock alerts. Every stock change commits together with its log row.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::{InventoryLogRepository, ProductRepository, StockChange, StockUpdate};
use grocer_core::validation::validate_stock_count;
use grocer_core::{round_stock, CoreError, InventoryLog, InventoryLogType, Product, ValidationError};

/// Free-text context recorded on a movement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementInfo {
    /// GRN or supplier invoice number.
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAlertStatus {
    /// Out of stock (or oversold).
    Critical,
    /// At or below the reorder level.
    Low,
}

/// A product that needs reordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlert {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub current_stock: f64,
    pub reorder_level: f64,
    /// Enough to bring stock to twice the reorder level.
    pub suggested_order_qty: f64,
    pub status: StockAlertStatus,
}

impl StockAlert {
    pub fn for_product(product: &Product) -> Self {
        StockAlert {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name_en.clone(),
            category: product.category.clone(),
            current_stock: product.stock,
            reorder_level: product.reorder_level,
            suggested_order_qty: (product.reorder_level * 2.0 - product.stock).max(0.0),
            status: if product.stock <= 0.0 {
                StockAlertStatus::Critical
            } else {
                StockAlertStatus::Low
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct InventoryService {
    pool: SqlitePool,
}

impl InventoryService {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryService { pool }
    }

    /// Adds received goods to stock.
    pub async fn receive(&self, product_id: &str, quantity: f64, info: MovementInfo) -> DbResult<InventoryLog> {
        validate_stock_count(quantity)?;
        if quantity <= 0.0 {
            return Err(ValidationError::must_be_positive("quantity").into());
        }

        let mut tx = self.pool.begin().await?;

        let change = match ProductRepository::apply_stock_delta(&mut *tx, product_id, quantity, true).await? {
            StockUpdate::Applied(change) => change,
            StockUpdate::Missing | StockUpdate::Insufficient { .. } => {
                return Err(CoreError::ProductNotFound(product_id.to_string()).into());
            }
        };

        let log = movement_log(&change, InventoryLogType::Receive, info);
        InventoryLogRepository::insert(&mut *tx, &log).await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            sku = %change.sku,
            quantity,
            new_stock = change.new_stock,
            "Stock received"
        );
        Ok(log)
    }

    /// Sets stock to a counted value. The log carries the signed difference.
    pub async fn adjust(&self, product_id: &str, counted: f64, info: MovementInfo) -> DbResult<InventoryLog> {
        validate_stock_count(counted)?;

        let mut tx = self.pool.begin().await?;

        let change = ProductRepository::set_stock(&mut *tx, product_id, counted).await?;

        let log = movement_log(&change, InventoryLogType::Adjust, info);
        InventoryLogRepository::insert(&mut *tx, &log).await?;

        tx.commit().await?;

        info!(
            product_id = %product_id,
            sku = %change.sku,
            previous = change.previous_stock,
            counted,
            "Stock adjusted"
        );
        Ok(log)
    }

    /// Movement history, newest first.
    pub async fn logs(&self, product_id: Option<&str>, limit: u32) -> DbResult<Vec<InventoryLog>> {
        InventoryLogRepository::new(self.pool.clone())
            .list(product_id, limit)
            .await
    }

    /// Active products at or below their reorder level, emptiest first.
    pub async fn low_stock_alerts(&self) -> DbResult<Vec<StockAlert>> {
        let products = ProductRepository::new(self.pool.clone()).list_low_stock().await?;
        Ok(products.iter().map(StockAlert::for_product).collect())
    }
}

/// Log row for an applied change; `quantity` is the signed movement that
/// actually landed.
fn movement_log(change: &StockChange, log_type: InventoryLogType, info: MovementInfo) -> InventoryLog {
    InventoryLog {
        id: Uuid::new_v4().to_string(),
        product_id: change.product_id.clone(),
        log_type,
        quantity: round_stock(change.new_stock - change.previous_stock),
        previous_stock: change.previous_stock,
        new_stock: change.new_stock,
        reference: info.reference,
        notes: info.notes,
        created_by: info.created_by,
        created_at: Utc::now(),
    }
}
