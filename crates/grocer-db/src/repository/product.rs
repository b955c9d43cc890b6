//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Stock Mutations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Stock is only written through `apply_stock_delta` / `set_stock`,     │
//! │  both of which run on a caller-owned transaction so the matching       │
//! │  InventoryLog row commits (or rolls back) with the stock change.       │
//! │                                                                         │
//! │  apply_stock_delta                                                      │
//! │    SELECT sku, stock                     → previous                     │
//! │    UPDATE stock = stock + Δ              → new   (RETURNING)            │
//! │           [AND stock + Δ >= 0]           ← when negative stock is off   │
//! │                                                                         │
//! │  set_stock (count correction)                                           │
//! │    UPDATE stock = counted                                               │
//! │     WHERE stock = previous               ← compare-and-swap             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use grocer_core::validation::{validate_name, validate_price_cents, validate_sku, validate_uuid};
use grocer_core::{round_stock, CoreError, Product, STOCK_DECIMALS};

const PRODUCT_COLUMNS: &str = "id, sku, barcodes, name_en, name_si, name_ta, unit, category, \
     price_retail_cents, price_wholesale_cents, price_credit_cents, price_other_cents, \
     stock, reorder_level, weight_based, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    barcodes: String,
    name_en: String,
    name_si: Option<String>,
    name_ta: Option<String>,
    unit: String,
    category: Option<String>,
    price_retail_cents: i64,
    price_wholesale_cents: i64,
    price_credit_cents: i64,
    price_other_cents: i64,
    stock: f64,
    reorder_level: f64,
    weight_based: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<Self> {
        let barcodes: Vec<String> = serde_json::from_str(&row.barcodes)
            .map_err(|e| DbError::corrupt("Product", &row.id, e))?;

        Ok(Product {
            id: row.id,
            sku: row.sku,
            barcodes,
            name_en: row.name_en,
            name_si: row.name_si,
            name_ta: row.name_ta,
            unit: row.unit,
            category: row.category,
            price_retail_cents: row.price_retail_cents,
            price_wholesale_cents: row.price_wholesale_cents,
            price_credit_cents: row.price_credit_cents,
            price_other_cents: row.price_other_cents,
            stock: row.stock,
            reorder_level: row.reorder_level,
            weight_based: row.weight_based,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> DbResult<Vec<Product>> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Stock before and after a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct StockChange {
    pub product_id: String,
    pub sku: String,
    pub previous_stock: f64,
    pub new_stock: f64,
}

/// Outcome of a guarded stock update.
#[derive(Debug, Clone, PartialEq)]
pub enum StockUpdate {
    Applied(StockChange),
    /// No such product.
    Missing,
    /// The floor guard rejected the update.
    Insufficient { sku: String, available: f64 },
}

fn validate_product(product: &Product) -> DbResult<()> {
    validate_uuid(&product.id)?;
    validate_sku(&product.sku)?;
    validate_name("name_en", &product.name_en)?;
    for (field, cents) in [
        ("price_retail", product.price_retail_cents),
        ("price_wholesale", product.price_wholesale_cents),
        ("price_credit", product.price_credit_cents),
        ("price_other", product.price_other_cents),
    ] {
        validate_price_cents(field, cents)?;
    }
    Ok(())
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let product = db.products().get_by_sku("RICE-SAMBA-5KG").await?;
/// let low = db.products().list_low_stock().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    /// Finds an active product by any of its barcodes.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 \
               AND EXISTS (SELECT 1 FROM json_each(products.barcodes) WHERE json_each.value = ?1) \
             LIMIT 1"
        );
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await?
            .map(Product::try_from)
            .transpose()
    }

    /// Searches active products by SKU or English name prefix/substring.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();
        debug!(query = %query, limit = %limit, "Searching products");

        let pattern = format!("%{}%", query.replace('%', "").replace('_', "\\_"));
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 \
               AND (sku LIKE ?1 ESCAPE '\\' OR name_en LIKE ?1 ESCAPE '\\') \
             ORDER BY name_en LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        into_products(rows)
    }

    /// Active products at or below their reorder level, emptiest first.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND stock <= reorder_level \
             ORDER BY stock ASC, name_en"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        into_products(rows)
    }

    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");
        validate_product(product)?;

        let barcodes = serde_json::to_string(&product.barcodes)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcodes, name_en, name_si, name_ta, unit, category,
                price_retail_cents, price_wholesale_cents, price_credit_cents, price_other_cents,
                stock, reorder_level, weight_based, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(barcodes)
        .bind(&product.name_en)
        .bind(&product.name_si)
        .bind(&product.name_ta)
        .bind(&product.unit)
        .bind(&product.category)
        .bind(product.price_retail_cents)
        .bind(product.price_wholesale_cents)
        .bind(product.price_credit_cents)
        .bind(product.price_other_cents)
        .bind(product.stock)
        .bind(product.reorder_level)
        .bind(product.weight_based)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(product.clone()),
            Err(e) => match DbError::from(e) {
                err if err.is_unique_violation_on("sku") => Err(DbError::duplicate("sku", &product.sku)),
                err => Err(err),
            },
        }
    }

    /// Updates catalogue fields. Stock is not touched here.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");
        validate_product(product)?;

        let barcodes = serde_json::to_string(&product.barcodes)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?2, barcodes = ?3, name_en = ?4, name_si = ?5, name_ta = ?6,
                unit = ?7, category = ?8,
                price_retail_cents = ?9, price_wholesale_cents = ?10,
                price_credit_cents = ?11, price_other_cents = ?12,
                reorder_level = ?13, weight_based = ?14, is_active = ?15,
                updated_at = ?16
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(barcodes)
        .bind(&product.name_en)
        .bind(&product.name_si)
        .bind(&product.name_ta)
        .bind(&product.unit)
        .bind(&product.category)
        .bind(product.price_retail_cents)
        .bind(product.price_wholesale_cents)
        .bind(product.price_credit_cents)
        .bind(product.price_other_cents)
        .bind(product.reorder_level)
        .bind(product.weight_based)
        .bind(product.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Transactional stock writes
    // =========================================================================

    /// Adds `delta` to a product's stock on the caller's transaction. The
    /// result is rounded to [`STOCK_DECIMALS`] places.
    ///
    /// With `allow_negative = false` the update only applies when the
    /// resulting stock stays at or above zero.
    pub async fn apply_stock_delta(
        conn: &mut SqliteConnection,
        product_id: &str,
        delta: f64,
        allow_negative: bool,
    ) -> DbResult<StockUpdate> {
        let current: Option<(String, f64)> =
            sqlx::query_as("SELECT sku, stock FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;

        let Some((sku, previous_stock)) = current else {
            return Ok(StockUpdate::Missing);
        };

        let sql = format!(
            "UPDATE products \
             SET stock = ROUND(stock + ?2, {STOCK_DECIMALS}), updated_at = ?3 \
             WHERE id = ?1 AND (?4 OR ROUND(stock + ?2, {STOCK_DECIMALS}) >= 0) \
             RETURNING stock"
        );
        let new_stock: Option<f64> = sqlx::query_scalar(&sql)
            .bind(product_id)
            .bind(delta)
            .bind(Utc::now())
            .bind(allow_negative)
            .fetch_optional(&mut *conn)
            .await?;

        debug!(product_id = %product_id, delta, ?new_stock, "Applied stock delta");

        Ok(match new_stock {
            Some(new_stock) => StockUpdate::Applied(StockChange {
                product_id: product_id.to_string(),
                sku,
                previous_stock,
                new_stock: round_stock(new_stock),
            }),
            None => StockUpdate::Insufficient {
                sku,
                available: previous_stock,
            },
        })
    }

    /// Sets a product's stock to a counted value on the caller's
    /// transaction. Fails with `ConcurrentUpdate` if the stock moved since
    /// it was read.
    pub async fn set_stock(
        conn: &mut SqliteConnection,
        product_id: &str,
        counted: f64,
    ) -> DbResult<StockChange> {
        let counted = round_stock(counted);
        let current: Option<(String, f64)> =
            sqlx::query_as("SELECT sku, stock FROM products WHERE id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;

        let (sku, previous_stock) =
            current.ok_or_else(|| DbError::from(CoreError::ProductNotFound(product_id.to_string())))?;

        let result = sqlx::query(
            "UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1 AND stock = ?4",
        )
        .bind(product_id)
        .bind(counted)
        .bind(Utc::now())
        .bind(previous_stock)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ConcurrentUpdate {
                entity: "Product".to_string(),
                id: product_id.to_string(),
            }
            .into());
        }

        Ok(StockChange {
            product_id: product_id.to_string(),
            sku,
            previous_stock,
            new_stock: counted,
        })
    }
}
