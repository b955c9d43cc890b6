//! # Sale Repository
//!
//! Database operations for sales, their items and payments, and the
//! per-day invoice counter.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales (1) ───< sale_items (line_no 0..n)                              │
//! │            └──< payments                                                │
//! │                                                                         │
//! │  invoice_sequences                                                      │
//! │    day = "20240115", last_seq = 42  ──► INV-20240115-0042               │
//! │                                                                         │
//! │  Everything written by `insert` and `next_invoice_sequence` runs on     │
//! │  the settlement transaction; reads go through the pool.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use grocer_core::settlement::InvoiceNumber;
use grocer_core::{CoreError, Payment, PaymentMethod, PriceTier, Sale, SaleItem, SaleStatus};

const SALE_COLUMNS: &str = "id, invoice_number, customer_id, customer_name, price_tier, \
     subtotal_cents, total_discount_cents, tax_cents, total_cents, status, \
     terminal_name, cashier_name, notes, created_at";

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    invoice_number: String,
    customer_id: Option<String>,
    customer_name: Option<String>,
    price_tier: PriceTier,
    subtotal_cents: i64,
    total_discount_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    status: SaleStatus,
    terminal_name: Option<String>,
    cashier_name: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>, payments: Vec<Payment>) -> Sale {
        Sale {
            id: self.id,
            invoice_number: self.invoice_number,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            price_tier: self.price_tier,
            items,
            payments,
            subtotal_cents: self.subtotal_cents,
            total_discount_cents: self.total_discount_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            status: self.status,
            terminal_name: self.terminal_name,
            cashier_name: self.cashier_name,
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SaleItemRow {
    product_id: String,
    sku: String,
    name: String,
    category: Option<String>,
    quantity: f64,
    unit_price_cents: i64,
    subtotal_cents: i64,
    discount_amount_cents: i64,
    discount_percent: f64,
    applied_rule: Option<String>,
    total_cents: i64,
}

impl From<SaleItemRow> for SaleItem {
    fn from(row: SaleItemRow) -> Self {
        SaleItem {
            product_id: row.product_id,
            sku: row.sku,
            name: row.name,
            category: row.category,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            subtotal_cents: row.subtotal_cents,
            discount_amount_cents: row.discount_amount_cents,
            discount_percent: row.discount_percent,
            applied_rule: row.applied_rule,
            total_cents: row.total_cents,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    method: PaymentMethod,
    amount_cents: i64,
    reference: Option<String>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            method: row.method,
            amount_cents: row.amount_cents,
            reference: row.reference,
        }
    }
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale with its items and payments.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE invoice_number = ?1");
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(invoice_number)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Lists sales newest first, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<SaleStatus>,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<Sale>> {
        debug!(?status, limit, offset, "Listing sales");

        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            sales.push(self.hydrate(row).await?);
        }
        Ok(sales)
    }

    /// Completed sales created in `[from, to)`, oldest first.
    pub async fn list_completed_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE status = 'completed' AND created_at >= ?1 AND created_at < ?2 \
             ORDER BY created_at, rowid"
        );
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            sales.push(self.hydrate(row).await?);
        }
        Ok(sales)
    }

    pub async fn count_by_status(&self, status: SaleStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn hydrate(&self, row: SaleRow) -> DbResult<Sale> {
        let items = sqlx::query_as::<_, SaleItemRow>(
            r#"
            SELECT product_id, sku, name, category, quantity, unit_price_cents,
                   subtotal_cents, discount_amount_cents, discount_percent,
                   applied_rule, total_cents
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let payments = sqlx::query_as::<_, PaymentRow>(
            "SELECT method, amount_cents, reference FROM payments WHERE sale_id = ?1 ORDER BY id",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(row.into_sale(
            items.into_iter().map(SaleItem::from).collect(),
            payments.into_iter().map(Payment::from).collect(),
        ))
    }

    // =========================================================================
    // Transactional writes
    // =========================================================================

    /// Allocates the next invoice number for `date`.
    ///
    /// The counter row is created on first use and incremented atomically;
    /// two settlements on the same day can never see the same sequence.
    pub async fn next_invoice_number(
        conn: &mut SqliteConnection,
        date: NaiveDate,
    ) -> DbResult<InvoiceNumber> {
        let day = InvoiceNumber::day_key(date);

        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_sequences (day, last_seq) VALUES (?1, 1)
            ON CONFLICT (day) DO UPDATE SET last_seq = last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(&day)
        .fetch_one(&mut *conn)
        .await?;

        let sequence = u32::try_from(sequence)
            .map_err(|e| DbError::corrupt("InvoiceSequence", &day, e))?;

        debug!(day = %day, sequence, "Allocated invoice sequence");
        Ok(InvoiceNumber::new(date, sequence))
    }

    /// Raises the counter for `invoice`'s day to at least its sequence.
    /// Never lowers it.
    pub async fn reserve_invoice_number(
        conn: &mut SqliteConnection,
        invoice: &InvoiceNumber,
    ) -> DbResult<()> {
        let day = InvoiceNumber::day_key(invoice.date);

        sqlx::query(
            r#"
            INSERT INTO invoice_sequences (day, last_seq) VALUES (?1, ?2)
            ON CONFLICT (day) DO UPDATE SET last_seq = MAX(last_seq, excluded.last_seq)
            "#,
        )
        .bind(&day)
        .bind(i64::from(invoice.sequence))
        .execute(&mut *conn)
        .await?;

        debug!(day = %day, sequence = invoice.sequence, "Reserved supplied invoice sequence");
        Ok(())
    }

    pub async fn invoice_exists(conn: &mut SqliteConnection, invoice_number: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM sales WHERE invoice_number = ?1)")
                .bind(invoice_number)
                .fetch_one(&mut *conn)
                .await?;

        Ok(exists)
    }

    /// Writes a sale with its items and payments.
    ///
    /// A clash on `invoice_number` is reported as
    /// [`CoreError::DuplicateInvoice`].
    pub async fn insert(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, invoice_number = %sale.invoice_number, "Inserting sale");

        let result = sqlx::query(
            r#"
            INSERT INTO sales (
                id, invoice_number, customer_id, customer_name, price_tier,
                subtotal_cents, total_discount_cents, tax_cents, total_cents, status,
                terminal_name, cashier_name, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.invoice_number)
        .bind(&sale.customer_id)
        .bind(&sale.customer_name)
        .bind(sale.price_tier)
        .bind(sale.subtotal_cents)
        .bind(sale.total_discount_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.status)
        .bind(&sale.terminal_name)
        .bind(&sale.cashier_name)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .execute(&mut *conn)
        .await;

        if let Err(e) = result {
            let err = DbError::from(e);
            if err.is_unique_violation_on("invoice_number") {
                return Err(CoreError::DuplicateInvoice(sale.invoice_number.clone()).into());
            }
            return Err(err);
        }

        for (line_no, item) in sale.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    sale_id, line_no, product_id, sku, name, category, quantity,
                    unit_price_cents, subtotal_cents, discount_amount_cents,
                    discount_percent, applied_rule, total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )
            .bind(&sale.id)
            .bind(line_no as i64)
            .bind(&item.product_id)
            .bind(&item.sku)
            .bind(&item.name)
            .bind(&item.category)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .bind(item.discount_amount_cents)
            .bind(item.discount_percent)
            .bind(&item.applied_rule)
            .bind(item.total_cents)
            .execute(&mut *conn)
            .await?;
        }

        for payment in &sale.payments {
            sqlx::query(
                "INSERT INTO payments (sale_id, method, amount_cents, reference) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&sale.id)
            .bind(payment.method)
            .bind(payment.amount_cents)
            .bind(&payment.reference)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}
