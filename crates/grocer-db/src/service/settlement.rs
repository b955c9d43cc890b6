//! # Settlement Service
//!
//! Turns a validated [`SaleDraft`] into a persisted [`Sale`].
//!
//! ## Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  draft.validate()                           ← nothing written yet       │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├─ customer must exist; fills customer_name                           │
//! │   ├─ invoice: caller's (unused; day counter bumped past it)             │
//! │   │           or next unused per-day sequence                           │
//! │   ├─ finalize: recompute line + sale totals, tax                        │
//! │   ├─ INSERT sales / sale_items / payments                               │
//! │   ├─ status == completed?                                               │
//! │   │    for each line:                                                   │
//! │   │      stock -= qty  ──► Applied      → INSERT inventory_logs (sale)  │
//! │   │                   ├─► Missing      → Skip: warn, record id          │
//! │   │                   │                  Fail: ProductNotFound          │
//! │   │                   └─► Insufficient → InsufficientStock              │
//! │  COMMIT                                     ← any error rolls back all  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::{
    CustomerRepository, InventoryLogRepository, ProductRepository, SaleRepository, StockUpdate,
};
use grocer_core::settlement::{
    sale_log_note, InvoiceNumber, OnMissingProduct, SaleDraft, SettlementPolicy,
};
use grocer_core::{round_stock, CoreError, InventoryLog, InventoryLogType, Sale, SaleStatus};

/// What settlement wrote.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub sale: Sale,
    /// One `sale` row per line whose product exists. Empty unless completed.
    pub inventory_logs: Vec<InventoryLog>,
    /// Product ids that were not found and left without a stock update.
    pub skipped_products: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SettlementService {
    pool: SqlitePool,
    policy: SettlementPolicy,
}

impl SettlementService {
    pub fn new(pool: SqlitePool, policy: SettlementPolicy) -> Self {
        SettlementService { pool, policy }
    }

    pub fn policy(&self) -> &SettlementPolicy {
        &self.policy
    }

    /// Settles a sale stamped with the current time.
    pub async fn settle_sale(&self, draft: SaleDraft) -> DbResult<SettlementOutcome> {
        self.settle_sale_at(draft, Utc::now()).await
    }

    /// Settles a sale as of `now`. The invoice date is `now`'s UTC date.
    pub async fn settle_sale_at(
        &self,
        mut draft: SaleDraft,
        now: DateTime<Utc>,
    ) -> DbResult<SettlementOutcome> {
        draft.validate()?;

        let mut tx = self.pool.begin().await?;

        if let Some(customer_id) = draft.customer_id.as_deref() {
            let customer = CustomerRepository::fetch(&mut *tx, customer_id)
                .await?
                .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;
            if draft.customer_name.is_none() {
                draft.customer_name = Some(customer.name);
            }
        }

        let invoice_number = match draft.invoice_number.take() {
            Some(supplied) => {
                let supplied: InvoiceNumber = supplied.parse()?;
                let supplied = supplied_invoice(&mut tx, supplied).await?;
                supplied.to_string()
            }
            None => next_free_invoice(&mut tx, now.date_naive()).await?,
        };

        let sale = draft.finalize(
            Uuid::new_v4().to_string(),
            invoice_number,
            self.policy.tax_rate,
            now,
        );

        SaleRepository::insert(&mut *tx, &sale).await?;

        let mut inventory_logs = Vec::new();
        let mut skipped_products = Vec::new();

        if sale.status.affects_inventory() {
            for item in &sale.items {
                let update = ProductRepository::apply_stock_delta(
                    &mut *tx,
                    &item.product_id,
                    -item.quantity,
                    self.policy.allow_negative_stock,
                )
                .await?;

                match update {
                    StockUpdate::Applied(change) => {
                        let log = InventoryLog {
                            id: Uuid::new_v4().to_string(),
                            quantity: round_stock(change.new_stock - change.previous_stock),
                            product_id: change.product_id,
                            log_type: InventoryLogType::Sale,
                            previous_stock: change.previous_stock,
                            new_stock: change.new_stock,
                            reference: Some(sale.invoice_number.clone()),
                            notes: Some(sale_log_note(&sale.invoice_number)),
                            created_by: sale.cashier_name.clone(),
                            created_at: now,
                        };
                        InventoryLogRepository::insert(&mut *tx, &log).await?;
                        inventory_logs.push(log);
                    }
                    StockUpdate::Missing => match self.policy.on_missing_product {
                        OnMissingProduct::Skip => {
                            warn!(
                                invoice_number = %sale.invoice_number,
                                product_id = %item.product_id,
                                sku = %item.sku,
                                "Sold product not found; stock not updated"
                            );
                            skipped_products.push(item.product_id.clone());
                        }
                        OnMissingProduct::Fail => {
                            return Err(CoreError::ProductNotFound(item.product_id.clone()).into());
                        }
                    },
                    StockUpdate::Insufficient { sku, available } => {
                        debug!(sku = %sku, available, requested = item.quantity, "Stock floor hit");
                        return Err(CoreError::InsufficientStock {
                            sku,
                            available,
                            requested: item.quantity,
                        }
                        .into());
                    }
                }
            }
        }

        tx.commit().await?;

        info!(
            invoice_number = %sale.invoice_number,
            status = sale.status.as_str(),
            items = sale.items.len(),
            total = %sale.total(),
            skipped = skipped_products.len(),
            "Sale settled"
        );

        Ok(SettlementOutcome {
            sale,
            inventory_logs,
            skipped_products,
        })
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    pub async fn sale(&self, id: &str) -> DbResult<Sale> {
        SaleRepository::new(self.pool.clone())
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(id.to_string()).into())
    }

    pub async fn sale_by_invoice(&self, invoice_number: &str) -> DbResult<Sale> {
        SaleRepository::new(self.pool.clone())
            .get_by_invoice(invoice_number)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(invoice_number.to_string()).into())
    }

    /// Sales newest first, `page_size` per page starting at page 0.
    pub async fn sales(
        &self,
        status: Option<SaleStatus>,
        page: u32,
        page_size: u32,
    ) -> DbResult<Vec<Sale>> {
        SaleRepository::new(self.pool.clone())
            .list(status, page_size, page.saturating_mul(page_size))
            .await
    }
}

// =============================================================================
// Tests
// =============================================================================

/// Claims a caller-supplied invoice number and moves its day's counter
/// past it, so later generated numbers for that day never collide.
async fn supplied_invoice(
    tx: &mut Transaction<'_, Sqlite>,
    invoice: InvoiceNumber,
) -> DbResult<InvoiceNumber> {
    let number = invoice.to_string();
    if SaleRepository::invoice_exists(&mut **tx, &number).await? {
        return Err(CoreError::DuplicateInvoice(number).into());
    }
    SaleRepository::reserve_invoice_number(&mut **tx, &invoice).await?;
    Ok(invoice)
}

/// Next generated number for `date`, stepping over any already taken.
async fn next_free_invoice(tx: &mut Transaction<'_, Sqlite>, date: NaiveDate) -> DbResult<String> {
    loop {
        let candidate = SaleRepository::next_invoice_number(&mut **tx, date)
            .await?
            .to_string();
        if !SaleRepository::invoice_exists(&mut **tx, &candidate).await? {
            return Ok(candidate);
        }
        warn!(invoice_number = %candidate, "Invoice number already used; allocating the next one");
    }
}
