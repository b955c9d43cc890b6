//! # Repository Module
//!
//! SQLite repositories for Grocer POS.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  &self methods                     associated fns (conn: &mut Conn)     │
//! │  ─────────────                     ───────────────────────────────      │
//! │  run on the repository's pool      run on a caller-owned transaction    │
//! │  reads, catalogue CRUD             stock, invoice counter, sale rows,   │
//! │                                    inventory logs, loyalty balances     │
//! │                                                                         │
//! │  db.products().get_by_id(id)       ProductRepository::apply_stock_delta │
//! │                                        (&mut *tx, id, -qty, false)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are read into private `*Row` structs (`sqlx::FromRow`) and
//! converted into grocer-core types; a row that no longer maps cleanly
//! surfaces as [`DbError::CorruptRow`](crate::DbError::CorruptRow).
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Product catalogue and stock
//! - [`DiscountRuleRepository`] - Discount rule CRUD
//! - [`CustomerRepository`] - Customer records
//! - [`SaleRepository`] - Sales, items, payments, invoice counter
//! - [`InventoryLogRepository`] - Stock movement audit trail
//! - [`LoyaltyRepository`] - Program settings, balances, transactions

pub mod customer;
pub mod discount_rule;
pub mod inventory;
pub mod loyalty;
pub mod product;
pub mod sale;

pub use customer::CustomerRepository;
pub use discount_rule::DiscountRuleRepository;
pub use inventory::InventoryLogRepository;
pub use loyalty::LoyaltyRepository;
pub use product::{ProductRepository, StockChange, StockUpdate};
pub use sale::SaleRepository;
