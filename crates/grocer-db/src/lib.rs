//! # grocer-db: Storage and Services for Grocer POS
//!
//! SQLite persistence (via sqlx) for the catalogue, customers, sales,
//! inventory movements and loyalty ledger, plus the services that run
//! grocer-core's business rules against that storage.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Grocer POS Data Flow                             │
//! │                                                                         │
//! │  Register / back office                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     grocer-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Services    │───►│  Repositories │───►│   Database   │   │   │
//! │  │   │               │    │               │    │  (pool.rs)   │   │   │
//! │  │   │ Discounts     │    │ ProductRepo   │    │              │   │   │
//! │  │   │ Settlement    │    │ SaleRepo      │    │ SqlitePool   │   │   │
//! │  │   │ Loyalty       │    │ CustomerRepo  │    │ Migrations   │   │   │
//! │  │   │ Inventory     │    │ ...           │    │              │   │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘   │   │
//! │  │           │ rules                                              │   │
//! │  │           ▼                                                    │   │
//! │  │      grocer-core (pure)                                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `pos.toml` loading with environment overrides
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Table-level data access
//! - [`service`] - Discount evaluation, sale settlement, loyalty and stock
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grocer_db::{Database, PosConfig};
//!
//! let config = PosConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let items = db
//!     .discounts(config.discount_policy())
//!     .price_cart(&lines, PriceTier::Retail)
//!     .await?;
//!
//! let outcome = db
//!     .settlement(config.settlement_policy())
//!     .settle_sale(draft)
//!     .await?;
//!
//! db.loyalty().earn_for_sale(&outcome.sale).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, PosConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    CustomerRepository, DiscountRuleRepository, InventoryLogRepository, LoyaltyRepository,
    ProductRepository, SaleRepository,
};

pub use service::{
    CartLine, DiscountService, InventoryService, LoyaltyService, MovementInfo, SettlementOutcome,
    SettlementService, StockAlert, StockAlertStatus,
};
