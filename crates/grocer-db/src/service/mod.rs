//! # Services
//!
//! Operations that span several repositories, each wrapped in one SQLite
//! transaction where it writes.
//!
//! ```text
//! ┌──────────────────────┬───────────────────────────────────────────────┐
//! │ DiscountService      │ load auto-apply rules → grocer_core::discount  │
//! │ SettlementService    │ invoice + sale + stock + logs   (one tx)       │
//! │ LoyaltyService       │ settings + balance + ledger row (one tx)       │
//! │ InventoryService     │ stock + log                     (one tx)       │
//! └──────────────────────┴───────────────────────────────────────────────┘
//! ```
//!
//! Services hold a pool handle and are created per call site through
//! [`Database`](crate::Database). The math itself lives in grocer-core;
//! services fetch its inputs and persist its outputs.

pub mod discount;
pub mod inventory;
pub mod loyalty;
pub mod settlement;

pub use discount::{CartLine, DiscountService};
pub use inventory::{InventoryService, MovementInfo, StockAlert, StockAlertStatus};
pub use loyalty::LoyaltyService;
pub use settlement::{SettlementOutcome, SettlementService};
