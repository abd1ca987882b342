//! Order Lifecycle Engine
//!
//! The engine keeps a small commerce back office consistent: it owns the order state machine, the payment
//! sub-ledger, the append-only inventory ledger and bank reconciliation. Every mutating operation runs as a single
//! database transaction, so concurrent callers never observe a half-applied change and stock is never oversold.
//!
//! The library is divided into three main sections:
//! 1. Database management ([`mod@sqlite`]). SQLite is the supported backend. You should never need to access the
//!    database directly. The data types stored in the database are defined in [`mod@db_types`] and are public.
//! 2. The backend contract ([`mod@traits`]). A backend implements these traits to act as storage for the engine.
//! 3. The public API ([`OrderFlowApi`], [`PaymentApi`], [`InventoryApi`], [`ReconciliationApi`] and [`CatalogApi`]).
//!
//! Pure business rules live in their own modules so that they can be used and tested without a database:
//! [`mod@state_machine`], [`mod@coupons`], [`mod@payments`] and [`mod@matcher`].
//!
//! The engine emits events when orders are created or change status, when payments change and when bank transactions
//! are reconciled. See [`mod@events`] for how to hook into them.
pub mod config;
pub mod coupons;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod matcher;
mod oms_api;
pub mod payments;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod state_machine;
pub mod traits;

pub use config::EngineConfig;
pub use db_types::OrderStatusType;
pub use oms_api::{
    catalog_api::CatalogApi,
    inventory_api::InventoryApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_api::PaymentApi,
    reconciliation_api::ReconciliationApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    BankReconciliationManagement,
    CatalogManagement,
    ErrorKind,
    InventoryManagement,
    OrderEngineError,
    OrderManagement,
    PaymentManagement,
};
