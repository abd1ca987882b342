//! # Backend contracts
//!
//! This module defines the behaviour that a storage backend must provide in order to drive the order lifecycle
//! engine. The public APIs, such as [`OrderFlowApi`](crate::OrderFlowApi), are generic over these traits, and
//! [`SqliteDatabase`](crate::SqliteDatabase) implements all of them.
//!
//! * [`OrderManagement`] stores orders and applies state machine transitions together with their side effects.
//! * [`PaymentManagement`] is the payment sub-ledger.
//! * [`InventoryManagement`] is the inventory ledger.
//! * [`CatalogManagement`] stores the products and coupons that orders refer to.
//! * [`BankReconciliationManagement`] ingests bank transactions and links them to payments.
mod bank_reconciliation;
mod catalog_management;
mod data_objects;
mod errors;
mod inventory_management;
mod order_management;
mod payment_management;

pub use bank_reconciliation::BankReconciliationManagement;
pub use catalog_management::CatalogManagement;
pub use data_objects::{ManualResolution, MatchCandidate, MatchOutcome, OrderAggregate, OrderTransition};
pub use errors::{ErrorKind, OrderEngineError};
pub use inventory_management::InventoryManagement;
pub use order_management::OrderManagement;
pub use payment_management::PaymentManagement;
