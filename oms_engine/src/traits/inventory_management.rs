use crate::{
    db_types::{InventoryTransaction, NewInventoryTransaction},
    traits::OrderEngineError,
};

/// The append-only inventory ledger and the materialized stock counter that it keeps in sync.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement: Clone {
    /// Applies the stock movement and appends it to the ledger, atomically. Stock can never drop below zero.
    async fn record_inventory_change(
        &self,
        change: NewInventoryTransaction,
    ) -> Result<InventoryTransaction, OrderEngineError>;

    /// The materialized stock counter.
    async fn fetch_stock(&self, product_id: i64) -> Result<i64, OrderEngineError>;

    /// The sum of every ledger delta for the product. Always equal to [`Self::fetch_stock`].
    async fn fetch_ledger_stock(&self, product_id: i64) -> Result<i64, OrderEngineError>;

    /// Ledger entries for the product in insertion order.
    async fn fetch_inventory_history(&self, product_id: i64) -> Result<Vec<InventoryTransaction>, OrderEngineError>;
}
