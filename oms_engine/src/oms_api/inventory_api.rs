use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{InventoryChangeType, InventoryTransaction, NewInventoryTransaction},
    traits::{InventoryManagement, OrderEngineError},
};

/// The inventory ledger.
pub struct InventoryApi<B> {
    db: B,
}

impl<B: Debug> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi ({:?})", self.db)
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Records a stock movement. The sign of the delta must agree with the change type: `Sale` and `Out` take stock,
    /// `In`, `Restock` and `Return` add it, and an `Adjustment` may go either way.
    pub async fn record(&self, change: NewInventoryTransaction) -> Result<InventoryTransaction, OrderEngineError> {
        let entry = self.db.record_inventory_change(change).await?;
        debug!("🔄️📊️ {} of {} recorded for product #{}", entry.change_type, entry.delta, entry.product_id);
        Ok(entry)
    }

    pub async fn restock(
        &self,
        product_id: i64,
        quantity: i64,
        actor: &str,
    ) -> Result<InventoryTransaction, OrderEngineError> {
        let change = NewInventoryTransaction::new(product_id, quantity, InventoryChangeType::Restock, "Restock")
            .with_actor(actor);
        self.record(change).await
    }

    pub async fn current_stock(&self, product_id: i64) -> Result<i64, OrderEngineError> {
        self.db.fetch_stock(product_id).await
    }

    /// Stock as computed from the ledger. Always equal to [`Self::current_stock`].
    pub async fn ledger_stock(&self, product_id: i64) -> Result<i64, OrderEngineError> {
        self.db.fetch_ledger_stock(product_id).await
    }

    pub async fn history(&self, product_id: i64) -> Result<Vec<InventoryTransaction>, OrderEngineError> {
        self.db.fetch_inventory_history(product_id).await
    }
}
