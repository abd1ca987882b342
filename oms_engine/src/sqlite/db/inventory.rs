use chrono::Utc;
use log::*;
use sqlx::{FromRow, SqliteConnection};

use super::products;
use crate::{
    db_types::{InventoryChangeType, InventoryTransaction, NewInventoryTransaction, Product},
    traits::OrderEngineError,
};

/// Applies a stock movement to the product's counter and appends it to the ledger. This is not atomic on its own;
/// call it inside a transaction.
///
/// The counter is updated first, with a conditional write that refuses to take stock below zero.
pub async fn record_change(
    change: NewInventoryTransaction,
    conn: &mut SqliteConnection,
) -> Result<(Product, InventoryTransaction), OrderEngineError> {
    if change.delta == 0 {
        return Err(OrderEngineError::validation("An inventory movement cannot have a zero delta"));
    }
    if !change.change_type.accepts_delta(change.delta) {
        return Err(OrderEngineError::validation(format!(
            "A {} movement cannot have a delta of {}",
            change.change_type, change.delta
        )));
    }
    let product = products::adjust_stock(change.product_id, change.delta, conn).await?;
    let entry = insert_ledger_entry(change, conn).await?;
    Ok((product, entry))
}

/// Appends a ledger entry without touching the stock counter. Callers are responsible for having applied the same
/// delta with [`products::adjust_stock`] in the same transaction.
pub(crate) async fn insert_ledger_entry(
    change: NewInventoryTransaction,
    conn: &mut SqliteConnection,
) -> Result<InventoryTransaction, sqlx::Error> {
    let entry: InventoryTransaction = sqlx::query_as(
        r#"
            INSERT INTO inventory_transactions (product_id, delta, change_type, reason, actor, order_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(change.product_id)
    .bind(change.delta)
    .bind(change.change_type)
    .bind(change.reason)
    .bind(change.actor)
    .bind(change.order_id)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!(
        "🗃️ Ledger entry #{} recorded: {} {} for product #{}",
        entry.id, entry.change_type, entry.delta, entry.product_id
    );
    Ok(entry)
}

#[derive(Debug, FromRow)]
struct NetMovement {
    product_id: i64,
    net: i64,
}

/// Writes `Return` entries that undo the net stock taken by an order, product by product.
///
/// Returns the compensating ledger entries. Products whose net movement for the order is zero or positive are left
/// alone, so calling this on an order whose stock has already been returned writes nothing.
pub async fn return_stock_for_order(
    order_id: i64,
    reason: &str,
    actor: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryTransaction>, OrderEngineError> {
    let movements: Vec<NetMovement> = sqlx::query_as(
        r#"
            SELECT product_id, SUM(delta) AS net FROM inventory_transactions
            WHERE order_id = $1
            GROUP BY product_id
            HAVING SUM(delta) < 0
            ORDER BY product_id;
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    let mut entries = Vec::with_capacity(movements.len());
    for m in movements {
        let mut change = NewInventoryTransaction::new(m.product_id, -m.net, InventoryChangeType::Return, reason)
            .for_order(order_id);
        if let Some(actor) = actor {
            change = change.with_actor(actor);
        }
        let (_, entry) = record_change(change, conn).await?;
        entries.push(entry);
    }
    debug!("🗃️ {} products restocked for order #{order_id}", entries.len());
    Ok(entries)
}

/// The sum of all ledger deltas for the product.
pub async fn ledger_stock(product_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let total: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(delta), 0) FROM inventory_transactions WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(conn)
            .await?;
    Ok(total)
}

pub async fn fetch_history(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM inventory_transactions WHERE product_id = $1 ORDER BY id")
        .bind(product_id)
        .fetch_all(conn)
        .await
}
