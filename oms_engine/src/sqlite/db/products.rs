use chrono::Utc;
use log::*;
use oms_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::OrderEngineError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, OrderEngineError> {
    let sku = product.sku.clone();
    let now = Utc::now();
    let product: Product = sqlx::query_as(
        r#"
            INSERT INTO products (sku, name, unit_price, stock, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $4)
            RETURNING *;
        "#,
    )
    .bind(product.sku)
    .bind(product.name)
    .bind(product.unit_price)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => OrderEngineError::ProductAlreadyExists(sku),
        _ => OrderEngineError::from(e),
    })?;
    debug!("🗃️ Product {} [{}] created with id {}", product.name, product.sku, product.id);
    Ok(product)
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_product_by_sku(sku: &str, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE sku = $1").bind(sku).fetch_optional(conn).await
}

pub async fn update_price(
    id: i64,
    price: Money,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("UPDATE products SET unit_price = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(price)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Atomically applies `delta` to the product's stock counter, as long as the result is not negative.
///
/// This must always be paired with an inventory ledger insert in the same transaction. Use
/// [`super::inventory::record_change`] rather than calling this directly.
pub(crate) async fn adjust_stock(
    product_id: i64,
    delta: i64,
    conn: &mut SqliteConnection,
) -> Result<Product, OrderEngineError> {
    let updated: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products SET stock = stock + $1, updated_at = $2
            WHERE id = $3 AND stock + $1 >= 0
            RETURNING *;
        "#,
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(product) => {
            trace!("🗃️ Stock for product #{product_id} adjusted by {delta} to {}", product.stock);
            Ok(product)
        },
        None => match fetch_product(product_id, conn).await? {
            Some(product) => {
                debug!("🗃️ Product #{product_id} has {} in stock. Cannot take {}", product.stock, -delta);
                Err(OrderEngineError::InsufficientStock { product_id, requested: -delta, available: product.stock })
            },
            None => Err(OrderEngineError::ProductNotFound(product_id)),
        },
    }
}
