use chrono::{DateTime, Utc};
use log::*;
use oms_common::Money;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{
        NewOrder,
        Order,
        OrderItem,
        OrderNumber,
        OrderStatusType,
        ReturnRequest,
        StatusHistoryEntry,
    },
    order_objects::{OrderQueryFilter, OrderTotals},
    traits::OrderEngineError,
};

/// Inserts a new order row in `Pending` status. This is not atomic. Embed the call in a transaction along with the
/// line items, the status history entry and the opening payment.
pub async fn insert_order(
    order: &NewOrder,
    order_number: &OrderNumber,
    currency: &str,
    totals: &OrderTotals,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderEngineError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                customer_id,
                status,
                subtotal,
                discount_amount,
                shipping_fee,
                tax_amount,
                total_amount,
                currency,
                coupon_code,
                payment_method,
                shipping_address_id,
                billing_address_id,
                notes,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
            RETURNING *;
        "#,
    )
    .bind(order_number)
    .bind(&order.customer_id)
    .bind(OrderStatusType::Pending)
    .bind(totals.subtotal)
    .bind(totals.discount_amount)
    .bind(totals.shipping_fee)
    .bind(totals.tax_amount)
    .bind(totals.total_amount)
    .bind(currency)
    .bind(&order.coupon_code)
    .bind(&order.payment_method)
    .bind(&order.shipping_address_id)
    .bind(&order.billing_address_id)
    .bind(&order.notes)
    .bind(created_at)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            OrderEngineError::OrderNumberAlreadyExists(order_number.clone())
        },
        _ => OrderEngineError::from(e),
    })?;
    debug!("📝️ Order [{}] inserted with id {}", order.order_number, order.id);
    Ok(order)
}

pub async fn insert_item(
    order_id: i64,
    product_id: i64,
    quantity: i64,
    unit_price: Money,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price, total_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price)
    .bind(unit_price * quantity)
    .fetch_one(conn)
    .await
}

pub async fn insert_history_entry(
    order_id: i64,
    status: OrderStatusType,
    actor: Option<&str>,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<StatusHistoryEntry, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO order_status_history (order_id, status, actor, changed_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(status)
    .bind(actor)
    .bind(at)
    .fetch_one(conn)
    .await
}

pub async fn insert_return_request(
    order_id: i64,
    reason: &str,
    processed_by: &str,
    conn: &mut SqliteConnection,
) -> Result<ReturnRequest, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO return_requests (order_id, reason, processed_by, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(reason)
    .bind(processed_by)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

/// Takes the write lock for the current transaction. Returns `false` if the order does not exist.
pub async fn lock_order(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE orders SET updated_at = updated_at WHERE id = $1").bind(order_id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Moves the order to `target`, but only if its current status is one of `sources`. Returns `None` if the guard does
/// not hold, in which case nothing is written.
///
/// `processed_by`, if given, replaces the order's recorded processor.
pub async fn update_status(
    order_id: i64,
    sources: &[OrderStatusType],
    target: OrderStatusType,
    processed_by: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(target);
    builder.push(", updated_at = ");
    builder.push_bind(Utc::now());
    builder.push(", processed_by = COALESCE(");
    builder.push_bind(processed_by);
    builder.push(", processed_by) WHERE id = ");
    builder.push_bind(order_id);
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for s in sources {
        statuses.push_bind(*s);
    }
    builder.push(") RETURNING *");
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    if let Some(o) = &order {
        trace!("📝️ Order #{order_id} is now {}", o.status);
    }
    Ok(order)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(number.as_str()).fetch_optional(conn).await
}

/// Fetches every order whose number is in `numbers`.
pub async fn fetch_orders_by_numbers(
    numbers: &[OrderNumber],
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    if numbers.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders WHERE order_number IN (");
    let mut list = builder.separated(", ");
    for n in numbers {
        list.push_bind(n.as_str());
    }
    builder.push(") ORDER BY id");
    builder.build_query_as::<Order>().fetch_all(conn).await
}

pub async fn fetch_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

pub async fn fetch_history(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusHistoryEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_return_requests(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ReturnRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM return_requests WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

/// Fetches orders according to the criteria in the `OrderQueryFilter`.
///
/// Newest orders come first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(number) = query.order_number {
        where_clause.push("order_number = ");
        where_clause.push_bind_unseparated(number.0);
    }
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(method) = query.payment_method {
        where_clause.push("payment_method = ");
        where_clause.push_bind_unseparated(method);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, s) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(s);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📝️ Order search returned {} results", orders.len());
    Ok(orders)
}
