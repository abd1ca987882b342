use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewPayment, Payment, PaymentStatus},
    traits::OrderEngineError,
};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, sqlx::Error> {
    let payment: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, gateway, status, amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.gateway)
    .bind(PaymentStatus::Pending)
    .bind(payment.amount)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!(
        "💰️ Payment #{} of {} opened for order #{} via {}",
        payment.id, payment.amount, payment.order_id, payment.gateway
    );
    Ok(payment)
}

/// Takes the write lock for the current transaction. Returns `false` if the payment does not exist.
pub async fn lock_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE payments SET updated_at = updated_at WHERE id = $1")
        .bind(payment_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(payment_id).fetch_optional(conn).await
}

/// Oldest attempt first.
pub async fn fetch_payments_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at, id")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_payments_for_orders(
    order_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM payments WHERE order_id IN (");
    let mut ids = builder.separated(", ");
    for id in order_ids {
        ids.push_bind(*id);
    }
    builder.push(") ORDER BY id");
    builder.build_query_as::<Payment>().fetch_all(conn).await
}

pub async fn fetch_payment_by_external_txn_id(
    external_txn_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE external_txn_id = $1")
        .bind(external_txn_id)
        .fetch_optional(conn)
        .await
}

/// `Pending -> Paid`. Returns `None` if the payment was not `Pending`.
pub async fn mark_paid(
    payment_id: i64,
    external_txn_id: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, OrderEngineError> {
    let txn_id = external_txn_id.clone().unwrap_or_default();
    let now = Utc::now();
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = 'Paid',
                paid_at = $1,
                updated_at = $1,
                external_txn_id = COALESCE($2, external_txn_id)
            WHERE id = $3 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(external_txn_id)
    .bind(payment_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => OrderEngineError::ExternalTxnIdAlreadyUsed(txn_id),
        _ => OrderEngineError::from(e),
    })?;
    Ok(payment)
}

/// `Pending -> Failed`. Returns `None` if the payment was not `Pending`.
pub async fn mark_failed(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE payments SET status = 'Failed', updated_at = $1 WHERE id = $2 AND status = 'Pending' RETURNING *",
    )
    .bind(Utc::now())
    .bind(payment_id)
    .fetch_optional(conn)
    .await
}

/// `Paid -> Pending`, clearing the payment time. Only used to correct a mistaken cash-on-delivery confirmation.
pub async fn revert_to_pending(payment_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE payments SET status = 'Pending', paid_at = NULL, updated_at = $1 WHERE id = $2 AND status = 'Paid' \
         RETURNING *",
    )
    .bind(Utc::now())
    .bind(payment_id)
    .fetch_optional(conn)
    .await
}

/// Voids every `Pending` payment for the order, returning the voided records.
pub async fn void_open_payments(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    let voided: Vec<Payment> = sqlx::query_as(
        "UPDATE payments SET status = 'Void', updated_at = $1 WHERE order_id = $2 AND status = 'Pending' RETURNING *",
    )
    .bind(Utc::now())
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    debug!("💰️ {} open payments voided for order #{order_id}", voided.len());
    Ok(voided)
}
