use std::collections::HashSet;

use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{
        BankReconciliation,
        BankTransaction,
        BankTransactionStatus,
        NewBankTransaction,
        ReconciliationOutcome,
    },
    traits::OrderEngineError,
};

pub async fn insert_bank_transaction(
    txn: NewBankTransaction,
    conn: &mut SqliteConnection,
) -> Result<BankTransaction, OrderEngineError> {
    let key = format!("{}/{}", txn.account_ref, txn.external_txn_id);
    let now = Utc::now();
    let txn: BankTransaction = sqlx::query_as(
        r#"
            INSERT INTO bank_transactions (
                account_ref,
                external_txn_id,
                amount,
                direction,
                description,
                posted_at,
                status,
                balance_after,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(txn.account_ref)
    .bind(txn.external_txn_id)
    .bind(txn.amount)
    .bind(txn.direction)
    .bind(txn.description)
    .bind(txn.posted_at)
    .bind(txn.status)
    .bind(txn.balance_after)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => OrderEngineError::BankTransactionAlreadyExists(key),
        _ => OrderEngineError::from(e),
    })?;
    debug!("🏦️ Bank transaction #{} [{}] of {} ingested", txn.id, txn.external_txn_id, txn.amount);
    Ok(txn)
}

/// Takes the write lock for the current transaction. Returns `false` if the bank transaction does not exist.
pub async fn lock_bank_transaction(id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE bank_transactions SET updated_at = updated_at WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_bank_transaction(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<BankTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM bank_transactions WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Bank transactions are immutable after ingestion, apart from their status.
pub async fn set_status(
    id: i64,
    status: BankTransactionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<BankTransaction>, sqlx::Error> {
    sqlx::query_as("UPDATE bank_transactions SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Incoming transactions that are still waiting to be settled and have no reconciliation record, oldest first.
pub async fn fetch_unreconciled(conn: &mut SqliteConnection) -> Result<Vec<BankTransaction>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT t.* FROM bank_transactions t
            LEFT JOIN bank_reconciliations r ON r.bank_transaction_id = t.id
            WHERE r.id IS NULL
              AND t.direction IN ('Credit', 'Transfer')
              AND t.status IN ('Pending', 'Posted')
            ORDER BY t.posted_at, t.id;
        "#,
    )
    .fetch_all(conn)
    .await
}

pub async fn fetch_reconciliation(
    bank_transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<BankReconciliation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM bank_reconciliations WHERE bank_transaction_id = $1")
        .bind(bank_transaction_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_reconciliations_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<BankReconciliation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM bank_reconciliations WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

/// Returns the subset of `payment_ids` that are already linked to a bank transaction.
pub async fn linked_payment_ids(
    payment_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<HashSet<i64>, sqlx::Error> {
    if payment_ids.is_empty() {
        return Ok(HashSet::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT payment_id FROM bank_reconciliations WHERE outcome <> 'Rejected' AND payment_id IN (",
    );
    let mut ids = builder.separated(", ");
    for id in payment_ids {
        ids.push_bind(*id);
    }
    builder.push(")");
    let linked: Vec<i64> = builder.build_query_scalar().fetch_all(conn).await?;
    Ok(linked.into_iter().collect())
}

/// The fields of a reconciliation record that the matcher or an operator decides on.
#[derive(Debug, Clone)]
pub struct ReconciliationRecord<'a> {
    pub payment_id: Option<i64>,
    pub order_id: Option<i64>,
    pub outcome: ReconciliationOutcome,
    pub actor: Option<&'a str>,
    pub note: Option<&'a str>,
}

pub async fn insert_reconciliation(
    bank_transaction_id: i64,
    record: ReconciliationRecord<'_>,
    conn: &mut SqliteConnection,
) -> Result<BankReconciliation, sqlx::Error> {
    let rec: BankReconciliation = sqlx::query_as(
        r#"
            INSERT INTO bank_reconciliations
                (bank_transaction_id, payment_id, order_id, outcome, actor, note, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(bank_transaction_id)
    .bind(record.payment_id)
    .bind(record.order_id)
    .bind(record.outcome)
    .bind(record.actor)
    .bind(record.note)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🏦️ Bank transaction #{bank_transaction_id} reconciled: {} (record #{})", rec.outcome, rec.id);
    Ok(rec)
}

/// Overwrites the outcome of an existing reconciliation record. Returns `None` if there is no record for the bank
/// transaction.
pub async fn override_reconciliation(
    bank_transaction_id: i64,
    record: ReconciliationRecord<'_>,
    conn: &mut SqliteConnection,
) -> Result<Option<BankReconciliation>, sqlx::Error> {
    let rec: Option<BankReconciliation> = sqlx::query_as(
        r#"
            UPDATE bank_reconciliations SET
                payment_id = $1,
                order_id = $2,
                outcome = $3,
                actor = $4,
                note = $5,
                updated_at = $6
            WHERE bank_transaction_id = $7
            RETURNING *;
        "#,
    )
    .bind(record.payment_id)
    .bind(record.order_id)
    .bind(record.outcome)
    .bind(record.actor)
    .bind(record.note)
    .bind(Utc::now())
    .bind(bank_transaction_id)
    .fetch_optional(conn)
    .await?;
    if let Some(r) = &rec {
        info!("🏦️ Reconciliation for bank transaction #{bank_transaction_id} overridden: {}", r.outcome);
    }
    Ok(rec)
}
