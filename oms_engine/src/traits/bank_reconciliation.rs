use crate::{
    db_types::{BankReconciliation, BankTransaction, NewBankTransaction},
    traits::{ManualResolution, MatchOutcome, OrderEngineError},
};

/// Ingestion of the external bank feed and reconciliation of bank transactions against payments.
///
/// The matcher only ever touches the bank transaction it is given and the payment it links to. It never changes
/// payment or order status.
#[allow(async_fn_in_trait)]
pub trait BankReconciliationManagement: Clone {
    /// Stores the transaction and runs the matcher in the same unit of work.
    ///
    /// A transaction with the same `(account_ref, external_txn_id)` is rejected with
    /// [`OrderEngineError::BankTransactionAlreadyExists`].
    async fn ingest_bank_transaction(
        &self,
        txn: NewBankTransaction,
    ) -> Result<(BankTransaction, MatchOutcome), OrderEngineError>;

    /// Runs the matcher for a previously ingested transaction. A transaction that already carries a linked
    /// reconciliation returns its existing match.
    async fn reconcile_bank_transaction(&self, bank_transaction_id: i64) -> Result<MatchOutcome, OrderEngineError>;

    /// Records an operator's decision, overriding any earlier outcome for the transaction.
    async fn resolve_bank_transaction(
        &self,
        bank_transaction_id: i64,
        resolution: ManualResolution,
        actor: &str,
    ) -> Result<BankReconciliation, OrderEngineError>;

    async fn fetch_bank_transaction(&self, id: i64) -> Result<Option<BankTransaction>, OrderEngineError>;

    async fn fetch_reconciliation(
        &self,
        bank_transaction_id: i64,
    ) -> Result<Option<BankReconciliation>, OrderEngineError>;

    async fn fetch_reconciliations_for_order(&self, order_id: i64)
        -> Result<Vec<BankReconciliation>, OrderEngineError>;

    /// Eligible incoming transactions that have no reconciliation record yet, oldest first.
    async fn fetch_unreconciled_transactions(&self) -> Result<Vec<BankTransaction>, OrderEngineError>;
}
