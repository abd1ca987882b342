use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{BankReconciliation, BankTransaction, NewBankTransaction},
    events::{BankReconciledEvent, EventProducers},
    traits::{BankReconciliationManagement, ManualResolution, MatchOutcome, OrderEngineError},
};

/// Ingests the bank feed and reconciles it against the payment sub-ledger.
///
/// The matcher links a bank transaction to a payment when exactly one open payment has the same amount and is
/// referenced by the transaction, either through an order number in the description or through the bank's
/// transaction id. Anything else is left for an operator, via [`Self::resolve_manually`].
///
/// Reconciliation does not change payment or order status. Cash-on-delivery orders with a linked bank transaction
/// count as paid when they are completed.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B>
where B: BankReconciliationManagement
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Stores a bank transaction from the feed and tries to match it straight away.
    pub async fn ingest(&self, txn: NewBankTransaction) -> Result<(BankTransaction, MatchOutcome), OrderEngineError> {
        let (txn, outcome) = self.db.ingest_bank_transaction(txn).await?;
        debug!("🔄️🏦️ Bank transaction #{} ingested. Outcome: {outcome:?}", txn.id);
        if outcome.is_matched() {
            self.notify(&txn, &outcome).await;
        }
        Ok((txn, outcome))
    }

    /// Runs the matcher again for a single bank transaction.
    pub async fn reconcile(&self, bank_transaction_id: i64) -> Result<MatchOutcome, OrderEngineError> {
        let before = self.fetch(bank_transaction_id).await?;
        let outcome = self.db.reconcile_bank_transaction(bank_transaction_id).await?;
        if outcome.is_matched() && before.status.awaits_reconciliation() {
            let txn = self.fetch(bank_transaction_id).await?;
            self.notify(&txn, &outcome).await;
        }
        Ok(outcome)
    }

    /// Runs the matcher for every transaction that is still unreconciled, e.g. after orders that arrived late have
    /// been created. Each transaction is handled in its own unit of work.
    pub async fn rematch_unreconciled(&self) -> Result<Vec<(i64, MatchOutcome)>, OrderEngineError> {
        let pending = self.db.fetch_unreconciled_transactions().await?;
        let mut results = Vec::with_capacity(pending.len());
        for txn in pending {
            let outcome = self.reconcile(txn.id).await?;
            results.push((txn.id, outcome));
        }
        let matched = results.iter().filter(|(_, o)| o.is_matched()).count();
        info!("🔄️🏦️ Re-matched {} unreconciled bank transactions. {matched} matched.", results.len());
        Ok(results)
    }

    /// Records an operator's decision for a bank transaction, overriding the matcher.
    pub async fn resolve_manually(
        &self,
        bank_transaction_id: i64,
        resolution: ManualResolution,
        actor: &str,
    ) -> Result<BankReconciliation, OrderEngineError> {
        let rec = self.db.resolve_bank_transaction(bank_transaction_id, resolution, actor).await?;
        let outcome = match (rec.is_linked(), rec.payment_id, rec.order_id) {
            (true, Some(payment_id), Some(order_id)) => {
                MatchOutcome::Matched { payment_id, order_id, reconciliation_id: rec.id }
            },
            _ => MatchOutcome::Unmatched,
        };
        let txn = self.fetch(bank_transaction_id).await?;
        self.notify(&txn, &outcome).await;
        Ok(rec)
    }

    pub async fn fetch(&self, bank_transaction_id: i64) -> Result<BankTransaction, OrderEngineError> {
        self.db
            .fetch_bank_transaction(bank_transaction_id)
            .await?
            .ok_or(OrderEngineError::BankTransactionNotFound(bank_transaction_id))
    }

    pub async fn reconciliation_for(
        &self,
        bank_transaction_id: i64,
    ) -> Result<Option<BankReconciliation>, OrderEngineError> {
        self.db.fetch_reconciliation(bank_transaction_id).await
    }

    pub async fn reconciliations_for_order(&self, order_id: i64) -> Result<Vec<BankReconciliation>, OrderEngineError> {
        self.db.fetch_reconciliations_for_order(order_id).await
    }

    /// Incoming transactions that have neither been matched nor resolved, oldest first.
    pub async fn unreconciled(&self) -> Result<Vec<BankTransaction>, OrderEngineError> {
        self.db.fetch_unreconciled_transactions().await
    }

    async fn notify(&self, txn: &BankTransaction, outcome: &MatchOutcome) {
        for emitter in &self.producers.bank_reconciled_producer {
            emitter.publish_event(BankReconciledEvent::new(txn.clone(), outcome.clone())).await;
        }
    }
}
