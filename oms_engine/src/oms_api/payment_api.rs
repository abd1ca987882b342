use std::fmt::Debug;

use log::*;
use oms_common::Money;

use crate::{
    db_types::{NewPayment, Payment, PaymentGateway},
    events::{EventProducers, PaymentUpdatedEvent},
    payments::authoritative_payment,
    traits::{OrderEngineError, PaymentManagement},
};

/// The payment sub-ledger. Gateway callbacks land here.
pub struct PaymentApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PaymentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi")
    }
}

impl<B> PaymentApi<B>
where B: PaymentManagement
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Opens a new payment attempt, e.g. when the customer retries after a failed gateway payment.
    pub async fn open(
        &self,
        order_id: i64,
        gateway: PaymentGateway,
        amount: Money,
    ) -> Result<Payment, OrderEngineError> {
        if !amount.is_positive() {
            return Err(OrderEngineError::validation(format!("A payment amount must be positive. Got {amount}")));
        }
        let payment = self.db.open_payment(NewPayment::new(order_id, gateway, amount)).await?;
        debug!("🔄️💰️ Payment #{} opened for order #{order_id}", payment.id);
        self.notify(&payment).await;
        Ok(payment)
    }

    /// Gateway success callback.
    pub async fn mark_paid(
        &self,
        payment_id: i64,
        external_txn_id: Option<String>,
    ) -> Result<Payment, OrderEngineError> {
        let payment = self.db.mark_payment_paid(payment_id, external_txn_id).await?;
        self.notify(&payment).await;
        Ok(payment)
    }

    /// Gateway failure callback.
    pub async fn mark_failed(&self, payment_id: i64) -> Result<Payment, OrderEngineError> {
        let payment = self.db.mark_payment_failed(payment_id).await?;
        self.notify(&payment).await;
        Ok(payment)
    }

    pub async fn payment(&self, payment_id: i64) -> Result<Payment, OrderEngineError> {
        self.db.fetch_payment(payment_id).await?.ok_or(OrderEngineError::PaymentNotFound(payment_id))
    }

    /// The payment that represents the order's payment state. See [`authoritative_payment`].
    pub async fn authoritative_payment(&self, order_id: i64) -> Result<Option<Payment>, OrderEngineError> {
        let attempts = self.db.fetch_payments_for_order(order_id).await?;
        Ok(authoritative_payment(&attempts).cloned())
    }

    /// Every attempt for the order, oldest first.
    pub async fn payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, OrderEngineError> {
        self.db.fetch_payments_for_order(order_id).await
    }

    async fn notify(&self, payment: &Payment) {
        for emitter in &self.producers.payment_updated_producer {
            emitter.publish_event(PaymentUpdatedEvent::new(payment.clone())).await;
        }
    }
}
