use crate::{
    db_types::{NewPayment, Payment},
    traits::OrderEngineError,
};

/// The payment sub-ledger. Payments are never deleted; a retry opens a new attempt.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement: Clone {
    /// Opens a new `Pending` payment attempt for an order.
    ///
    /// Rejected if the order is `Cancelled` or `Returned`, or if it already has a `Paid` payment.
    async fn open_payment(&self, payment: NewPayment) -> Result<Payment, OrderEngineError>;

    /// `Pending -> Paid`. Marking a `Paid` payment again is a no-op and returns the stored record unchanged.
    async fn mark_payment_paid(
        &self,
        payment_id: i64,
        external_txn_id: Option<String>,
    ) -> Result<Payment, OrderEngineError>;

    /// `Pending -> Failed`. Marking a `Failed` payment again is a no-op. A `Paid` payment can never fail.
    async fn mark_payment_failed(&self, payment_id: i64) -> Result<Payment, OrderEngineError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, OrderEngineError>;

    /// All attempts for the order, oldest first.
    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, OrderEngineError>;
}
