use crate::{
    db_types::{NewOrder, OrderNumber, Payment, ReturnRequest},
    order_objects::{OrderChanged, OrderQueryFilter},
    traits::{data_objects::OrderAggregate, OrderEngineError, OrderTransition},
};

/// The order state machine's persistence contract.
///
/// Every mutating method is a single unit of work: either everything it describes is written, or nothing is.
/// Transitions are guarded by the legal source statuses in [`crate::state_machine::OrderOperation`], evaluated at
/// write time, so two racing callers cannot both move the same order.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Stores a new order in a single atomic transaction:
    /// * stock is decremented for every line item, with a `Sale` ledger entry each. If any line cannot be filled,
    ///   nothing is written and [`OrderEngineError::InsufficientStock`] is returned.
    /// * the coupon, if any, is validated against the cart value at the time the order is stored.
    /// * the order is stored as `Pending`, with its first status history entry.
    /// * a `Pending` payment is opened for the full order total, using the order's payment method.
    ///
    /// `order.currency` must be set by the caller.
    async fn insert_order(&self, order: NewOrder) -> Result<OrderAggregate, OrderEngineError>;

    /// Applies `transition` to the order, along with its side effects:
    /// * `Cancel` returns the stock taken at creation and voids any open payments.
    /// * `Return` records a return request and returns the stock of every line item.
    /// * `Complete` checks the cash-on-delivery payment policy.
    ///
    /// Fails with [`OrderEngineError::InvalidTransition`] if the order is not in one of the operation's legal source
    /// statuses.
    async fn transition_order(
        &self,
        order_id: i64,
        transition: OrderTransition,
    ) -> Result<OrderChanged, OrderEngineError>;

    /// Marks the authoritative payment of a delivered cash-on-delivery order as `Paid`, or reverts it to `Pending`.
    /// The order status does not change. Re-confirming a paid order is a no-op.
    async fn confirm_cod_payment(&self, order_id: i64, paid: bool) -> Result<Payment, OrderEngineError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderAggregate>, OrderEngineError>;

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<OrderAggregate>, OrderEngineError>;

    /// Newest orders first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<OrderAggregate>, OrderEngineError>;

    async fn fetch_return_requests(&self, order_id: i64) -> Result<Vec<ReturnRequest>, OrderEngineError>;
}
