use std::fmt::Debug;

use log::*;
use oms_common::DEFAULT_CURRENCY_CODE;

use crate::{
    config::EngineConfig,
    db_types::{NewOrder, OrderNumber, OrderStatusType, Payment, ReturnRequest},
    events::{EventProducers, OrderCreatedEvent, OrderTransitionedEvent, PaymentUpdatedEvent},
    order_objects::{OrderChanged, OrderQueryFilter},
    traits::{OrderAggregate, OrderEngineError, OrderManagement, OrderTransition},
};

/// `OrderFlowApi` is the order state machine. It creates orders and moves them along the legal edges of the
/// lifecycle, keeping stock and payments consistent with each step.
///
/// | From \ Op | confirm   | start_shipping | mark_delivered | cancel    | confirm_payment | complete  | return_order |
/// |-----------|-----------|----------------|----------------|-----------|-----------------|-----------|--------------|
/// | Pending   | Confirmed |                |                | Cancelled |                 |           |              |
/// | Confirmed |           | Shipping       |                |           |                 |           |              |
/// | Shipping  |           |                | Delivered      |           |                 |           |              |
/// | Delivered |           |                |                |           | Delivered       | Completed | Returned     |
/// | Completed |           |                |                |           |                 |           | Returned     |
///
/// Every other combination fails with [`OrderEngineError::InvalidTransition`].
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    currency: String,
    require_cod_payment_on_complete: bool,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self {
            db,
            producers,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            require_cod_payment_on_complete: true,
        }
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.currency = config.currency.clone();
        self.require_cod_payment_on_complete = config.require_cod_payment_on_complete;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    /// Places a new order.
    ///
    /// In a single unit of work, stock is taken for every line item, the coupon (if any) is applied, the order is
    /// stored as `Pending` and a `Pending` payment is opened using the order's payment method. If any step fails,
    /// nothing is written.
    pub async fn create(&self, mut order: NewOrder) -> Result<OrderAggregate, OrderEngineError> {
        if order.currency.is_none() {
            order.currency = Some(self.currency.clone());
        }
        let created = self.db.insert_order(order).await?;
        for emitter in &self.producers.order_created_producer {
            trace!("🔄️📝️ Notifying order created hook subscribers");
            emitter.publish_event(OrderCreatedEvent::new(created.clone())).await;
        }
        Ok(created)
    }

    /// `Pending -> Confirmed`. Once confirmed, an order can no longer be cancelled.
    pub async fn confirm(&self, order_id: i64, actor: &str) -> Result<OrderAggregate, OrderEngineError> {
        self.transition(order_id, OrderTransition::Confirm { actor: actor.to_string() }).await
    }

    /// `Confirmed -> Shipping`
    pub async fn start_shipping(&self, order_id: i64, actor: Option<&str>) -> Result<OrderAggregate, OrderEngineError> {
        self.transition(order_id, OrderTransition::StartShipping { actor: actor.map(String::from) }).await
    }

    /// `Shipping -> Delivered`
    pub async fn mark_delivered(&self, order_id: i64, actor: Option<&str>) -> Result<OrderAggregate, OrderEngineError> {
        self.transition(order_id, OrderTransition::MarkDelivered { actor: actor.map(String::from) }).await
    }

    /// `Pending -> Cancelled`. The stock taken when the order was created is returned, and every open payment is
    /// voided.
    pub async fn cancel(&self, order_id: i64, actor: &str) -> Result<OrderAggregate, OrderEngineError> {
        self.transition(order_id, OrderTransition::Cancel { actor: actor.to_string() }).await
    }

    /// Records (`paid == true`) or retracts the cash-on-delivery payment for a delivered order. The order status does
    /// not change; call [`Self::complete`] afterwards.
    pub async fn confirm_payment(&self, order_id: i64, paid: bool) -> Result<Payment, OrderEngineError> {
        let payment = self.db.confirm_cod_payment(order_id, paid).await?;
        for emitter in &self.producers.payment_updated_producer {
            emitter.publish_event(PaymentUpdatedEvent::new(payment.clone())).await;
        }
        Ok(payment)
    }

    /// `Delivered -> Completed`.
    ///
    /// Unless the engine is configured otherwise, a cash-on-delivery order must have proof of payment first: a
    /// confirmed payment (see [`Self::confirm_payment`]) or a reconciled bank transaction. Otherwise this fails with
    /// [`OrderEngineError::PaymentOutstanding`].
    pub async fn complete(&self, order_id: i64, actor: Option<&str>) -> Result<OrderAggregate, OrderEngineError> {
        let transition = OrderTransition::Complete {
            actor: actor.map(String::from),
            require_cod_payment: self.require_cod_payment_on_complete,
        };
        self.transition(order_id, transition).await
    }

    /// `Delivered | Completed -> Returned`. A reason is mandatory. The stock of every line item is returned.
    pub async fn return_order(
        &self,
        order_id: i64,
        reason: &str,
        processed_by: &str,
    ) -> Result<OrderAggregate, OrderEngineError> {
        if reason.trim().is_empty() {
            return Err(OrderEngineError::validation("A reason is required to return an order"));
        }
        let transition = OrderTransition::Return { reason: reason.to_string(), processed_by: processed_by.to_string() };
        self.transition(order_id, transition).await
    }

    async fn transition(
        &self,
        order_id: i64,
        transition: OrderTransition,
    ) -> Result<OrderAggregate, OrderEngineError> {
        let operation = transition.operation();
        trace!("🔄️📝️ Order #{order_id}: {operation} requested");
        let OrderChanged { old_order, new_order } = self.db.transition_order(order_id, transition).await?;
        let number = &new_order.order_number;
        debug!("🔄️📝️ Order [{number}] moved from {} to {}", old_order.status, new_order.status);
        for emitter in &self.producers.order_transitioned_producer {
            let event = OrderTransitionedEvent::new(operation, old_order.clone(), new_order.clone());
            emitter.publish_event(event).await;
        }
        self.get(order_id).await
    }

    pub async fn get(&self, order_id: i64) -> Result<OrderAggregate, OrderEngineError> {
        self.db.fetch_order(order_id).await?.ok_or(OrderEngineError::OrderNotFound(order_id))
    }

    pub async fn get_by_number(&self, number: &OrderNumber) -> Result<OrderAggregate, OrderEngineError> {
        self.db
            .fetch_order_by_number(number)
            .await?
            .ok_or_else(|| OrderEngineError::OrderNumberNotFound(number.clone()))
    }

    /// Newest first
    pub async fn list_by_status(&self, status: OrderStatusType) -> Result<Vec<OrderAggregate>, OrderEngineError> {
        self.db.search_orders(OrderQueryFilter::default().with_status(status)).await
    }

    /// Newest first
    pub async fn list_by_user(&self, customer_id: &str) -> Result<Vec<OrderAggregate>, OrderEngineError> {
        self.db.search_orders(OrderQueryFilter::default().with_customer_id(customer_id)).await
    }

    pub async fn search(&self, query: OrderQueryFilter) -> Result<Vec<OrderAggregate>, OrderEngineError> {
        trace!("🔄️📝️ Searching orders. {query}");
        self.db.search_orders(query).await
    }

    pub async fn return_requests(&self, order_id: i64) -> Result<Vec<ReturnRequest>, OrderEngineError> {
        self.db.fetch_return_requests(order_id).await
    }
}
