use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    BankReconciledEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderCreatedEvent,
    OrderTransitionedEvent,
    PaymentUpdatedEvent,
};

pub type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub order_transitioned_producer: Vec<EventProducer<OrderTransitionedEvent>>,
    pub payment_updated_producer: Vec<EventProducer<PaymentUpdatedEvent>>,
    pub bank_reconciled_producer: Vec<EventProducer<BankReconciledEvent>>,
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_order_transitioned: Option<EventHandler<OrderTransitionedEvent>>,
    pub on_payment_updated: Option<EventHandler<PaymentUpdatedEvent>>,
    pub on_bank_reconciled: Option<EventHandler<BankReconciledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_created = hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f));
        let on_order_transitioned = hooks.on_order_transitioned.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_updated = hooks.on_payment_updated.map(|f| EventHandler::new(buffer_size, f));
        let on_bank_reconciled = hooks.on_bank_reconciled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_created, on_order_transitioned, on_payment_updated, on_bank_reconciled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_transitioned {
            result.order_transitioned_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_updated {
            result.payment_updated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_bank_reconciled {
            result.bank_reconciled_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task for every configured handler. Each handler shuts down once all of its producers are dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_transitioned {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payment_updated {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_bank_reconciled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_order_transitioned: Option<Handler<OrderTransitionedEvent>>,
    pub on_payment_updated: Option<Handler<PaymentUpdatedEvent>>,
    pub on_bank_reconciled: Option<Handler<BankReconciledEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_order_transitioned<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderTransitionedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_transitioned = Some(Arc::new(f));
        self
    }

    pub fn on_payment_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentUpdatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_updated = Some(Arc::new(f));
        self
    }

    pub fn on_bank_reconciled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BankReconciledEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_bank_reconciled = Some(Arc::new(f));
        self
    }
}
