use std::{
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use log::*;
use oms_common::Money;
use oms_engine::{
    db_types::{NewBankTransaction, NewOrder, NewOrderItem, OrderStatusType, PaymentGateway},
    events::{EventHandlers, EventHooks},
    state_machine::OrderOperation,
    EngineConfig,
};
use tokio::runtime::Runtime;

use crate::support::{cod_order, seed_catalog, TestSystem};

mod support;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

async fn wait_for(counter: &HookCalled, expected: i32) {
    for _ in 0..50 {
        if counter.count() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[test]
fn lifecycle_hooks() {
    let rt = Runtime::new().unwrap();
    let created = HookCalled::default();
    let transitioned = HookCalled::default();
    let payments = HookCalled::default();
    let reconciled = HookCalled::default();
    let operations = Arc::new(Mutex::new(Vec::new()));
    let created_numbers = Arc::new(Mutex::new(Vec::new()));

    let mut hooks = EventHooks::default();
    let (c, n) = (created.clone(), Arc::clone(&created_numbers));
    hooks.on_order_created(move |ev| {
        info!("🪝️ Order created: {}", ev.order.order.order_number);
        n.lock().unwrap().push(ev.order.order.order_number.to_string());
        c.called();
        Box::pin(async {})
    });
    let (t, ops) = (transitioned.clone(), Arc::clone(&operations));
    hooks.on_order_transitioned(move |ev| {
        let json = serde_json::to_string(&ev).expect("Events serialize to JSON");
        debug!("🪝️ {json}");
        ops.lock().unwrap().push((ev.operation, ev.old_order.status, ev.new_order.status));
        let t = t.clone();
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            t.called();
        })
    });
    let p = payments.clone();
    hooks.on_payment_updated(move |ev| {
        debug!("🪝️ Payment #{} is {}", ev.payment.id, ev.payment.status);
        p.called();
        Box::pin(async {})
    });
    let r = reconciled.clone();
    hooks.on_bank_reconciled(move |ev| {
        assert!(ev.outcome.is_matched());
        r.called();
        Box::pin(async {})
    });

    rt.block_on(async {
        let handlers = EventHandlers::new(EngineConfig::default().event_buffer_size, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let sys = TestSystem::with_producers(producers).await;
        let catalog = seed_catalog(&sys.db, 10).await;

        let first = sys.orders.create(cod_order("alice", &catalog)).await.unwrap();
        let online = NewOrder::new("bob", vec![NewOrderItem::new(catalog.mug.id, 1)], PaymentGateway::new("momo"));
        let second = sys.orders.create(online).await.unwrap();
        sys.orders.confirm(first.id(), "ops").await.unwrap();
        sys.orders.cancel(second.id(), "bob").await.unwrap();
        // Rejected transitions publish nothing
        assert!(sys.orders.cancel(first.id(), "alice").await.is_err());

        sys.orders.start_shipping(first.id(), None).await.unwrap();
        sys.orders.mark_delivered(first.id(), None).await.unwrap();
        sys.orders.confirm_payment(first.id(), true).await.unwrap();

        let description = format!("COD remittance {}", first.order.order_number);
        let feed = NewBankTransaction::credit("VCB-0071", "FT24100", Money::from(130_000), description.as_str());
        let (_, outcome) = sys.bank.ingest(feed).await.unwrap();
        assert!(outcome.is_matched());
        let unmatched = NewBankTransaction::credit("VCB-0071", "FT24101", Money::from(1), "Interest");
        sys.bank.ingest(unmatched).await.unwrap();

        wait_for(&created, 2).await;
        wait_for(&transitioned, 4).await;
        wait_for(&payments, 1).await;
        wait_for(&reconciled, 1).await;
        sys.shutdown().await;
    });

    assert_eq!(created.count(), 2);
    assert_eq!(transitioned.count(), 4);
    assert_eq!(payments.count(), 1);
    assert_eq!(reconciled.count(), 1);
    assert_eq!(created_numbers.lock().unwrap().len(), 2);
    let ops = operations.lock().unwrap();
    assert!(ops.contains(&(OrderOperation::Cancel, OrderStatusType::Pending, OrderStatusType::Cancelled)));
    assert_eq!(ops.iter().filter(|(op, _, _)| *op == OrderOperation::Confirm).count(), 1);
    info!("🪝️ test complete");
}
