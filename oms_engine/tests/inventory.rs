use oms_engine::{
    db_types::{InventoryChangeType, NewInventoryTransaction},
    ErrorKind,
    OrderEngineError,
};

use crate::support::{cod_order, seed_catalog, TestSystem};

mod support;

#[tokio::test]
async fn order_lifecycle_moves_stock_through_the_ledger() {
    let sys = TestSystem::new().await;
    let catalog = seed_catalog(&sys.db, 10).await;
    let shirt = catalog.shirt.id;

    let cancelled = sys.orders.create(cod_order("alice", &catalog)).await.unwrap().id();
    let returned = sys.orders.create(cod_order("bob", &catalog)).await.unwrap().id();
    assert_eq!(sys.inventory.current_stock(shirt).await.unwrap(), 6);

    sys.orders.cancel(cancelled, "alice").await.unwrap();
    assert_eq!(sys.inventory.current_stock(shirt).await.unwrap(), 8);

    sys.orders.confirm(returned, "ops").await.unwrap();
    sys.orders.start_shipping(returned, None).await.unwrap();
    sys.orders.mark_delivered(returned, None).await.unwrap();
    sys.orders.return_order(returned, "Changed my mind", "support").await.unwrap();
    assert_eq!(sys.inventory.current_stock(shirt).await.unwrap(), 10);
    assert_eq!(sys.inventory.current_stock(catalog.mug.id).await.unwrap(), 10);

    let history = sys.inventory.history(shirt).await.unwrap();
    let movements = history.iter().map(|t| (t.change_type, t.delta)).collect::<Vec<_>>();
    use InventoryChangeType::*;
    assert_eq!(movements, vec![(In, 10), (Sale, -2), (Sale, -2), (Return, 2), (Return, 2)]);
    assert_eq!(history[1].order_id, Some(cancelled));
    assert_eq!(history[3].order_id, Some(cancelled));
    assert_eq!(history[3].actor.as_deref(), Some("alice"));
    assert_eq!(history[4].order_id, Some(returned));
    assert_eq!(history[4].actor.as_deref(), Some("support"));

    for product in [shirt, catalog.mug.id] {
        let counter = sys.inventory.current_stock(product).await.unwrap();
        let ledger = sys.inventory.ledger_stock(product).await.unwrap();
        assert_eq!(counter, ledger, "Product #{product}");
    }
    sys.shutdown().await;
}

#[tokio::test]
async fn manual_movements() {
    let sys = TestSystem::new().await;
    let catalog = seed_catalog(&sys.db, 3).await;
    let mug = catalog.mug.id;

    let entry = sys.inventory.restock(mug, 5, "warehouse").await.unwrap();
    assert_eq!(entry.change_type, InventoryChangeType::Restock);
    assert_eq!(entry.actor.as_deref(), Some("warehouse"));
    assert_eq!(sys.inventory.current_stock(mug).await.unwrap(), 8);

    let breakage = NewInventoryTransaction::new(mug, -1, InventoryChangeType::Adjustment, "Dropped a box");
    sys.inventory.record(breakage).await.unwrap();
    assert_eq!(sys.inventory.current_stock(mug).await.unwrap(), 7);

    let too_many = NewInventoryTransaction::new(mug, -9, InventoryChangeType::Out, "Transfer to store");
    let err = sys.inventory.record(too_many).await.unwrap_err();
    assert!(
        matches!(err, OrderEngineError::InsufficientStock { product_id, requested: 9, available: 7 }
            if product_id == mug),
        "{err}"
    );

    let zero = NewInventoryTransaction::new(mug, 0, InventoryChangeType::Adjustment, "Nothing");
    assert_eq!(sys.inventory.record(zero).await.unwrap_err().kind(), ErrorKind::Validation);
    let wrong_sign = NewInventoryTransaction::new(mug, 4, InventoryChangeType::Sale, "Backwards sale");
    assert_eq!(sys.inventory.record(wrong_sign).await.unwrap_err().kind(), ErrorKind::Validation);
    let unknown = NewInventoryTransaction::new(4_242, 1, InventoryChangeType::In, "Ghost stock");
    assert!(matches!(sys.inventory.record(unknown).await, Err(OrderEngineError::ProductNotFound(4_242))));

    assert_eq!(sys.inventory.current_stock(mug).await.unwrap(), 7);
    assert_eq!(sys.inventory.ledger_stock(mug).await.unwrap(), 7);
    assert_eq!(sys.inventory.history(mug).await.unwrap().len(), 3);
    sys.shutdown().await;
}

#[tokio::test]
async fn a_failed_line_rolls_back_the_whole_order() {
    let sys = TestSystem::new().await;
    let catalog = seed_catalog(&sys.db, 2).await;
    // Two shirts are available, but the mug line asks for more than there is.
    let mut order = cod_order("alice", &catalog);
    order.items[1].quantity = 3;
    let err = sys.orders.create(order).await.unwrap_err();
    assert!(
        matches!(err, OrderEngineError::InsufficientStock { product_id, requested: 3, available: 2 }
            if product_id == catalog.mug.id),
        "{err}"
    );
    assert_eq!(sys.inventory.current_stock(catalog.shirt.id).await.unwrap(), 2);
    assert_eq!(sys.inventory.history(catalog.shirt.id).await.unwrap().len(), 1);
    assert!(sys.orders.list_by_user("alice").await.unwrap().is_empty());
    sys.shutdown().await;
}
