use std::str::FromStr;

use cucumber::{then, when};
use oms_common::Money;
use oms_engine::db_types::{
    BankTransactionStatus,
    NewBankTransaction,
    NewOrder,
    NewOrderItem,
    OrderStatusType,
    PaymentGateway,
    PaymentStatus,
};

use crate::cucumber::OmsWorld;

const ACCOUNT: &str = "VCB-0071";

#[when(expr = "customer {string} adds {int} x {string} to the cart")]
async fn add_to_cart(world: &mut OmsWorld, customer: String, quantity: i64, sku: String) {
    let product_id = world.product_id(&sku).await;
    let cart = world.cart.get_or_insert_with(|| NewOrder::new(customer, vec![], PaymentGateway::cash_on_delivery()));
    cart.items.push(NewOrderItem::new(product_id, quantity));
}

#[when(expr = "the cart uses coupon {string}")]
async fn use_coupon(world: &mut OmsWorld, code: String) {
    let cart = world.cart.as_mut().expect("The cart is empty");
    cart.coupon_code = Some(code);
}

#[when(expr = "the cart has a shipping fee of {int}")]
async fn shipping_fee(world: &mut OmsWorld, fee: i64) {
    let cart = world.cart.as_mut().expect("The cart is empty");
    cart.shipping_fee = Money::from(fee);
}

#[when(expr = "the cart is checked out with {word} as order {word}")]
async fn checkout(world: &mut OmsWorld, gateway: String, alias: String) {
    let cart = world.cart.take().expect("The cart is empty");
    place_order(world, cart, gateway, alias).await;
}

#[when(expr = "the cart is checked out with {word} as order {word} numbered {string}")]
async fn checkout_numbered(world: &mut OmsWorld, gateway: String, alias: String, number: String) {
    let cart = world.cart.take().expect("The cart is empty").with_order_number(number);
    place_order(world, cart, gateway, alias).await;
}

async fn place_order(world: &mut OmsWorld, mut cart: NewOrder, gateway: String, alias: String) {
    cart.payment_method = PaymentGateway::new(gateway);
    let result = world.system().orders.create(cart).await;
    if let Some(order) = world.record(result) {
        world.orders.insert(alias, order.id());
    }
}

#[when(expr = "order {word} is confirmed by {string}")]
async fn confirm(world: &mut OmsWorld, alias: String, actor: String) {
    let result = world.system().orders.confirm(world.order_id(&alias), &actor).await;
    world.record(result);
}

#[when(expr = "order {word} starts shipping")]
async fn start_shipping(world: &mut OmsWorld, alias: String) {
    let result = world.system().orders.start_shipping(world.order_id(&alias), Some("warehouse")).await;
    world.record(result);
}

#[when(expr = "order {word} is delivered")]
async fn delivered(world: &mut OmsWorld, alias: String) {
    let result = world.system().orders.mark_delivered(world.order_id(&alias), None).await;
    world.record(result);
}

#[when(expr = "order {word} is cancelled by {string}")]
async fn cancel(world: &mut OmsWorld, alias: String, actor: String) {
    let result = world.system().orders.cancel(world.order_id(&alias), &actor).await;
    world.record(result);
}

#[when(expr = "the courier hands over the cash for order {word}")]
async fn cash_received(world: &mut OmsWorld, alias: String) {
    let result = world.system().orders.confirm_payment(world.order_id(&alias), true).await;
    world.record(result);
}

#[when(expr = "order {word} is completed")]
async fn complete(world: &mut OmsWorld, alias: String) {
    let result = world.system().orders.complete(world.order_id(&alias), Some("ops")).await;
    world.record(result);
}

#[when(expr = "order {word} is returned to {string} because {string}")]
async fn return_order(world: &mut OmsWorld, alias: String, processed_by: String, reason: String) {
    let result = world.system().orders.return_order(world.order_id(&alias), &reason, &processed_by).await;
    world.record(result);
}

#[when(expr = "the gateway settles order {word} with reference {string}")]
async fn gateway_settles(world: &mut OmsWorld, alias: String, reference: String) {
    let order = world.system().orders.get(world.order_id(&alias)).await.expect("Error fetching order");
    let payment = order.payment.expect("The order has no payment");
    let result = world.system().payments.mark_paid(payment.id, Some(reference)).await;
    world.record(result);
}

#[when(expr = "the bank reports a credit {string} of {int} mentioning order {word}")]
async fn bank_credit_for_order(world: &mut OmsWorld, reference: String, amount: i64, alias: String) {
    let order = world.system().orders.get(world.order_id(&alias)).await.expect("Error fetching order");
    let description = format!("Chuyen khoan {}", order.order.order_number);
    ingest(world, reference, amount, description).await;
}

#[when(expr = "the bank reports a credit {string} of {int} with description {string}")]
async fn bank_credit(world: &mut OmsWorld, reference: String, amount: i64, description: String) {
    ingest(world, reference, amount, description).await;
}

async fn ingest(world: &mut OmsWorld, reference: String, amount: i64, description: String) {
    let feed = NewBankTransaction::credit(ACCOUNT.to_string(), reference.clone(), Money::from(amount), description);
    let result = world.system().bank.ingest(feed).await;
    if let Some((txn, _)) = world.record(result) {
        world.bank_transactions.insert(reference, txn.id);
    }
}

#[when("unreconciled bank transactions are matched again")]
async fn rematch(world: &mut OmsWorld) {
    let result = world.system().bank.rematch_unreconciled().await;
    world.record(result);
}

#[then(expr = "order {word} is {word}")]
async fn order_status(world: &mut OmsWorld, alias: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world.system().orders.get(world.order_id(&alias)).await.expect("Error fetching order");
    assert_eq!(order.order.status, expected);
}

#[then(expr = "order {word} has a total of {int}")]
async fn order_total(world: &mut OmsWorld, alias: String, total: i64) {
    let order = world.system().orders.get(world.order_id(&alias)).await.expect("Error fetching order");
    assert_eq!(order.order.total_amount, Money::from(total));
    assert_eq!(order.order.total_amount, order.order.expected_total());
}

#[then(expr = "the payment for order {word} is {word}")]
async fn payment_status(world: &mut OmsWorld, alias: String, status: String) {
    let expected = PaymentStatus::from_str(&status).expect("Not a valid payment status");
    let payment = world.system().payments.authoritative_payment(world.order_id(&alias)).await.expect("Error");
    assert_eq!(payment.map(|p| p.status), Some(expected));
}

#[then(expr = "the stock of {string} is {int}")]
async fn stock_level(world: &mut OmsWorld, sku: String, stock: i64) {
    let product_id = world.product_id(&sku).await;
    let inventory = &world.system().inventory;
    assert_eq!(inventory.current_stock(product_id).await.unwrap(), stock);
    assert_eq!(inventory.ledger_stock(product_id).await.unwrap(), stock, "The ledger disagrees with the counter");
}

#[then(expr = "the last operation failed with {word}")]
async fn last_error(world: &mut OmsWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The last operation succeeded");
    assert_eq!(format!("{:?}", err.kind()), kind, "{err}");
}

#[then("the last operation succeeded")]
async fn last_success(world: &mut OmsWorld) {
    if let Some(e) = &world.last_error {
        panic!("The last operation failed: {e}");
    }
}

#[then(expr = "the bank credit {string} is reconciled against order {word}")]
async fn credit_reconciled(world: &mut OmsWorld, reference: String, alias: String) {
    let id = *world.bank_transactions.get(&reference).expect("Unknown bank transaction");
    let txn = world.system().bank.fetch(id).await.expect("Error fetching bank transaction");
    assert_eq!(txn.status, BankTransactionStatus::Reconciled);
    let rec = world.system().bank.reconciliation_for(id).await.unwrap().expect("No reconciliation");
    assert_eq!(rec.order_id, Some(world.order_id(&alias)));
}

#[then(expr = "the bank credit {string} awaits reconciliation")]
async fn credit_unreconciled(world: &mut OmsWorld, reference: String) {
    let id = *world.bank_transactions.get(&reference).expect("Unknown bank transaction");
    let pending = world.system().bank.unreconciled().await.expect("Error fetching unreconciled transactions");
    assert!(pending.iter().any(|t| t.id == id));
}
