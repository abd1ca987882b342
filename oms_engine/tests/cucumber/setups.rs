use cucumber::given;
use oms_common::Money;
use oms_engine::db_types::{NewCoupon, NewProduct};

use crate::cucumber::{oms_world::OrderManagementSystem, OmsWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut OmsWorld) {
    let system = OrderManagementSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a product {string} priced at {int} with {int} in stock")]
async fn product(world: &mut OmsWorld, sku: String, price: i64, stock: i64) {
    let product = NewProduct::new(sku.clone(), sku, Money::from(price));
    world.system().catalog.add_product(product, stock).await.expect("Error adding product");
}

#[given(expr = "a coupon {string} for {int} percent off")]
async fn percentage_coupon(world: &mut OmsWorld, code: String, pct: u32) {
    world.system().catalog.add_coupon(NewCoupon::percentage(code, pct)).await.expect("Error adding coupon");
}

#[given(expr = "a coupon {string} for {int} off orders over {int}")]
async fn fixed_coupon(world: &mut OmsWorld, code: String, amount: i64, minimum: i64) {
    let coupon = NewCoupon::fixed(code, Money::from(amount)).with_min_cart_value(Money::from(minimum));
    world.system().catalog.add_coupon(coupon).await.expect("Error adding coupon");
}
