use oms_common::Money;

use crate::{
    db_types::{Coupon, NewCoupon, NewProduct, Product},
    traits::OrderEngineError,
};

/// Product and coupon records. The order engine only reads these; write access exists for seeding and maintenance.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement: Clone {
    /// Creates a product. A positive `initial_stock` is recorded as an `In` ledger entry in the same transaction.
    async fn insert_product(&self, product: NewProduct, initial_stock: i64) -> Result<Product, OrderEngineError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, OrderEngineError>;

    async fn fetch_product_by_sku(&self, sku: &str) -> Result<Option<Product>, OrderEngineError>;

    /// Changes the list price. Existing orders keep their price snapshots.
    async fn update_product_price(&self, product_id: i64, price: Money) -> Result<Product, OrderEngineError>;

    async fn insert_coupon(&self, coupon: NewCoupon) -> Result<Coupon, OrderEngineError>;

    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, OrderEngineError>;

    async fn set_coupon_active(&self, code: &str, active: bool) -> Result<Coupon, OrderEngineError>;
}
