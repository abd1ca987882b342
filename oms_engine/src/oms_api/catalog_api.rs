use std::fmt::Debug;

use chrono::Utc;
use oms_common::Money;

use crate::{
    coupons::{validate_coupon, CouponCheck},
    db_types::{Coupon, NewCoupon, NewProduct, Product},
    traits::{CatalogManagement, OrderEngineError},
};

/// Products and coupons.
pub struct CatalogApi<B> {
    db: B,
}

impl<B: Debug> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi ({:?})", self.db)
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn add_product(&self, product: NewProduct, initial_stock: i64) -> Result<Product, OrderEngineError> {
        self.db.insert_product(product, initial_stock).await
    }

    pub async fn product(&self, product_id: i64) -> Result<Product, OrderEngineError> {
        self.db.fetch_product(product_id).await?.ok_or(OrderEngineError::ProductNotFound(product_id))
    }

    pub async fn product_by_sku(&self, sku: &str) -> Result<Option<Product>, OrderEngineError> {
        self.db.fetch_product_by_sku(sku).await
    }

    pub async fn update_price(&self, product_id: i64, price: Money) -> Result<Product, OrderEngineError> {
        self.db.update_product_price(product_id, price).await
    }

    pub async fn add_coupon(&self, coupon: NewCoupon) -> Result<Coupon, OrderEngineError> {
        self.db.insert_coupon(coupon).await
    }

    pub async fn coupon(&self, code: &str) -> Result<Option<Coupon>, OrderEngineError> {
        self.db.fetch_coupon(code).await
    }

    pub async fn set_coupon_active(&self, code: &str, active: bool) -> Result<Coupon, OrderEngineError> {
        self.db.set_coupon_active(code, active).await
    }

    /// Checks what `code` would be worth against a cart of `cart_value` right now, without applying it.
    pub async fn check_coupon(&self, code: &str, cart_value: Money) -> Result<CouponCheck, OrderEngineError> {
        let coupon = self.db.fetch_coupon(code).await?;
        Ok(validate_coupon(coupon.as_ref(), code, cart_value, Utc::now()))
    }
}
