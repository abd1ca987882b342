use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Coupon, NewCoupon},
    traits::OrderEngineError,
};

pub async fn insert_coupon(coupon: NewCoupon, conn: &mut SqliteConnection) -> Result<Coupon, OrderEngineError> {
    let code = coupon.code.clone();
    let coupon: Coupon = sqlx::query_as(
        r#"
            INSERT INTO coupons (code, discount_type, discount_value, min_cart_value, is_active, starts_at, ends_at,
                created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(coupon.code)
    .bind(coupon.discount_type)
    .bind(coupon.discount_value)
    .bind(coupon.min_cart_value)
    .bind(coupon.is_active)
    .bind(coupon.starts_at)
    .bind(coupon.ends_at)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => OrderEngineError::CouponAlreadyExists(code),
        _ => OrderEngineError::from(e),
    })?;
    debug!("🗃️ Coupon {} created", coupon.code);
    Ok(coupon)
}

/// Coupon codes are case-insensitive.
pub async fn fetch_coupon(code: &str, conn: &mut SqliteConnection) -> Result<Option<Coupon>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM coupons WHERE code = $1").bind(code.trim()).fetch_optional(conn).await
}

pub async fn set_active(code: &str, active: bool, conn: &mut SqliteConnection) -> Result<Option<Coupon>, sqlx::Error> {
    sqlx::query_as("UPDATE coupons SET is_active = $1 WHERE code = $2 RETURNING *")
        .bind(active)
        .bind(code.trim())
        .fetch_optional(conn)
        .await
}
