//! Coupon validation.
//!
//! Validation is a pure function of the coupon record, the cart value and the time of the order. The order engine
//! validates a coupon exactly once, when the order is created. An applied discount is never revisited, even if the
//! coupon later expires or is deactivated.
use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Coupon, DiscountType, Money};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponRejection {
    NotFound(String),
    Inactive(String),
    NotYetActive { code: String, starts_at: DateTime<Utc> },
    Expired { code: String, ends_at: DateTime<Utc> },
    BelowMinimum { code: String, minimum: Money, cart_value: Money },
}

impl Display for CouponRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CouponRejection::NotFound(code) => write!(f, "Coupon {code} does not exist"),
            CouponRejection::Inactive(code) => write!(f, "Coupon {code} is not active"),
            CouponRejection::NotYetActive { code, starts_at } => {
                write!(f, "Coupon {code} is not valid until {starts_at}")
            },
            CouponRejection::Expired { code, ends_at } => write!(f, "Coupon {code} expired at {ends_at}"),
            CouponRejection::BelowMinimum { code, minimum, cart_value } => {
                write!(f, "Coupon {code} requires a cart value of at least {minimum}, but the cart is {cart_value}")
            },
        }
    }
}

/// The result of validating a coupon against a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponCheck {
    pub valid: bool,
    pub discount: Money,
    pub reason: Option<CouponRejection>,
}

impl CouponCheck {
    fn accepted(discount: Money) -> Self {
        Self { valid: true, discount, reason: None }
    }

    fn rejected(reason: CouponRejection) -> Self {
        Self { valid: false, discount: Money::ZERO, reason: Some(reason) }
    }

    /// Converts the check into the discount amount, or the rejection reason.
    pub fn into_result(self) -> Result<Money, CouponRejection> {
        match self.reason {
            Some(reason) => Err(reason),
            None => Ok(self.discount),
        }
    }
}

/// Validates `coupon` (as looked up by `code`) for a cart worth `cart_value` at time `at`.
///
/// The active window is inclusive at both ends. The discount never exceeds the cart value.
pub fn validate_coupon(coupon: Option<&Coupon>, code: &str, cart_value: Money, at: DateTime<Utc>) -> CouponCheck {
    let coupon = match coupon {
        Some(c) => c,
        None => return CouponCheck::rejected(CouponRejection::NotFound(code.to_string())),
    };
    let code = coupon.code.clone();
    if !coupon.is_active {
        return CouponCheck::rejected(CouponRejection::Inactive(code));
    }
    if let Some(starts_at) = coupon.starts_at {
        if at < starts_at {
            return CouponCheck::rejected(CouponRejection::NotYetActive { code, starts_at });
        }
    }
    if let Some(ends_at) = coupon.ends_at {
        if at > ends_at {
            return CouponCheck::rejected(CouponRejection::Expired { code, ends_at });
        }
    }
    if cart_value < coupon.min_cart_value {
        return CouponCheck::rejected(CouponRejection::BelowMinimum {
            code,
            minimum: coupon.min_cart_value,
            cart_value,
        });
    }
    CouponCheck::accepted(discount_for(coupon, cart_value))
}

fn discount_for(coupon: &Coupon, cart_value: Money) -> Money {
    let raw = match coupon.discount_type {
        DiscountType::Percentage => {
            let pct = u32::try_from(coupon.discount_value.clamp(0, 100)).unwrap_or(0);
            cart_value.percent(pct)
        },
        DiscountType::Fixed => Money::from(coupon.discount_value.max(0)),
    };
    raw.min(cart_value).max(Money::ZERO)
}
