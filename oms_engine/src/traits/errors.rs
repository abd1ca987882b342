use thiserror::Error;

use crate::{
    coupons::CouponRejection,
    db_types::{OrderNumber, OrderStatusType},
    state_machine::OrderOperation,
};

/// Coarse classification of [`OrderEngineError`], so that callers can map failures to responses without matching on
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input. Never retried.
    Validation,
    /// The current state does not permit the requested operation.
    InvalidTransition,
    /// The inventory floor would be violated.
    InsufficientStock,
    /// A referenced record does not exist.
    NotFound,
    /// The coupon could not be applied.
    CouponInvalid,
    /// A record with the same unique key already exists.
    Conflict,
    /// Configuration, connectivity or other backend failure.
    Database,
}

#[derive(Debug, Clone, Error)]
pub enum OrderEngineError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Invalid input. {0}")]
    ValidationError(String),
    #[error("Order #{order_id} cannot {operation} while it is {from}")]
    InvalidTransition { order_id: i64, from: OrderStatusType, operation: OrderOperation },
    #[error("Order #{0} is paid cash on delivery, and its payment has not been confirmed yet")]
    PaymentOutstanding(i64),
    #[error("Illegal payment status change. {0}")]
    PaymentTransitionForbidden(String),
    #[error("Insufficient stock for product {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNumberNotFound(OrderNumber),
    #[error("The requested payment #{0} does not exist")]
    PaymentNotFound(i64),
    #[error("The requested product #{0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested bank transaction #{0} does not exist")]
    BankTransactionNotFound(i64),
    #[error("Coupon cannot be applied. {0}")]
    CouponInvalid(CouponRejection),
    #[error("Cannot insert order, since order number {0} is already taken")]
    OrderNumberAlreadyExists(OrderNumber),
    #[error("Bank transaction {0} has already been ingested")]
    BankTransactionAlreadyExists(String),
    #[error("A product with SKU {0} already exists")]
    ProductAlreadyExists(String),
    #[error("A coupon with code {0} already exists")]
    CouponAlreadyExists(String),
    #[error("External transaction id {0} is already assigned to another payment")]
    ExternalTxnIdAlreadyUsed(String),
}

impl OrderEngineError {
    pub fn kind(&self) -> ErrorKind {
        use OrderEngineError::*;
        match self {
            DatabaseError(_) => ErrorKind::Database,
            ValidationError(_) => ErrorKind::Validation,
            InvalidTransition { .. } | PaymentOutstanding(_) | PaymentTransitionForbidden(_) => {
                ErrorKind::InvalidTransition
            },
            InsufficientStock { .. } => ErrorKind::InsufficientStock,
            OrderNotFound(_) |
            OrderNumberNotFound(_) |
            PaymentNotFound(_) |
            ProductNotFound(_) |
            BankTransactionNotFound(_) => ErrorKind::NotFound,
            CouponInvalid(_) => ErrorKind::CouponInvalid,
            OrderNumberAlreadyExists(_) |
            BankTransactionAlreadyExists(_) |
            ProductAlreadyExists(_) |
            CouponAlreadyExists(_) |
            ExternalTxnIdAlreadyUsed(_) => ErrorKind::Conflict,
        }
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn invalid_transition(order_id: i64, from: OrderStatusType, operation: OrderOperation) -> Self {
        Self::InvalidTransition { order_id, from, operation }
    }
}

impl From<sqlx::Error> for OrderEngineError {
    fn from(e: sqlx::Error) -> Self {
        OrderEngineError::DatabaseError(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for OrderEngineError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        OrderEngineError::DatabaseError(format!("Migration failed. {e}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_kinds() {
        let e = OrderEngineError::invalid_transition(4, OrderStatusType::Confirmed, OrderOperation::Cancel);
        assert_eq!(e.kind(), ErrorKind::InvalidTransition);
        assert_eq!(e.to_string(), "Order #4 cannot cancel while it is Confirmed");
        let e = OrderEngineError::InsufficientStock { product_id: 1, requested: 2, available: 1 };
        assert_eq!(e.kind(), ErrorKind::InsufficientStock);
        assert_eq!(OrderEngineError::validation("no items").kind(), ErrorKind::Validation);
        assert_eq!(OrderEngineError::PaymentNotFound(3).kind(), ErrorKind::NotFound);
        let e = OrderEngineError::CouponInvalid(CouponRejection::Inactive("X".into()));
        assert_eq!(e.kind(), ErrorKind::CouponInvalid);
        assert_eq!(e.to_string(), "Coupon cannot be applied. Coupon X is not active");
    }
}
