use std::fmt::Display;

use chrono::{DateTime, Utc};
use oms_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderNumber, OrderStatusType, PaymentGateway},
    traits::OrderEngineError,
};

/// The monetary breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub shipping_fee: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

impl OrderTotals {
    /// `total = subtotal - discount + shipping + tax`. None of the components, nor the total, may be negative.
    pub fn compute(
        subtotal: Money,
        discount_amount: Money,
        shipping_fee: Money,
        tax_amount: Money,
    ) -> Result<Self, OrderEngineError> {
        for (name, v) in
            [("subtotal", subtotal), ("discount", discount_amount), ("shipping fee", shipping_fee), ("tax", tax_amount)]
        {
            if v.is_negative() {
                return Err(OrderEngineError::validation(format!("The {name} cannot be negative. Got {v}")));
            }
        }
        let total_amount = subtotal
            .checked_sub(discount_amount)
            .and_then(|v| v.checked_add(shipping_fee))
            .and_then(|v| v.checked_add(tax_amount))
            .ok_or_else(|| OrderEngineError::validation("The order total is too large to be represented"))?;
        if total_amount.is_negative() {
            return Err(OrderEngineError::validation(format!(
                "The discount of {discount_amount} exceeds the order value"
            )));
        }
        Ok(Self { subtotal, discount_amount, shipping_fee, tax_amount, total_amount })
    }
}

/// The state of an order before and after a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderChanged {
    pub old_order: Order,
    pub new_order: Order,
}

impl OrderChanged {
    pub fn new(old_order: Order, new_order: Order) -> Self {
        Self { old_order, new_order }
    }

    pub fn status_changed(&self) -> bool {
        self.old_order.status != self.new_order.status
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_number: Option<OrderNumber>,
    pub customer_id: Option<String>,
    pub payment_method: Option<PaymentGateway>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn with_order_number(mut self, number: OrderNumber) -> Self {
        self.order_number = Some(number);
        self
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_payment_method(mut self, method: PaymentGateway) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_number.is_none() &&
            self.customer_id.is_none() &&
            self.payment_method.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(number) = &self.order_number {
            write!(f, "order_number: {number}. ")?;
        }
        if let Some(customer_id) = &self.customer_id {
            write!(f, "customer_id: {customer_id}. ")?;
        }
        if let Some(method) = &self.payment_method {
            write!(f, "payment_method: {method}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn worked_example_totals() {
        // 2 x 50,000 + 1 x 30,000, SAVE10 and 20,000 shipping
        let subtotal = Money::from(130_000);
        let discount = subtotal.percent(10);
        let totals = OrderTotals::compute(subtotal, discount, Money::from(20_000), Money::ZERO).unwrap();
        assert_eq!(totals.discount_amount, Money::from(13_000));
        assert_eq!(totals.total_amount, Money::from(137_000));
    }

    #[test]
    fn negative_components_are_rejected() {
        let err = OrderTotals::compute(Money::from(100), Money::ZERO, Money::from(-1), Money::ZERO).unwrap_err();
        assert!(err.to_string().contains("shipping fee"), "{err}");
        let err = OrderTotals::compute(Money::from(100), Money::from(101), Money::ZERO, Money::ZERO).unwrap_err();
        assert!(matches!(err, OrderEngineError::ValidationError(_)));
    }

    #[test]
    fn oversized_totals_are_rejected() {
        let err = OrderTotals::compute(Money::from(100), Money::ZERO, Money::from(i64::MAX), Money::ZERO).unwrap_err();
        assert!(matches!(err, OrderEngineError::ValidationError(_)), "{err}");
        let err = OrderTotals::compute(Money::from(i64::MAX), Money::ZERO, Money::ZERO, Money::from(1)).unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
    }

    #[test]
    fn query_filter_display() {
        let filter = OrderQueryFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.to_string(), "No filters.");
        let filter = OrderQueryFilter::default()
            .with_customer_id("alice")
            .with_status(OrderStatusType::Pending)
            .with_status(OrderStatusType::Confirmed);
        assert_eq!(filter.to_string(), "customer_id: alice. statuses: [Pending,Confirmed]. ");
    }
}
