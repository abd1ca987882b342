use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
pub use oms_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

/// Generates `Display` and `FromStr` for a fieldless enum that is stored as its variant name.
macro_rules! text_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str(stringify!($variant)),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("Invalid {}: {s}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created, stock has been reserved and a payment attempt has been opened.
    Pending,
    /// The merchant has accepted the order. Customers can no longer cancel it.
    Confirmed,
    /// The order has been handed to the carrier.
    Shipping,
    /// The carrier reports that the order has been delivered.
    Delivered,
    /// Terminal success state.
    Completed,
    /// Terminal state. Only reachable from `Pending`.
    Cancelled,
    /// Terminal state. Only reachable from `Delivered` or `Completed`.
    Returned,
}

text_enum!(OrderStatusType { Pending, Confirmed, Shipping, Delivered, Completed, Cancelled, Returned });

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 7] = [
        OrderStatusType::Pending,
        OrderStatusType::Confirmed,
        OrderStatusType::Shipping,
        OrderStatusType::Delivered,
        OrderStatusType::Completed,
        OrderStatusType::Cancelled,
        OrderStatusType::Returned,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------     OrderNumber       ---------------------------------------------------------
/// The external-facing order identifier. Unique and immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    PaymentGateway     ---------------------------------------------------------
/// Identifies how an order is paid for. Cash-on-delivery is the only gateway with special treatment in the engine;
/// every other value is an online gateway whose callbacks arrive through the payment sub-ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct PaymentGateway(String);

impl PaymentGateway {
    pub const CASH_ON_DELIVERY: &'static str = "cod";

    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into().trim().to_ascii_lowercase())
    }

    pub fn cash_on_delivery() -> Self {
        Self(Self::CASH_ON_DELIVERY.to_string())
    }

    pub fn is_cash_on_delivery(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::CASH_ON_DELIVERY)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PaymentGateway {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Display for PaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub customer_id: String,
    pub status: OrderStatusType,
    /// Sum of the line totals
    pub subtotal: Money,
    pub discount_amount: Money,
    pub shipping_fee: Money,
    pub tax_amount: Money,
    /// `subtotal - discount_amount + shipping_fee + tax_amount`
    pub total_amount: Money,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentGateway,
    pub shipping_address_id: Option<String>,
    pub billing_address_id: Option<String>,
    pub processed_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Recomputes the order total from its components.
    pub fn expected_total(&self) -> Money {
        self.subtotal - self.discount_amount + self.shipping_fee + self.tax_amount
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Unit price at the time the order was created
    pub unit_price: Money,
    pub total_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub order_id: i64,
    pub status: OrderStatusType,
    pub actor: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: i64,
    pub order_id: i64,
    pub reason: String,
    pub processed_by: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

impl NewOrderItem {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    /// If not supplied, an order number is generated when the order is stored.
    pub order_number: Option<OrderNumber>,
    /// The user that owns the order
    pub customer_id: String,
    pub items: Vec<NewOrderItem>,
    pub shipping_address_id: Option<String>,
    pub billing_address_id: Option<String>,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentGateway,
    pub shipping_fee: Money,
    pub tax_amount: Money,
    /// Falls back to the engine's configured currency
    pub currency: Option<String>,
    pub notes: Option<String>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(customer_id: S, items: Vec<NewOrderItem>, payment_method: PaymentGateway) -> Self {
        Self {
            order_number: None,
            customer_id: customer_id.into(),
            items,
            shipping_address_id: None,
            billing_address_id: None,
            coupon_code: None,
            payment_method,
            shipping_fee: Money::ZERO,
            tax_amount: Money::ZERO,
            currency: None,
            notes: None,
        }
    }

    pub fn with_order_number<N: Into<OrderNumber>>(mut self, number: N) -> Self {
        self.order_number = Some(number.into());
        self
    }

    pub fn with_coupon<S: Into<String>>(mut self, code: S) -> Self {
        self.coupon_code = Some(code.into());
        self
    }

    pub fn with_shipping_fee(mut self, fee: Money) -> Self {
        self.shipping_fee = fee;
        self
    }

    pub fn with_tax(mut self, tax: Money) -> Self {
        self.tax_amount = tax;
        self
    }

    pub fn with_addresses<S: Into<String>>(mut self, shipping: S, billing: S) -> Self {
        self.shipping_address_id = Some(shipping.into());
        self.billing_address_id = Some(billing.into());
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

//-----------------------------------------   PaymentStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    /// The gateway reported a failed attempt.
    Failed,
    /// The order was cancelled while the attempt was still open.
    Void,
}

text_enum!(PaymentStatus { Pending, Paid, Failed, Void });

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub gateway: PaymentGateway,
    pub status: PaymentStatus,
    pub amount: Money,
    /// The transaction identifier reported by the gateway or bank
    pub external_txn_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub order_id: i64,
    pub gateway: PaymentGateway,
    pub amount: Money,
}

impl NewPayment {
    pub fn new(order_id: i64, gateway: PaymentGateway, amount: Money) -> Self {
        Self { order_id, gateway, amount }
    }
}

//--------------------------------------  InventoryChangeType  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum InventoryChangeType {
    In,
    Out,
    Sale,
    Restock,
    Return,
    Adjustment,
}

text_enum!(InventoryChangeType { In, Out, Sale, Restock, Return, Adjustment });

impl InventoryChangeType {
    /// Whether a delta with the given sign may be recorded against this change type.
    pub fn accepts_delta(&self, delta: i64) -> bool {
        match self {
            Self::Sale | Self::Out => delta < 0,
            Self::In | Self::Restock | Self::Return => delta > 0,
            Self::Adjustment => delta != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: i64,
    pub product_id: i64,
    pub delta: i64,
    pub change_type: InventoryChangeType,
    pub reason: String,
    pub actor: Option<String>,
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventoryTransaction {
    pub product_id: i64,
    pub delta: i64,
    pub change_type: InventoryChangeType,
    pub reason: String,
    pub actor: Option<String>,
    pub order_id: Option<i64>,
}

impl NewInventoryTransaction {
    pub fn new<S: Into<String>>(product_id: i64, delta: i64, change_type: InventoryChangeType, reason: S) -> Self {
        Self { product_id, delta, change_type, reason: reason.into(), actor: None, order_id: None }
    }

    pub fn with_actor<S: Into<String>>(mut self, actor: S) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    /// Materialized from the inventory ledger. Never set directly.
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
}

impl NewProduct {
    pub fn new<S: Into<String>>(sku: S, name: S, unit_price: Money) -> Self {
        Self { sku: sku.into(), name: name.into(), unit_price }
    }
}

//--------------------------------------        Coupon         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum DiscountType {
    /// `discount_value` is a whole percentage of the cart value
    Percentage,
    /// `discount_value` is a flat amount in minor units
    Fixed,
}

text_enum!(DiscountType { Percentage, Fixed });

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_cart_value: Money,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_cart_value: Money,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl NewCoupon {
    pub fn percentage<S: Into<String>>(code: S, percent: u32) -> Self {
        Self::new(code.into(), DiscountType::Percentage, i64::from(percent))
    }

    pub fn fixed<S: Into<String>>(code: S, amount: Money) -> Self {
        Self::new(code.into(), DiscountType::Fixed, amount.value())
    }

    fn new(code: String, discount_type: DiscountType, discount_value: i64) -> Self {
        Self {
            code,
            discount_type,
            discount_value,
            min_cart_value: Money::ZERO,
            is_active: true,
            starts_at: None,
            ends_at: None,
        }
    }

    pub fn with_min_cart_value(mut self, value: Money) -> Self {
        self.min_cart_value = value;
        self
    }

    pub fn valid_between(mut self, starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> Self {
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

//--------------------------------------    Bank transactions  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum BankDirection {
    Credit,
    Debit,
    Transfer,
    Fee,
    Refund,
}

text_enum!(BankDirection { Credit, Debit, Transfer, Fee, Refund });

impl BankDirection {
    /// Only money flowing in can settle a customer payment.
    pub fn is_incoming(&self) -> bool {
        matches!(self, Self::Credit | Self::Transfer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum BankTransactionStatus {
    Pending,
    Posted,
    Reconciled,
    Failed,
    Cancelled,
}

text_enum!(BankTransactionStatus { Pending, Posted, Reconciled, Failed, Cancelled });

impl BankTransactionStatus {
    pub fn awaits_reconciliation(&self) -> bool {
        matches!(self, Self::Pending | Self::Posted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: i64,
    pub account_ref: String,
    pub external_txn_id: String,
    pub amount: Money,
    pub direction: BankDirection,
    pub description: String,
    pub posted_at: DateTime<Utc>,
    pub status: BankTransactionStatus,
    pub balance_after: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBankTransaction {
    pub account_ref: String,
    pub external_txn_id: String,
    pub amount: Money,
    pub direction: BankDirection,
    pub description: String,
    pub posted_at: DateTime<Utc>,
    pub status: BankTransactionStatus,
    pub balance_after: Option<Money>,
}

impl NewBankTransaction {
    pub fn credit<S: Into<String>>(account_ref: S, external_txn_id: S, amount: Money, description: S) -> Self {
        Self {
            account_ref: account_ref.into(),
            external_txn_id: external_txn_id.into(),
            amount,
            direction: BankDirection::Credit,
            description: description.into(),
            posted_at: Utc::now(),
            status: BankTransactionStatus::Posted,
            balance_after: None,
        }
    }

    pub fn with_direction(mut self, direction: BankDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_status(mut self, status: BankTransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_balance_after(mut self, balance: Money) -> Self {
        self.balance_after = Some(balance);
        self
    }

    pub fn posted_at(mut self, at: DateTime<Utc>) -> Self {
        self.posted_at = at;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum ReconciliationOutcome {
    /// Linked automatically by the matcher
    Matched,
    /// Linked by an operator
    ManualMatch,
    /// An operator decided the transaction does not belong to any payment
    Rejected,
}

text_enum!(ReconciliationOutcome { Matched, ManualMatch, Rejected });

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BankReconciliation {
    pub id: i64,
    pub bank_transaction_id: i64,
    pub payment_id: Option<i64>,
    pub order_id: Option<i64>,
    pub outcome: ReconciliationOutcome,
    pub actor: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BankReconciliation {
    pub fn is_linked(&self) -> bool {
        matches!(self.outcome, ReconciliationOutcome::Matched | ReconciliationOutcome::ManualMatch)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in OrderStatusType::ALL {
            let s = status.to_string();
            assert_eq!(s.parse::<OrderStatusType>().unwrap(), status);
        }
        assert!("Shipped".parse::<OrderStatusType>().is_err());
        assert_eq!(OrderStatusType::from("nonsense".to_string()), OrderStatusType::Pending);
    }

    #[test]
    fn gateway_names_are_normalised() {
        assert!(PaymentGateway::from(" COD ").is_cash_on_delivery());
        assert!(PaymentGateway::cash_on_delivery().is_cash_on_delivery());
        assert!(!PaymentGateway::from("vnpay").is_cash_on_delivery());
        assert_eq!(PaymentGateway::from("VNPay").as_str(), "vnpay");
    }

    #[test]
    fn inventory_delta_signs() {
        use InventoryChangeType::*;
        assert!(Sale.accepts_delta(-1));
        assert!(!Sale.accepts_delta(1));
        assert!(Out.accepts_delta(-3));
        assert!(Restock.accepts_delta(10));
        assert!(!Return.accepts_delta(-1));
        assert!(In.accepts_delta(2));
        assert!(Adjustment.accepts_delta(-2));
        assert!(Adjustment.accepts_delta(2));
        assert!(!Adjustment.accepts_delta(0));
    }
}
