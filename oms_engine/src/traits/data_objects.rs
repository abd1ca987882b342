use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderItem, Payment, StatusHistoryEntry},
    state_machine::OrderOperation,
};

/// A transition request for the order state machine, along with the data that the backend needs to record it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTransition {
    Confirm { actor: String },
    StartShipping { actor: Option<String> },
    MarkDelivered { actor: Option<String> },
    Cancel { actor: String },
    /// When `require_cod_payment` is set, a cash-on-delivery order can only complete once its payment is settled.
    Complete { actor: Option<String>, require_cod_payment: bool },
    Return { reason: String, processed_by: String },
}

impl OrderTransition {
    pub fn operation(&self) -> OrderOperation {
        match self {
            OrderTransition::Confirm { .. } => OrderOperation::Confirm,
            OrderTransition::StartShipping { .. } => OrderOperation::StartShipping,
            OrderTransition::MarkDelivered { .. } => OrderOperation::MarkDelivered,
            OrderTransition::Cancel { .. } => OrderOperation::Cancel,
            OrderTransition::Complete { .. } => OrderOperation::Complete,
            OrderTransition::Return { .. } => OrderOperation::Return,
        }
    }

    pub fn actor(&self) -> Option<&str> {
        match self {
            OrderTransition::Confirm { actor } | OrderTransition::Cancel { actor } => Some(actor.as_str()),
            OrderTransition::StartShipping { actor } |
            OrderTransition::MarkDelivered { actor } |
            OrderTransition::Complete { actor, .. } => actor.as_deref(),
            OrderTransition::Return { processed_by, .. } => Some(processed_by.as_str()),
        }
    }
}

/// An order with everything a caller typically needs to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAggregate {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// See [`crate::payments::authoritative_payment`]
    pub payment: Option<Payment>,
    /// Oldest entry first
    pub history: Vec<StatusHistoryEntry>,
}

impl OrderAggregate {
    pub fn id(&self) -> i64 {
        self.order.id
    }

    pub fn items_total(&self) -> oms_common::Money {
        self.items.iter().map(|i| i.total_price).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub payment_id: i64,
    pub order_id: i64,
}

/// The result of running the bank reconciliation matcher against a single bank transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    /// Exactly one payment matched. A reconciliation row links the two.
    Matched { payment_id: i64, order_id: i64, reconciliation_id: i64 },
    /// More than one payment matched. Nothing was written; an operator must resolve it.
    Ambiguous { candidates: Vec<MatchCandidate> },
    Unmatched,
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }
}

/// An operator's decision for a bank transaction that the matcher could not settle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManualResolution {
    Link { payment_id: i64 },
    Reject { note: String },
}
