use serde::{Deserialize, Serialize};

use crate::{
    db_types::{BankTransaction, Order, Payment},
    state_machine::OrderOperation,
    traits::{MatchOutcome, OrderAggregate},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: OrderAggregate,
}

impl OrderCreatedEvent {
    pub fn new(order: OrderAggregate) -> Self {
        Self { order }
    }
}

/// Emitted after a state machine operation has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTransitionedEvent {
    pub operation: OrderOperation,
    pub old_order: Order,
    pub new_order: Order,
}

impl OrderTransitionedEvent {
    pub fn new(operation: OrderOperation, old_order: Order, new_order: Order) -> Self {
        Self { operation, old_order, new_order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdatedEvent {
    pub payment: Payment,
}

impl PaymentUpdatedEvent {
    pub fn new(payment: Payment) -> Self {
        Self { payment }
    }
}

/// Emitted whenever the matcher (or an operator) settles a bank transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankReconciledEvent {
    pub transaction: BankTransaction,
    pub outcome: MatchOutcome,
}

impl BankReconciledEvent {
    pub fn new(transaction: BankTransaction, outcome: MatchOutcome) -> Self {
        Self { transaction, outcome }
    }
}
