//! The order state machine's table of legal edges.
//!
//! ```text
//!  Pending ──confirm──▶ Confirmed ──start_shipping──▶ Shipping ──mark_delivered──▶ Delivered ──complete──▶ Completed
//!     │                                                                               │  ▲ confirm_payment   │
//!   cancel                                                                            └──┴──── return ───────┤
//!     ▼                                                                                                      ▼
//!  Cancelled                                                                                              Returned
//! ```
//!
//! Every backend transition consults [`OrderOperation::legal_sources`] when building its guarded update, so this table
//! is the only place where the set of legal edges is defined.
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::OrderStatusType::{self, *};

/// Every operation that the order state machine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderOperation {
    Confirm,
    StartShipping,
    MarkDelivered,
    Cancel,
    /// COD payment confirmation. Guarded by order status but does not change it.
    ConfirmPayment,
    Complete,
    Return,
}

struct Edge {
    operation: OrderOperation,
    sources: &'static [OrderStatusType],
    target: Option<OrderStatusType>,
}

static LEGAL_EDGES: [Edge; 7] = [
    Edge { operation: OrderOperation::Confirm, sources: &[Pending], target: Some(Confirmed) },
    Edge { operation: OrderOperation::StartShipping, sources: &[Confirmed], target: Some(Shipping) },
    Edge { operation: OrderOperation::MarkDelivered, sources: &[Shipping], target: Some(Delivered) },
    Edge { operation: OrderOperation::Cancel, sources: &[Pending], target: Some(Cancelled) },
    Edge { operation: OrderOperation::ConfirmPayment, sources: &[Delivered], target: None },
    Edge { operation: OrderOperation::Complete, sources: &[Delivered], target: Some(Completed) },
    Edge { operation: OrderOperation::Return, sources: &[Delivered, Completed], target: Some(Returned) },
];

impl OrderOperation {
    pub const ALL: [OrderOperation; 7] = [
        OrderOperation::Confirm,
        OrderOperation::StartShipping,
        OrderOperation::MarkDelivered,
        OrderOperation::Cancel,
        OrderOperation::ConfirmPayment,
        OrderOperation::Complete,
        OrderOperation::Return,
    ];

    fn edge(&self) -> &'static Edge {
        // LEGAL_EDGES has exactly one entry per operation, in declaration order
        &LEGAL_EDGES[*self as usize]
    }

    /// The statuses from which this operation may be applied.
    pub fn legal_sources(&self) -> &'static [OrderStatusType] {
        self.edge().sources
    }

    /// The status the order ends up in, or `None` if the operation leaves the status unchanged.
    pub fn target_status(&self) -> Option<OrderStatusType> {
        self.edge().target
    }

    pub fn is_legal_from(&self, status: OrderStatusType) -> bool {
        self.legal_sources().contains(&status)
    }

    /// Returns the resulting status when applying this operation to an order in `status`, or `None` if the edge is
    /// not legal.
    pub fn apply(&self, status: OrderStatusType) -> Option<OrderStatusType> {
        if !self.is_legal_from(status) {
            return None;
        }
        Some(self.target_status().unwrap_or(status))
    }
}

impl Display for OrderOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderOperation::Confirm => "confirm",
            OrderOperation::StartShipping => "start shipping",
            OrderOperation::MarkDelivered => "mark as delivered",
            OrderOperation::Cancel => "cancel",
            OrderOperation::ConfirmPayment => "confirm payment",
            OrderOperation::Complete => "complete",
            OrderOperation::Return => "return",
        };
        f.write_str(s)
    }
}
