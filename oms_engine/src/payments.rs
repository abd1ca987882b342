//! Payment sub-ledger rules that do not depend on storage.
use crate::{
    db_types::{Payment, PaymentStatus},
    traits::OrderEngineError,
};

/// Selects the payment that represents an order's payment state.
///
/// The `Paid` attempt wins if there is one. Otherwise the most recently created `Pending` attempt is used, and failing
/// that, the most recently created attempt of any status.
pub fn authoritative_payment(payments: &[Payment]) -> Option<&Payment> {
    let newest = |status: Option<PaymentStatus>| {
        payments
            .iter()
            .filter(|p| status.map(|s| p.status == s).unwrap_or(true))
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
    };
    newest(Some(PaymentStatus::Paid)).or_else(|| newest(Some(PaymentStatus::Pending))).or_else(|| newest(None))
}

/// Checks whether a gateway callback may move a payment from `current` to `target`.
///
/// Returns `Ok(false)` if the payment is already in the target status (the callback is a no-op), `Ok(true)` if the
/// status must change, and an error if the change is forbidden.
pub fn check_gateway_transition(
    payment_id: i64,
    current: PaymentStatus,
    target: PaymentStatus,
) -> Result<bool, OrderEngineError> {
    use PaymentStatus::*;
    match (current, target) {
        (a, b) if a == b => Ok(false),
        (Pending, Paid | Failed) => Ok(true),
        (from, to) => Err(OrderEngineError::PaymentTransitionForbidden(format!(
            "Payment #{payment_id} cannot move from {from} to {to}"
        ))),
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::db_types::{Money, PaymentGateway};

    fn payment(id: i64, status: PaymentStatus, age_mins: i64) -> Payment {
        let at = Utc::now() - Duration::minutes(age_mins);
        Payment {
            id,
            order_id: 1,
            gateway: PaymentGateway::from("vnpay"),
            status,
            amount: Money::from(100),
            external_txn_id: None,
            paid_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn paid_wins() {
        let p = vec![
            payment(1, PaymentStatus::Failed, 30),
            payment(2, PaymentStatus::Paid, 20),
            payment(3, PaymentStatus::Pending, 10),
        ];
        assert_eq!(authoritative_payment(&p).map(|p| p.id), Some(2));
    }

    #[test]
    fn newest_pending_otherwise() {
        let p = vec![
            payment(1, PaymentStatus::Pending, 30),
            payment(2, PaymentStatus::Pending, 20),
            payment(3, PaymentStatus::Failed, 10),
        ];
        assert_eq!(authoritative_payment(&p).map(|p| p.id), Some(2));
    }

    #[test]
    fn newest_attempt_as_a_last_resort() {
        let p = vec![payment(1, PaymentStatus::Failed, 30), payment(2, PaymentStatus::Void, 20)];
        assert_eq!(authoritative_payment(&p).map(|p| p.id), Some(2));
        assert!(authoritative_payment(&[]).is_none());
    }

    #[test]
    fn gateway_transitions() {
        use PaymentStatus::*;
        assert!(check_gateway_transition(1, Pending, Paid).unwrap());
        assert!(check_gateway_transition(1, Pending, Failed).unwrap());
        assert!(!check_gateway_transition(1, Paid, Paid).unwrap());
        assert!(!check_gateway_transition(1, Failed, Failed).unwrap());
        assert!(check_gateway_transition(1, Paid, Failed).is_err());
        assert!(check_gateway_transition(1, Failed, Paid).is_err());
        assert!(check_gateway_transition(1, Void, Paid).is_err());
    }
}
