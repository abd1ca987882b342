//! The decision half of the bank reconciliation matcher.
//!
//! A bank transaction is matched against payments on its exact amount plus a reference: either an order number that
//! appears in the transaction description, or the bank's transaction id recorded against a payment. The storage layer
//! gathers the candidate payments; the functions here decide what the outcome is.
use std::collections::HashSet;

use crate::{
    db_types::{BankTransaction, OrderNumber, Payment, PaymentStatus},
    helpers::extract_order_numbers_from_description,
    traits::MatchCandidate,
};

/// Only settled-or-settling incoming money is considered for matching.
pub fn is_eligible(txn: &BankTransaction) -> bool {
    txn.direction.is_incoming() && txn.status.awaits_reconciliation()
}

/// The order numbers referenced in the transaction's description.
pub fn referenced_orders(txn: &BankTransaction) -> Vec<OrderNumber> {
    extract_order_numbers_from_description(&txn.description)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSelection {
    None,
    Single(MatchCandidate),
    Many(Vec<MatchCandidate>),
}

/// Narrows the payments gathered for a transaction down to the ones it can settle.
///
/// A payment qualifies if it is neither `Failed` nor `Void`, its amount equals the transaction amount exactly, and it
/// is not already linked to another bank transaction (`linked` holds the ids of payments that are).
pub fn select_candidates(txn: &BankTransaction, payments: &[Payment], linked: &HashSet<i64>) -> CandidateSelection {
    let mut seen = HashSet::new();
    let mut candidates = payments
        .iter()
        .filter(|p| !matches!(p.status, PaymentStatus::Failed | PaymentStatus::Void))
        .filter(|p| p.amount == txn.amount)
        .filter(|p| !linked.contains(&p.id))
        .filter(|p| seen.insert(p.id))
        .map(|p| MatchCandidate { payment_id: p.id, order_id: p.order_id })
        .collect::<Vec<_>>();
    match candidates.len() {
        0 => CandidateSelection::None,
        1 => CandidateSelection::Single(candidates.remove(0)),
        _ => {
            candidates.sort_by_key(|c| c.payment_id);
            CandidateSelection::Many(candidates)
        },
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::db_types::{BankDirection, BankTransactionStatus, Money, PaymentGateway};

    fn txn(amount: i64, description: &str) -> BankTransaction {
        BankTransaction {
            id: 1,
            account_ref: "VCB-001".into(),
            external_txn_id: "FT2401".into(),
            amount: Money::from(amount),
            direction: BankDirection::Credit,
            description: description.into(),
            posted_at: Utc::now(),
            status: BankTransactionStatus::Posted,
            balance_after: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payment(id: i64, order_id: i64, amount: i64, status: PaymentStatus) -> Payment {
        Payment {
            id,
            order_id,
            gateway: PaymentGateway::from("bank_transfer"),
            status,
            amount: Money::from(amount),
            external_txn_id: None,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn eligibility() {
        let mut t = txn(100, "");
        assert!(is_eligible(&t));
        t.direction = BankDirection::Debit;
        assert!(!is_eligible(&t));
        t.direction = BankDirection::Transfer;
        t.status = BankTransactionStatus::Reconciled;
        assert!(!is_eligible(&t));
        t.status = BankTransactionStatus::Pending;
        assert!(is_eligible(&t));
    }

    #[test]
    fn single_candidate() {
        let t = txn(137_000, "CK [ORD-20240301-AB12CD]");
        assert_eq!(referenced_orders(&t), vec![OrderNumber::from("ORD-20240301-AB12CD")]);
        let payments = vec![
            payment(1, 10, 137_000, PaymentStatus::Pending),
            payment(2, 10, 137_000, PaymentStatus::Failed),
            payment(3, 10, 120_000, PaymentStatus::Pending),
        ];
        let selection = select_candidates(&t, &payments, &HashSet::new());
        assert_eq!(selection, CandidateSelection::Single(MatchCandidate { payment_id: 1, order_id: 10 }));
    }

    #[test]
    fn linked_payments_are_skipped() {
        let t = txn(500, "");
        let payments = vec![payment(1, 10, 500, PaymentStatus::Paid)];
        let linked = HashSet::from([1]);
        assert_eq!(select_candidates(&t, &payments, &linked), CandidateSelection::None);
    }

    #[test]
    fn many_candidates() {
        let t = txn(500, "");
        let payments = vec![
            payment(4, 11, 500, PaymentStatus::Pending),
            payment(2, 10, 500, PaymentStatus::Pending),
            payment(4, 11, 500, PaymentStatus::Pending),
        ];
        let selection = select_candidates(&t, &payments, &HashSet::new());
        assert_eq!(
            selection,
            CandidateSelection::Many(vec![
                MatchCandidate { payment_id: 2, order_id: 10 },
                MatchCandidate { payment_id: 4, order_id: 11 },
            ])
        );
    }
}
