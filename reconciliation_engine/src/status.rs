//! Order status derivation and the transition lattice.
//!
//! [`map_status`] is the only place where a provider payment status is turned into an order status. Both the order
//! creation path and the order update path go through it.
//!
//! [`TransitionPolicy`] decides what happens when an order is asked to move from one status to another:
//!
//! | From \ To            | same  | later stage | earlier stage | cancelled | paid (from cancelled) |
//! |----------------------|-------|-------------|---------------|-----------|-----------------------|
//! | pending/paid/confirmed | NoOp | Apply      | Stale       | Apply     | -                     |
//! | shipped/delivered    | NoOp  | Apply       | Stale         | Refuse    | -                     |
//! | cancelled            | NoOp  | Refuse      | Stale (2)     | NoOp      | Refuse (1)            |
//!
//! (1) Unless `allow_reactivation` is set.
//! (2) Only `pending`, which is a late report from before the cancellation. Every other move out of `cancelled` is
//! refused.
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderStatusType, PaymentStatus};

/// Maps the payment provider's status onto the internal order status.
pub fn map_status(provider_status: PaymentStatus) -> OrderStatusType {
    match provider_status {
        PaymentStatus::Approved => OrderStatusType::Paid,
        PaymentStatus::Declined | PaymentStatus::Error | PaymentStatus::Voided => OrderStatusType::Cancelled,
        PaymentStatus::Pending => OrderStatusType::Pending,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionDecision {
    /// Write the new status.
    Apply,
    /// The order already has the requested status.
    NoOp,
    /// The order is further along than the requested status. Typically an out-of-order delivery; ignored.
    Stale,
    /// The change is not allowed. The reason is given.
    Refuse(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPolicy {
    /// Permit a late approval to move a cancelled order back to `paid`.
    pub allow_reactivation: bool,
}

impl TransitionPolicy {
    pub fn new(allow_reactivation: bool) -> Self {
        Self { allow_reactivation }
    }

    pub fn decide(&self, from: OrderStatusType, to: OrderStatusType) -> TransitionDecision {
        use OrderStatusType::*;
        if from == to {
            return TransitionDecision::NoOp;
        }
        match (from, to) {
            (Cancelled, Paid) if self.allow_reactivation => TransitionDecision::Apply,
            (Cancelled, Pending) => TransitionDecision::Stale,
            (Cancelled, _) => TransitionDecision::Refuse(format!("order is cancelled and cannot move to {to}")),
            (Shipped | Delivered, Cancelled) => {
                TransitionDecision::Refuse(format!("order is already {from} and can no longer be cancelled"))
            },
            (_, Cancelled) => TransitionDecision::Apply,
            (from, to) => match (from.rank(), to.rank()) {
                (Some(a), Some(b)) if b > a => TransitionDecision::Apply,
                _ => TransitionDecision::Stale,
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{OrderStatusType::*, PaymentStatus};

    #[test]
    fn status_mapping_table() {
        let expected = [Pending, Paid, Cancelled, Cancelled, Cancelled];
        for (status, expected) in PaymentStatus::ALL.into_iter().zip(expected) {
            assert_eq!(map_status(status), expected, "{status} mapped incorrectly");
        }
    }

    #[test]
    fn same_status_is_a_no_op() {
        let policy = TransitionPolicy::default();
        for s in [Pending, Paid, Confirmed, Shipped, Delivered, Cancelled] {
            assert_eq!(policy.decide(s, s), TransitionDecision::NoOp);
        }
    }

    #[test]
    fn forward_moves_are_applied() {
        let policy = TransitionPolicy::default();
        assert_eq!(policy.decide(Pending, Paid), TransitionDecision::Apply);
        assert_eq!(policy.decide(Paid, Confirmed), TransitionDecision::Apply);
        assert_eq!(policy.decide(Paid, Delivered), TransitionDecision::Apply);
        assert_eq!(policy.decide(Shipped, Delivered), TransitionDecision::Apply);
    }

    #[test]
    fn regressions_are_stale() {
        let policy = TransitionPolicy::default();
        assert_eq!(policy.decide(Paid, Pending), TransitionDecision::Stale);
        assert_eq!(policy.decide(Shipped, Paid), TransitionDecision::Stale);
        assert_eq!(policy.decide(Delivered, Pending), TransitionDecision::Stale);
        assert_eq!(policy.decide(Cancelled, Pending), TransitionDecision::Stale);
        assert_eq!(TransitionPolicy::new(true).decide(Cancelled, Pending), TransitionDecision::Stale);
    }

    #[test]
    fn cancellation() {
        let policy = TransitionPolicy::default();
        assert_eq!(policy.decide(Pending, Cancelled), TransitionDecision::Apply);
        assert_eq!(policy.decide(Paid, Cancelled), TransitionDecision::Apply);
        assert_eq!(policy.decide(Confirmed, Cancelled), TransitionDecision::Apply);
        assert!(matches!(policy.decide(Shipped, Cancelled), TransitionDecision::Refuse(_)));
        assert!(matches!(policy.decide(Delivered, Cancelled), TransitionDecision::Refuse(_)));
    }

    #[test]
    fn reactivation_is_opt_in() {
        let strict = TransitionPolicy::default();
        assert!(matches!(strict.decide(Cancelled, Paid), TransitionDecision::Refuse(_)));
        assert!(matches!(strict.decide(Cancelled, Confirmed), TransitionDecision::Refuse(_)));
        let lenient = TransitionPolicy::new(true);
        assert_eq!(lenient.decide(Cancelled, Paid), TransitionDecision::Apply);
        assert!(matches!(lenient.decide(Cancelled, Shipped), TransitionDecision::Refuse(_)));
    }
}
