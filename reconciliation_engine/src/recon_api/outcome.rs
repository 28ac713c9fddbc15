use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{MinorUnits, Order},
    recon_api::ReconciliationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    OrderCreated,
    /// The order for this payment had already been created, by an earlier or a concurrent delivery.
    OrderExists,
    StatusChanged,
    /// The order already had the requested status, or is further along than it.
    StatusUnchanged,
    /// The payment has no order and the status does not call for one.
    NoActionNeeded,
    InvalidRequest,
    PaymentNotFound,
    OrderNotFound,
    AddressUnavailable,
    /// Only approved payments can have an order created for them.
    PaymentNotApproved,
    TransitionRefused,
    BackendFailure,
}

/// The result of handling one payment notification.
///
/// Reconciliation never fails with an error. Every path ends in an `Outcome`, which the caller turns into a reply to
/// the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<MinorUnits>,
    pub kind: OutcomeKind,
}

impl Outcome {
    pub fn success<S: Into<String>>(kind: OutcomeKind, message: S) -> Self {
        Self { success: true, message: message.into(), order_id: None, total: None, kind }
    }

    pub fn failure<S: Into<String>>(kind: OutcomeKind, message: S) -> Self {
        Self { success: false, message: message.into(), order_id: None, total: None, kind }
    }

    pub fn with_order(mut self, order: &Order) -> Self {
        self.order_id = Some(order.id);
        self.total = Some(order.total);
        self
    }

    /// True if the request itself was malformed. Only these outcomes warrant an error reply to the provider; anything
    /// else is acknowledged so that the provider does not retry a notification that can never succeed.
    pub fn is_malformed_request(&self) -> bool {
        self.kind == OutcomeKind::InvalidRequest
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.success { "OK" } else { "FAILED" };
        write!(f, "[{verdict}] {}", self.message)?;
        if let Some(id) = self.order_id {
            write!(f, " (order #{id})")?;
        }
        Ok(())
    }
}

impl From<ReconciliationError> for Outcome {
    fn from(e: ReconciliationError) -> Self {
        let kind = match &e {
            ReconciliationError::Validation(_) => OutcomeKind::InvalidRequest,
            ReconciliationError::PaymentNotFound(_) => OutcomeKind::PaymentNotFound,
            ReconciliationError::OrderNotFound(_) => OutcomeKind::OrderNotFound,
            ReconciliationError::AddressResolution(_) => OutcomeKind::AddressUnavailable,
            ReconciliationError::PaymentNotApproved(_) => OutcomeKind::PaymentNotApproved,
            ReconciliationError::TransitionRefused { .. } => OutcomeKind::TransitionRefused,
            ReconciliationError::DatabaseError(_) => OutcomeKind::BackendFailure,
        };
        let mut outcome = Outcome::failure(kind, e.to_string());
        if let ReconciliationError::TransitionRefused { order_id, .. } = e {
            outcome.order_id = Some(order_id);
        }
        outcome
    }
}
