use std::fmt::Display;

use thiserror::Error;

use crate::{db::traits::CreateOrderRejection, db_types::OrderStatusType};

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),
    #[error("Order #{0} not found")]
    OrderNotFound(i64),
    #[error("Cannot create an order. {0}")]
    PaymentNotApproved(String),
    #[error("Could not resolve a shipping address. {0}")]
    AddressResolution(String),
    #[error("Order #{order_id} cannot move to {requested}: {reason}")]
    TransitionRefused { order_id: i64, requested: OrderStatusType, reason: String },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl ReconciliationError {
    pub fn database<E: Display>(e: E) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<CreateOrderRejection> for ReconciliationError {
    fn from(rejection: CreateOrderRejection) -> Self {
        match rejection {
            CreateOrderRejection::PaymentNotFound(id) => Self::PaymentNotFound(format!("payment #{id}")),
            CreateOrderRejection::AddressNotFound(_) => Self::AddressResolution(rejection.to_string()),
            CreateOrderRejection::CouponNotFound(_) | CreateOrderRejection::AmountOutOfRange(_) => {
                Self::Validation(rejection.to_string())
            },
            CreateOrderRejection::PaymentNotApproved(..) => Self::PaymentNotApproved(rejection.to_string()),
        }
    }
}
