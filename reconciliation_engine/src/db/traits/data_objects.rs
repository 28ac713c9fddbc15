use std::fmt::Display;

use serde::Serialize;

use crate::db_types::{Order, OrderStatusType, PaymentStatus};

/// The result of the atomic order-creation operation.
#[derive(Debug, Clone)]
pub enum InsertOrderResult {
    /// The order was created by this call.
    Inserted(Order),
    /// An order for the payment already exists, either from an earlier delivery or from a concurrent creator that
    /// won the race. The existing order is returned.
    AlreadyExists(Order),
    /// A precondition failed. Nothing was written.
    Rejected(CreateOrderRejection),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CreateOrderRejection {
    PaymentNotFound(i64),
    AddressNotFound(i64),
    CouponNotFound(i64),
    /// Orders are only created for approved payments. Carries the payment's recorded status.
    PaymentNotApproved(i64, PaymentStatus),
    /// A line subtotal does not fit in the amount type.
    AmountOutOfRange(i64),
}

impl Display for CreateOrderRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaymentNotFound(id) => write!(f, "Payment #{id} does not exist"),
            Self::AddressNotFound(id) => write!(f, "Shipping address #{id} does not exist"),
            Self::CouponNotFound(id) => write!(f, "Coupon #{id} does not exist"),
            Self::PaymentNotApproved(id, status) => write!(f, "Payment #{id} is {status}, not APPROVED"),
            Self::AmountOutOfRange(id) => write!(f, "A line item of payment #{id} has an out-of-range subtotal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPaymentResult {
    Inserted(i64),
    AlreadyExists(i64),
}

impl InsertPaymentResult {
    pub fn id(&self) -> i64 {
        match self {
            Self::Inserted(id) | Self::AlreadyExists(id) => *id,
        }
    }
}

/// The result of the address-from-payment operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressResolution {
    /// A suitable address already existed (checkout choice, earlier derivation, or profile default).
    Existing(i64),
    /// A new address was derived from the payment's billing details.
    Created(i64),
    /// No usable address data is available for this payment.
    Unavailable(String),
}

/// The result of an order status transition.
#[derive(Debug, Clone)]
pub enum TransitionResult {
    /// The status was written. `order` carries the new state.
    Changed { previous: OrderStatusType, order: Order },
    /// The order already had the requested status.
    Unchanged(Order),
    /// The order is further along than the requested status; the request was ignored.
    Stale { requested: OrderStatusType, order: Order },
    /// The transition is not permitted. The order is unchanged.
    Refused { requested: OrderStatusType, order: Order, reason: String },
    OrderNotFound(i64),
}
