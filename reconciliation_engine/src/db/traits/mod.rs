//! # Database management and control.
//!
//! This module defines the interface contracts of the reconciliation engine database *backends*.
//!
//! * [`ReconciliationDatabase`] defines the transactional operations the engine relies on: recording provider
//!   statuses, resolving shipping addresses, creating orders atomically and applying status transitions.
//! * [`OrderManagement`] defines the behaviour for querying orders, their items and their status history.
//! * [`PaymentManagement`] provides access to payments and the checkout data captured with them.
//!
//! Any backend that honours these contracts, including their atomicity guarantees, can drive the engine.
mod data_objects;
mod order_management;
mod payment_management;
mod reconciliation_database;

pub use data_objects::{
    AddressResolution,
    CreateOrderRejection,
    InsertOrderResult,
    InsertPaymentResult,
    TransitionResult,
};
pub use order_management::OrderManagement;
pub use payment_management::PaymentManagement;
pub use reconciliation_database::ReconciliationDatabase;
