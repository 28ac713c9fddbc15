//! Payment Reconciliation Engine
//!
//! The reconciliation engine turns asynchronous payment provider notifications (webhooks) into orders, and into order
//! status changes. Providers deliver notifications at least once, out of order and sometimes concurrently; the engine
//! guarantees that every payment produces at most one order and that replaying a notification changes nothing.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should never need to access
//!    the database directly. Instead, use the public API provided by the engine. The exception is the data types used
//!    in the database. These are defined in the [`db_types`] module and are public.
//! 2. The reconciliation public API ([`mod@recon_api`]). [`ReconciliationApi::reconcile`] is the entry point for every
//!    notification. Backends need to implement the traits in [`traits`] in order to drive it.
//! 3. Status rules ([`status`]). The mapping from provider statuses to order statuses and the rules for moving an order
//!    from one status to another.
//!
//! The engine also emits events when orders are created, when their status changes, and when stock runs low. A simple
//! hook system lets you subscribe to these events, typically by plugging in a
//! [`NotificationService`](events::NotificationService).
mod db;

pub mod db_types;
pub mod events;
mod recon_api;
pub mod status;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits;
pub use db::traits::{
    AddressResolution,
    CreateOrderRejection,
    InsertOrderResult,
    InsertPaymentResult,
    OrderManagement,
    PaymentManagement,
    ReconciliationDatabase,
    TransitionResult,
};
pub use recon_api::{
    Outcome,
    OutcomeKind,
    ReconcilerOptions,
    ReconciliationApi,
    ReconciliationError,
    WebhookEvent,
    DEFAULT_LOW_STOCK_THRESHOLD,
};
