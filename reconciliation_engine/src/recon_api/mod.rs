//! # Reconciliation engine public API
//!
//! [`ReconciliationApi`] is the entry point for payment provider notifications. It is created by supplying a database
//! backend that implements the backend traits in [`crate::db::traits`], and the [`EventProducers`](crate::events)
//! that notifications are queued on.
//!
//! ```rust,ignore
//! use reconciliation_engine::{events::{EventHandlers, EventHooks, LogNotifier}, ReconciliationApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/reconciler.db", 10).await?;
//! let mut hooks = EventHooks::default();
//! hooks.with_notifier(Arc::new(LogNotifier));
//! let handlers = EventHandlers::new(64, hooks);
//! let api = ReconciliationApi::new(db, handlers.producers());
//! let jobs = handlers.start_handlers();
//! let outcome = api.reconcile("tx-abc", PaymentStatus::Approved).await;
//! ```
mod errors;
mod outcome;
mod reconciliation_api;
mod webhook_objects;

pub use errors::ReconciliationError;
pub use outcome::{Outcome, OutcomeKind};
pub use reconciliation_api::{ReconcilerOptions, ReconciliationApi, DEFAULT_LOW_STOCK_THRESHOLD};
pub use webhook_objects::WebhookEvent;
