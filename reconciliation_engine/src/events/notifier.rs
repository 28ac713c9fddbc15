//! The outbound notification contract.
//!
//! The engine never calls a [`NotificationService`] directly from the reconciliation flow. Notifications are queued as
//! events and delivered by the handlers wired up in [`EventHooks::with_notifier`](crate::events::EventHooks), so a slow
//! or failing notifier cannot affect the outcome of a reconciliation.
use async_trait::async_trait;
use log::*;
use thiserror::Error;

use crate::db_types::{MinorUnits, OrderStatusType};

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("The notification service is unavailable: {0}")]
    Unavailable(String),
    #[error("The notification was rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn notify_new_order(
        &self,
        order_id: i64,
        customer_label: &str,
        total: MinorUnits,
    ) -> Result<(), NotificationError>;

    async fn notify_order_status_change(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
    ) -> Result<(), NotificationError>;

    async fn notify_low_stock(
        &self,
        product_id: i64,
        product_name: &str,
        current_stock: i64,
        threshold: i64,
    ) -> Result<(), NotificationError>;
}

/// Writes every notification to the log. Useful when no real delivery channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationService for LogNotifier {
    async fn notify_new_order(
        &self,
        order_id: i64,
        customer_label: &str,
        total: MinorUnits,
    ) -> Result<(), NotificationError> {
        info!("📬️ New order #{order_id} from {customer_label} for {total}");
        Ok(())
    }

    async fn notify_order_status_change(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
    ) -> Result<(), NotificationError> {
        info!("📬️ Order #{order_id} is now {new_status}");
        Ok(())
    }

    async fn notify_low_stock(
        &self,
        product_id: i64,
        product_name: &str,
        current_stock: i64,
        threshold: i64,
    ) -> Result<(), NotificationError> {
        warn!("📬️ Low stock: {product_name} (#{product_id}) has {current_stock} left. Threshold is {threshold}");
        Ok(())
    }
}
