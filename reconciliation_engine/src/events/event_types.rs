use serde::{Deserialize, Serialize};

use crate::db_types::{LowStockProduct, MinorUnits, Order, OrderStatusType};

/// Emitted once, when the order for a payment is first created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderEvent {
    pub order: Order,
    /// Who placed the order, for display. The customer name, their email, or the user id, in that order of preference.
    pub customer_label: String,
}

impl NewOrderEvent {
    pub fn new(order: Order, customer_label: String) -> Self {
        Self { order, customer_label }
    }

    pub fn total(&self) -> MinorUnits {
        self.order.total
    }
}

/// Emitted whenever an order's status is actually written. Replays and stale updates do not emit this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order_id: i64,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order_id: i64, old_status: OrderStatusType, new_status: OrderStatusType) -> Self {
        Self { order_id, old_status, new_status }
    }
}

/// Emitted for every product in a freshly created order whose stock is at or below its threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockEvent {
    pub order_id: i64,
    pub product: LowStockProduct,
}

impl LowStockEvent {
    pub fn new(order_id: i64, product: LowStockProduct) -> Self {
        Self { order_id, product }
    }
}
