use crate::db_types::{LowStockProduct, Order, OrderItem, OrderStatusChange, OrderWithItems};

/// The `OrderManagement` trait defines the behaviour for querying information about orders in the database backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    type Error: std::error::Error;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, Self::Error>;

    async fn fetch_order_for_payment(&self, payment_id: i64) -> Result<Option<Order>, Self::Error>;

    /// The line items of the order, in insertion order.
    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, Self::Error>;

    async fn fetch_order_with_items(&self, order_id: i64) -> Result<Option<OrderWithItems>, Self::Error> {
        let Some(order) = self.fetch_order(order_id).await? else {
            return Ok(None);
        };
        let items = self.fetch_order_items(order_id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// The status audit trail for the order, oldest first.
    async fn fetch_status_history(&self, order_id: i64) -> Result<Vec<OrderStatusChange>, Self::Error>;

    /// Products in the given order whose stock is at or below their threshold. Products without their own threshold
    /// use `default_threshold`.
    async fn fetch_low_stock_products(
        &self,
        order_id: i64,
        default_threshold: i64,
    ) -> Result<Vec<LowStockProduct>, Self::Error>;

    async fn count_orders_for_payment(&self, payment_id: i64) -> Result<i64, Self::Error>;
}
