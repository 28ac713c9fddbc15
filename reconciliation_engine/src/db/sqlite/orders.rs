use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{MinorUnits, Order, OrderItem, OrderStatusChange, OrderStatusType, PaymentItem, PaymentStatus},
};

/// The columns needed to create an order row. Orders are always inserted as `pending`.
pub struct OrderRow<'a> {
    pub payment_id: i64,
    pub shipping_address_id: i64,
    pub coupon_id: Option<i64>,
    pub total: MinorUnits,
    pub currency: &'a str,
}

/// Inserts a new order. This is not atomic; run it inside a transaction and pass `&mut *tx` as the connection.
///
/// Returns `None` if an order for the payment already exists. Losing that race is expected when deliveries for the
/// same payment arrive concurrently, so it is not treated as an error.
pub async fn insert_order(
    order: OrderRow<'_>,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, SqliteDatabaseError> {
    let result = sqlx::query_scalar(
        r#"
            INSERT INTO orders (payment_id, shipping_address_id, coupon_id, total, currency, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING id;
        "#,
    )
    .bind(order.payment_id)
    .bind(order.shipping_address_id)
    .bind(order.coupon_id)
    .bind(order.total)
    .bind(order.currency)
    .fetch_one(conn)
    .await;
    match result {
        Ok(id) => {
            trace!("🗃️ Inserted order #{id} for payment #{}", order.payment_id);
            Ok(Some(id))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ An order for payment #{} was created concurrently", order.payment_id);
            Ok(None)
        },
        Err(e) => Err(e.into()),
    }
}

/// Pairs each payment line item with its subtotal, `unit_price × quantity`. Returns `None` if any subtotal overflows.
pub fn order_lines(items: &[PaymentItem]) -> Option<Vec<(&PaymentItem, MinorUnits)>> {
    items.iter().map(|item| item.unit_price.checked_mul(item.quantity).map(|subtotal| (item, subtotal))).collect()
}

/// Copies the payment's line items onto the order.
pub async fn insert_order_items(
    order_id: i64,
    lines: &[(&PaymentItem, MinorUnits)],
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    for (item, subtotal) in lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, variant_id, quantity, unit_price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6);
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.variant_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(*subtotal)
        .execute(&mut *conn)
        .await?;
    }
    trace!("🗃️ Inserted {} items for order #{order_id}", lines.len());
    Ok(())
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as(
        r#"SELECT id, payment_id, shipping_address_id, coupon_id, total, currency, status, created_at, updated_at
        FROM orders WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order_for_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as(
        r#"SELECT id, payment_id, shipping_address_id, coupon_id, total, currency, status, created_at, updated_at
        FROM orders WHERE payment_id = $1"#,
    )
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let items = sqlx::query_as(
        r#"SELECT id, order_id, product_id, variant_id, quantity, unit_price, subtotal
        FROM order_items WHERE order_id = $1 ORDER BY id ASC"#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

pub async fn count_orders_for_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE payment_id = $1")
        .bind(payment_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Touches the order row and returns its current status. Being a write, this makes the enclosing transaction take the
/// database write lock, so the returned status cannot change before the transaction ends.
pub async fn lock_order_status(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderStatusType>, SqliteDatabaseError> {
    let status = sqlx::query_scalar("UPDATE orders SET updated_at = updated_at WHERE id = $1 RETURNING status")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(status)
}

pub async fn update_status(
    order_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(status)
        .bind(order_id)
        .execute(conn)
        .await?;
    if result.rows_affected() != 1 {
        return Err(SqliteDatabaseError::InconsistentState(format!(
            "Status update for order #{order_id} changed {} rows",
            result.rows_affected()
        )));
    }
    trace!("🗃️ Order #{order_id} is now {status}");
    Ok(())
}

/// Appends an entry to the order's status history.
pub async fn record_status_change(
    order_id: i64,
    old_status: Option<OrderStatusType>,
    new_status: OrderStatusType,
    provider_status: Option<PaymentStatus>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO order_status_history (order_id, old_status, new_status, provider_status)
        VALUES ($1, $2, $3, $4);
        "#,
    )
    .bind(order_id)
    .bind(old_status)
    .bind(new_status)
    .bind(provider_status)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_status_history(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderStatusChange>, SqliteDatabaseError> {
    let history = sqlx::query_as(
        r#"SELECT id, order_id, old_status, new_status, provider_status, created_at
        FROM order_status_history WHERE order_id = $1 ORDER BY id ASC"#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(history)
}
