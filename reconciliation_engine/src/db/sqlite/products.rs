use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{LowStockProduct, Product},
};

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, SqliteDatabaseError> {
    let product = sqlx::query_as("SELECT id, name, stock, low_stock_threshold FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn insert_product(
    name: &str,
    stock: i64,
    low_stock_threshold: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let id = sqlx::query_scalar(
        "INSERT INTO products (name, stock, low_stock_threshold) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(stock)
    .bind(low_stock_threshold)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Removes `quantity` units from stock. Stock never drops below zero.
pub async fn decrement_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE products SET stock = MAX(stock - $1, 0), updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(quantity)
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Products in the order whose stock is at or below their threshold, one row per product.
pub async fn low_stock_products_for_order(
    order_id: i64,
    default_threshold: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LowStockProduct>, SqliteDatabaseError> {
    let products = sqlx::query_as(
        r#"
        SELECT
            p.id AS product_id,
            p.name AS product_name,
            p.stock AS current_stock,
            COALESCE(p.low_stock_threshold, $2) AS threshold
        FROM products p
        WHERE p.id IN (SELECT product_id FROM order_items WHERE order_id = $1)
            AND p.stock <= COALESCE(p.low_stock_threshold, $2)
        ORDER BY p.id ASC
        "#,
    )
    .bind(order_id)
    .bind(default_threshold)
    .fetch_all(conn)
    .await?;
    Ok(products)
}
