use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{Coupon, DiscountType},
};

pub async fn fetch_coupon(id: i64, conn: &mut SqliteConnection) -> Result<Option<Coupon>, SqliteDatabaseError> {
    let coupon = sqlx::query_as("SELECT id, code, discount_type, discount_value, times_used FROM coupons WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(coupon)
}

pub async fn increment_usage(id: i64, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE coupons SET times_used = times_used + 1 WHERE id = $1").bind(id).execute(conn).await?;
    Ok(())
}

pub async fn insert_coupon(
    code: &str,
    discount_type: DiscountType,
    discount_value: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let id = sqlx::query_scalar(
        "INSERT INTO coupons (code, discount_type, discount_value) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(code)
    .bind(discount_type)
    .bind(discount_value)
    .fetch_one(conn)
    .await?;
    Ok(id)
}
