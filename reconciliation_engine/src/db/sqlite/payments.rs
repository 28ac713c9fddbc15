use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertPaymentResult},
    db_types::{NewPayment, Payment, PaymentItem, PaymentStatus},
};

/// Inserts the payment and its line items. Not atomic on its own: run it inside a transaction.
pub async fn idempotent_insert(
    payment: NewPayment,
    conn: &mut SqliteConnection,
) -> Result<InsertPaymentResult, SqliteDatabaseError> {
    let billing = payment.billing_address.clone();
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
            INSERT INTO payments (
                txid, amount, currency, user_id, customer_name, customer_email,
                billing_line1, billing_line2, billing_city, billing_region, billing_postal_code, billing_country,
                billing_phone, shipping_address_id, coupon_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (txid) DO NOTHING
            RETURNING id;
        "#,
    )
    .bind(&payment.txid)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(&payment.user_id)
    .bind(&payment.customer_name)
    .bind(&payment.customer_email)
    .bind(billing.as_ref().map(|a| a.line1.clone()))
    .bind(billing.as_ref().and_then(|a| a.line2.clone()))
    .bind(billing.as_ref().map(|a| a.city.clone()))
    .bind(billing.as_ref().and_then(|a| a.region.clone()))
    .bind(billing.as_ref().map(|a| a.postal_code.clone()))
    .bind(billing.as_ref().map(|a| a.country.clone()))
    .bind(billing.as_ref().and_then(|a| a.phone.clone()))
    .bind(payment.shipping_address_id)
    .bind(payment.coupon_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(id) = inserted else {
        let existing = fetch_payment_by_txid(&payment.txid, conn).await?.ok_or_else(|| {
            SqliteDatabaseError::InconsistentState(format!("Payment {} conflicted but cannot be found", payment.txid))
        })?;
        return Ok(InsertPaymentResult::AlreadyExists(existing.id));
    };
    for item in payment.items {
        sqlx::query(
            r#"
            INSERT INTO payment_items (payment_id, product_id, variant_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5);
            "#,
        )
        .bind(id)
        .bind(item.product_id)
        .bind(item.variant_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(InsertPaymentResult::Inserted(id))
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_txid(
    txid: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE txid = $1").bind(txid).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_items(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentItem>, SqliteDatabaseError> {
    let items = sqlx::query_as(
        r#"SELECT id, payment_id, product_id, variant_id, quantity, unit_price
        FROM payment_items WHERE payment_id = $1 ORDER BY id ASC"#,
    )
    .bind(payment_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Stores the provider status. A `PENDING` report is only written over another `PENDING`, so a late pending
/// notification cannot undo a decision the provider has already made.
///
/// Returns the number of rows changed.
pub async fn update_status(
    txid: &str,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE payments SET status = $1, updated_at = CURRENT_TIMESTAMP
        WHERE txid = $2 AND status <> $1 AND ($1 <> 'PENDING' OR status = 'PENDING')
        "#,
    )
    .bind(status)
    .bind(txid)
    .execute(conn)
    .await?;
    trace!("🗃️ Payment [{txid}] status update to {status} changed {} rows", result.rows_affected());
    Ok(result.rows_affected())
}

/// Touches the payment row and returns its current order link. Being a write, this makes the enclosing transaction
/// take the database write lock before anything else is read, so the returned link cannot go stale before commit.
///
/// Returns `None` if the payment does not exist, otherwise `Some(order_id)`.
pub async fn lock_for_order_creation(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Option<i64>>, SqliteDatabaseError> {
    let link = sqlx::query_scalar(
        "UPDATE payments SET updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING order_id",
    )
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    Ok(link)
}

/// Links the payment to its order. The link can only be set once.
pub async fn link_order(
    payment_id: i64,
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payments SET order_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND order_id IS NULL",
    )
    .bind(order_id)
    .bind(payment_id)
    .execute(conn)
    .await?;
    if result.rows_affected() != 1 {
        return Err(SqliteDatabaseError::InconsistentState(format!(
            "Payment #{payment_id} could not be linked to order #{order_id}. It is missing or already linked."
        )));
    }
    Ok(())
}
