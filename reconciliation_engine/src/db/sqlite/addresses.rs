use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::AddressResolution},
    db_types::{Address, NewAddress, Payment},
};

pub async fn fetch_address(id: i64, conn: &mut SqliteConnection) -> Result<Option<Address>, SqliteDatabaseError> {
    let address = sqlx::query_as("SELECT * FROM addresses WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(address)
}

/// Returns the id of the address previously derived from the given payment, if there is one.
pub async fn address_derived_from_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, SqliteDatabaseError> {
    let id = sqlx::query_scalar("SELECT id FROM addresses WHERE source_payment_id = $1")
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

pub async fn default_address_for_user(
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, SqliteDatabaseError> {
    let id = sqlx::query_scalar(
        "SELECT id FROM addresses WHERE user_id = $1 AND is_default = 1 AND source_payment_id IS NULL ORDER BY id DESC \
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(id)
}

/// Inserts a profile address for a user.
pub async fn insert_address(
    address: NewAddress,
    is_default: bool,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO addresses (user_id, recipient, line1, line2, city, region, postal_code, country, phone, is_default)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id;
        "#,
    )
    .bind(address.user_id)
    .bind(address.recipient)
    .bind(address.line1)
    .bind(address.line2)
    .bind(address.city)
    .bind(address.region)
    .bind(address.postal_code)
    .bind(address.country)
    .bind(address.phone)
    .bind(is_default)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Inserts an address derived from `payment_id`. The unique key on `source_payment_id` guarantees a single derived
/// address per payment: if one already exists, the existing id is returned and `false` signals that nothing was
/// inserted.
async fn insert_derived_address(
    payment_id: i64,
    address: NewAddress,
    conn: &mut SqliteConnection,
) -> Result<(i64, bool), SqliteDatabaseError> {
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO addresses (
            user_id, recipient, line1, line2, city, region, postal_code, country, phone, source_payment_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (source_payment_id) DO NOTHING
        RETURNING id;
        "#,
    )
    .bind(address.user_id)
    .bind(address.recipient)
    .bind(address.line1)
    .bind(address.line2)
    .bind(address.city)
    .bind(address.region)
    .bind(address.postal_code)
    .bind(address.country)
    .bind(address.phone)
    .bind(payment_id)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(id) => Ok((id, true)),
        None => {
            let id = address_derived_from_payment(payment_id, conn).await?.ok_or_else(|| {
                SqliteDatabaseError::InconsistentState(format!(
                    "Derived address for payment #{payment_id} conflicted but cannot be found"
                ))
            })?;
            Ok((id, false))
        },
    }
}

/// Finds or creates a shipping address for the payment.
///
/// Each step runs as its own statement, so this can run outside a transaction: the only write is guarded by the
/// unique key on `source_payment_id`, and concurrent callers converge on the same row.
pub async fn resolve_for_payment(
    payment: &Payment,
    conn: &mut SqliteConnection,
) -> Result<AddressResolution, SqliteDatabaseError> {
    let pid = payment.id;
    if let Some(id) = payment.shipping_address_id {
        if fetch_address(id, &mut *conn).await?.is_some() {
            trace!("🏠️ Payment #{pid} uses checkout address #{id}");
            return Ok(AddressResolution::Existing(id));
        }
        debug!("🏠️ Checkout address #{id} for payment #{pid} no longer exists. Trying the billing details.");
    }
    if let Some(id) = address_derived_from_payment(pid, &mut *conn).await? {
        trace!("🏠️ Payment #{pid} already has derived address #{id}");
        return Ok(AddressResolution::Existing(id));
    }
    if let Some(address) = payment.billing_address() {
        let (id, inserted) = insert_derived_address(pid, address, &mut *conn).await?;
        return if inserted {
            debug!("🏠️ Created address #{id} from the billing details of payment #{pid}");
            Ok(AddressResolution::Created(id))
        } else {
            Ok(AddressResolution::Existing(id))
        };
    }
    if let Some(id) = default_address_for_user(&payment.user_id, conn).await? {
        debug!(
            "🏠️ Payment #{pid} has no usable billing details. Using default address #{id} of user {}",
            payment.user_id
        );
        return Ok(AddressResolution::Existing(id));
    }
    Ok(AddressResolution::Unavailable(format!(
        "Payment #{pid} has no usable billing address and user {} has no default address",
        payment.user_id
    )))
}
