use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::{addresses, coupons, db_url, new_pool, orders, payments, products, SqliteDatabaseError};
use crate::{
    db::traits::{
        AddressResolution,
        CreateOrderRejection,
        InsertOrderResult,
        InsertPaymentResult,
        OrderManagement,
        PaymentManagement,
        ReconciliationDatabase,
        TransitionResult,
    },
    db_types::{
        Address,
        LowStockProduct,
        NewOrder,
        NewPayment,
        Order,
        OrderItem,
        OrderStatusChange,
        OrderStatusType,
        Payment,
        PaymentItem,
        PaymentStatus,
    },
    status::{TransitionDecision, TransitionPolicy},
};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `RECON_DATABASE_URL`
    pub async fn new() -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Connected to {url} with a pool of {max_connections} connections");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete for {}", self.url);
        Ok(())
    }

    /// Stores a payment and its line items. If a payment with the same transaction id exists, nothing is written.
    async fn store_payment(&self, payment: NewPayment) -> Result<InsertPaymentResult, SqliteDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let txid = payment.txid.clone();
        let result = payments::idempotent_insert(payment, &mut tx).await?;
        tx.commit().await?;
        match &result {
            InsertPaymentResult::Inserted(id) => debug!("🗃️ Payment [{txid}] saved with id #{id}"),
            InsertPaymentResult::AlreadyExists(id) => debug!("🗃️ Payment [{txid}] already exists as #{id}"),
        }
        Ok(result)
    }

    /// Re-reads an order that a concurrent creator committed after our transaction was rolled back.
    async fn existing_order_for_payment(&self, payment_id: i64) -> Result<Order, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_for_payment(payment_id, &mut conn).await?.ok_or_else(|| {
            SqliteDatabaseError::InconsistentState(format!(
                "An order for payment #{payment_id} was reported to exist, but it cannot be found"
            ))
        })
    }
}

impl ReconciliationDatabase for SqliteDatabase {
    type Error = SqliteDatabaseError;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn record_payment_status(&self, txid: &str, status: PaymentStatus) -> Result<Option<Payment>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let changed = payments::update_status(txid, status, &mut tx).await?;
        let payment = payments::fetch_payment_by_txid(txid, &mut tx).await?;
        tx.commit().await?;
        match &payment {
            Some(p) if changed > 0 => debug!("🗃️ Payment [{txid}] (#{}) status is now {}", p.id, p.status),
            Some(p) if p.status != status => {
                debug!("🗃️ Payment [{txid}] is already {}. Ignoring the late {status} report", p.status)
            },
            Some(_) => trace!("🗃️ Payment [{txid}] is already {status}"),
            None => debug!("🗃️ No payment with transaction id [{txid}] exists"),
        }
        Ok(payment)
    }

    async fn resolve_shipping_address(&self, payment_id: i64) -> Result<AddressResolution, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        let Some(payment) = payments::fetch_payment(payment_id, &mut conn).await? else {
            return Ok(AddressResolution::Unavailable(format!("Payment #{payment_id} does not exist")));
        };
        addresses::resolve_for_payment(&payment, &mut conn).await
    }

    async fn create_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let pid = order.payment_id;
        let mut tx = self.pool.begin().await?;
        // The first statement is a write so that this transaction holds the write lock from here on.
        let link = payments::lock_for_order_creation(pid, &mut tx).await?;
        let existing = match link {
            None => {
                tx.rollback().await?;
                debug!("🗃️ Cannot create an order. Payment #{pid} does not exist");
                return Ok(InsertOrderResult::Rejected(CreateOrderRejection::PaymentNotFound(pid)));
            },
            Some(Some(order_id)) => orders::fetch_order(order_id, &mut tx).await?,
            Some(None) => None,
        };
        if let Some(existing) = existing {
            tx.rollback().await?;
            debug!("🗃️ Payment #{pid} is already linked to order #{}", existing.id);
            return Ok(InsertOrderResult::AlreadyExists(existing));
        }
        let payment = payments::fetch_payment(pid, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::InconsistentState(format!("Payment #{pid} vanished mid-transaction")))?;
        if payment.status != PaymentStatus::Approved {
            tx.rollback().await?;
            debug!("🗃️ Cannot create an order. Payment #{pid} is {}", payment.status);
            return Ok(InsertOrderResult::Rejected(CreateOrderRejection::PaymentNotApproved(pid, payment.status)));
        }
        let items = payments::fetch_payment_items(pid, &mut tx).await?;
        let Some(lines) = orders::order_lines(&items) else {
            tx.rollback().await?;
            warn!("🗃️ Cannot create an order. A line item subtotal of payment #{pid} overflows");
            return Ok(InsertOrderResult::Rejected(CreateOrderRejection::AmountOutOfRange(pid)));
        };
        if addresses::fetch_address(order.shipping_address_id, &mut tx).await?.is_none() {
            tx.rollback().await?;
            return Ok(InsertOrderResult::Rejected(CreateOrderRejection::AddressNotFound(order.shipping_address_id)));
        }
        let mut total = payment.amount;
        if let Some(coupon_id) = order.coupon_id {
            let Some(coupon) = coupons::fetch_coupon(coupon_id, &mut tx).await? else {
                tx.rollback().await?;
                return Ok(InsertOrderResult::Rejected(CreateOrderRejection::CouponNotFound(coupon_id)));
            };
            total = coupon.apply(total);
            trace!("🗃️ Coupon {} reduces the total for payment #{pid} from {} to {total}", coupon.code, payment.amount);
        }
        let row = orders::OrderRow {
            payment_id: pid,
            shipping_address_id: order.shipping_address_id,
            coupon_id: order.coupon_id,
            total,
            currency: payment.currency.as_str(),
        };
        let Some(order_id) = orders::insert_order(row, &mut tx).await? else {
            tx.rollback().await?;
            let existing = self.existing_order_for_payment(pid).await?;
            return Ok(InsertOrderResult::AlreadyExists(existing));
        };
        orders::record_status_change(order_id, None, OrderStatusType::Pending, order.provider_status, &mut tx).await?;
        orders::insert_order_items(order_id, &lines, &mut tx).await?;
        for item in &items {
            products::decrement_stock(item.product_id, item.quantity, &mut tx).await?;
        }
        if let Some(coupon_id) = order.coupon_id {
            coupons::increment_usage(coupon_id, &mut tx).await?;
        }
        payments::link_order(pid, order_id, &mut tx).await?;
        if order.initial_status != OrderStatusType::Pending {
            orders::update_status(order_id, order.initial_status, &mut tx).await?;
            orders::record_status_change(
                order_id,
                Some(OrderStatusType::Pending),
                order.initial_status,
                order.provider_status,
                &mut tx,
            )
            .await?;
        }
        let created = orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| {
            SqliteDatabaseError::InconsistentState(format!("Order #{order_id} vanished mid-transaction"))
        })?;
        tx.commit().await?;
        debug!(
            "🗃️ Order #{order_id} created for payment #{pid} with {} items. Total {} {}, status {}",
            items.len(),
            created.total,
            created.currency,
            created.status
        );
        Ok(InsertOrderResult::Inserted(created))
    }

    async fn transition_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        provider_status: Option<PaymentStatus>,
        policy: TransitionPolicy,
    ) -> Result<TransitionResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let Some(current) = orders::lock_order_status(order_id, &mut tx).await? else {
            tx.rollback().await?;
            return Ok(TransitionResult::OrderNotFound(order_id));
        };
        let decision = policy.decide(current, new_status);
        if decision == TransitionDecision::Apply {
            orders::update_status(order_id, new_status, &mut tx).await?;
            orders::record_status_change(order_id, Some(current), new_status, provider_status, &mut tx).await?;
        }
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| {
            SqliteDatabaseError::InconsistentState(format!("Order #{order_id} vanished mid-transaction"))
        })?;
        let result = match decision {
            TransitionDecision::Apply => {
                tx.commit().await?;
                debug!("🗃️ Order #{order_id} moved from {current} to {new_status}");
                TransitionResult::Changed { previous: current, order }
            },
            TransitionDecision::NoOp => {
                tx.rollback().await?;
                TransitionResult::Unchanged(order)
            },
            TransitionDecision::Stale => {
                tx.rollback().await?;
                debug!("🗃️ Order #{order_id} is already {current}. Ignoring the stale move to {new_status}");
                TransitionResult::Stale { requested: new_status, order }
            },
            TransitionDecision::Refuse(reason) => {
                tx.rollback().await?;
                warn!("🗃️ Refused to move order #{order_id} from {current} to {new_status}: {reason}");
                TransitionResult::Refused { requested: new_status, order, reason }
            },
        };
        Ok(result)
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_for_payment(&self, payment_id: i64) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_for_payment(payment_id, &mut conn).await
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_items(order_id, &mut conn).await
    }

    async fn fetch_status_history(&self, order_id: i64) -> Result<Vec<OrderStatusChange>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_status_history(order_id, &mut conn).await
    }

    async fn fetch_low_stock_products(
        &self,
        order_id: i64,
        default_threshold: i64,
    ) -> Result<Vec<LowStockProduct>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        products::low_stock_products_for_order(order_id, default_threshold, &mut conn).await
    }

    async fn count_orders_for_payment(&self, payment_id: i64) -> Result<i64, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::count_orders_for_payment(payment_id, &mut conn).await
    }
}

impl PaymentManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(payment_id, &mut conn).await
    }

    async fn fetch_payment_by_txid(&self, txid: &str) -> Result<Option<Payment>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_by_txid(txid, &mut conn).await
    }

    async fn fetch_payment_items(&self, payment_id: i64) -> Result<Vec<PaymentItem>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_items(payment_id, &mut conn).await
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<InsertPaymentResult, Self::Error> {
        self.store_payment(payment).await
    }

    async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        addresses::fetch_address(address_id, &mut conn).await
    }
}
