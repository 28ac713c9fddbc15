use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db::traits::{
        AddressResolution,
        InsertOrderResult,
        OrderManagement,
        PaymentManagement,
        ReconciliationDatabase,
        TransitionResult,
    },
    db_types::{NewOrder, Order, OrderStatusType, Payment, PaymentStatus},
    events::{EventProducers, LowStockEvent, NewOrderEvent, OrderStatusChangedEvent},
    recon_api::{Outcome, OutcomeKind, ReconciliationError, WebhookEvent},
    status::{map_status, TransitionPolicy},
};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerOptions {
    /// Used for products that do not define their own low-stock threshold
    pub low_stock_threshold: i64,
    pub transition_policy: TransitionPolicy,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self { low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD, transition_policy: TransitionPolicy::default() }
    }
}

/// `ReconciliationApi` turns payment provider notifications into orders and order status changes.
///
/// Every delivery of a notification may be a duplicate, and deliveries for the same payment may arrive concurrently.
/// The API relies on the backend's atomic operations to guarantee that each payment produces at most one order, and
/// that replaying a notification changes nothing.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
    options: ReconcilerOptions,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.options)
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, options: ReconcilerOptions::default() }
    }

    pub fn with_options(mut self, options: ReconcilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ReconcilerOptions {
        &self.options
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> ReconciliationApi<B>
where B: ReconciliationDatabase + OrderManagement + PaymentManagement
{
    /// Handles a payment notification for the payment with transaction id `txid`.
    ///
    /// * If the payment has no order yet and `status` is `APPROVED`, a shipping address is resolved and the order is
    ///   created.
    /// * If the payment already has an order, the order is moved to the status that `status` maps to, subject to the
    ///   configured [`TransitionPolicy`].
    /// * Otherwise nothing needs to happen.
    ///
    /// This method never fails. Failures are reported in the returned [`Outcome`].
    pub async fn reconcile(&self, txid: &str, status: PaymentStatus) -> Outcome {
        match self.try_reconcile(txid, status).await {
            Ok(outcome) => {
                debug!("🔄️ Notification [{txid}] {status}: {outcome}");
                outcome
            },
            Err(e) => {
                warn!("🔄️ Notification [{txid}] {status} could not be reconciled. {e}");
                Outcome::from(e)
            },
        }
    }

    /// Validates a webhook payload and reconciles it.
    pub async fn handle_webhook(&self, event: WebhookEvent) -> Outcome {
        match event.validate() {
            Ok((txid, status)) => self.reconcile(&txid, status).await,
            Err(e) => {
                warn!("🔄️ Rejecting webhook {event:?}. {e}");
                Outcome::from(e)
            },
        }
    }

    /// Finds, or derives, the shipping address for the payment. Calling this repeatedly for the same payment returns
    /// the same address.
    pub async fn resolve_shipping_address(&self, payment_id: i64) -> Result<i64, ReconciliationError> {
        validate_id("payment", payment_id)?;
        match self.db.resolve_shipping_address(payment_id).await.map_err(ReconciliationError::database)? {
            AddressResolution::Existing(id) | AddressResolution::Created(id) => Ok(id),
            AddressResolution::Unavailable(reason) => Err(ReconciliationError::AddressResolution(reason)),
        }
    }

    /// Creates the order for a payment with an explicit shipping address and optional coupon.
    ///
    /// Only an `APPROVED` payment can have an order. For any other recorded status the backend returns
    /// `InsertOrderResult::Rejected(CreateOrderRejection::PaymentNotApproved(..))` and nothing is written. If the
    /// payment already has an order, that order is returned and nothing is written.
    pub async fn create_order_for_payment(
        &self,
        payment_id: i64,
        shipping_address_id: i64,
        coupon_id: Option<i64>,
    ) -> Result<InsertOrderResult, ReconciliationError> {
        validate_id("payment", payment_id)?;
        validate_id("address", shipping_address_id)?;
        if let Some(id) = coupon_id {
            validate_id("coupon", id)?;
        }
        let payment = self
            .db
            .fetch_payment(payment_id)
            .await
            .map_err(ReconciliationError::database)?
            .ok_or_else(|| ReconciliationError::PaymentNotFound(format!("payment #{payment_id}")))?;
        let order = NewOrder::new(payment_id, shipping_address_id)
            .with_coupon(coupon_id)
            .with_initial_status(map_status(payment.status), Some(payment.status));
        let result = self.db.create_order(order).await.map_err(ReconciliationError::database)?;
        if let InsertOrderResult::Inserted(order) = &result {
            self.on_order_created(order, &payment).await;
        }
        Ok(result)
    }

    /// Moves an order to `new_status` on behalf of an operator or the fulfilment system, under the same rules as
    /// provider notifications.
    ///
    /// Requesting a status the order has already passed is refused here, since there is no out-of-order delivery to
    /// forgive.
    pub async fn update_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
    ) -> Result<Order, ReconciliationError> {
        validate_id("order", order_id)?;
        let policy = self.options.transition_policy;
        let result = self
            .db
            .transition_order_status(order_id, new_status, None, policy)
            .await
            .map_err(ReconciliationError::database)?;
        match result {
            TransitionResult::Changed { previous, order } => {
                info!("🔄️ Order #{order_id} manually moved from {previous} to {new_status}");
                self.publish_status_change(order_id, previous, new_status);
                Ok(order)
            },
            TransitionResult::Unchanged(order) => Ok(order),
            TransitionResult::Stale { requested, order } => Err(ReconciliationError::TransitionRefused {
                order_id,
                requested,
                reason: format!("order is already {}", order.status),
            }),
            TransitionResult::Refused { requested, reason, .. } => {
                Err(ReconciliationError::TransitionRefused { order_id, requested, reason })
            },
            TransitionResult::OrderNotFound(id) => Err(ReconciliationError::OrderNotFound(id)),
        }
    }

    async fn try_reconcile(&self, txid: &str, status: PaymentStatus) -> Result<Outcome, ReconciliationError> {
        let txid = txid.trim();
        if txid.is_empty() {
            return Err(ReconciliationError::Validation("The transaction id is blank".to_string()));
        }
        let payment = self
            .db
            .record_payment_status(txid, status)
            .await
            .map_err(ReconciliationError::database)?
            .ok_or_else(|| ReconciliationError::PaymentNotFound(format!("transaction {txid}")))?;
        match payment.order_id {
            Some(order_id) => self.apply_provider_status(order_id, status).await,
            None if status == PaymentStatus::Approved => self.create_order_from_payment(&payment).await,
            None => {
                trace!("🔄️ Payment #{} has no order and {status} does not call for one", payment.id);
                Ok(Outcome::success(OutcomeKind::NoActionNeeded, "No action needed"))
            },
        }
    }

    async fn create_order_from_payment(&self, payment: &Payment) -> Result<Outcome, ReconciliationError> {
        let address_id = self.resolve_shipping_address(payment.id).await?;
        let order = NewOrder::new(payment.id, address_id)
            .with_coupon(payment.coupon_id)
            .with_initial_status(map_status(PaymentStatus::Approved), Some(PaymentStatus::Approved));
        match self.db.create_order(order).await.map_err(ReconciliationError::database)? {
            InsertOrderResult::Inserted(order) => {
                info!(
                    "🔄️ Order #{} created for payment [{}]. Total {} {}",
                    order.id, payment.txid, order.total, order.currency
                );
                self.on_order_created(&order, payment).await;
                Ok(Outcome::success(OutcomeKind::OrderCreated, "Order created").with_order(&order))
            },
            InsertOrderResult::AlreadyExists(order) => {
                debug!("🔄️ Payment [{}] already has order #{}", payment.txid, order.id);
                Ok(Outcome::success(OutcomeKind::OrderExists, "Order already exists").with_order(&order))
            },
            InsertOrderResult::Rejected(rejection) => Err(rejection.into()),
        }
    }

    async fn apply_provider_status(
        &self,
        order_id: i64,
        status: PaymentStatus,
    ) -> Result<Outcome, ReconciliationError> {
        let target = map_status(status);
        let policy = self.options.transition_policy;
        let result = self
            .db
            .transition_order_status(order_id, target, Some(status), policy)
            .await
            .map_err(ReconciliationError::database)?;
        match result {
            TransitionResult::Changed { previous, order } => {
                info!("🔄️ Order #{order_id} moved from {previous} to {target} after a {status} notification");
                self.publish_status_change(order_id, previous, target);
                Ok(Outcome::success(OutcomeKind::StatusChanged, format!("Order status changed to {target}"))
                    .with_order(&order))
            },
            TransitionResult::Unchanged(order) => {
                let message = format!("Order is already {target}");
                Ok(Outcome::success(OutcomeKind::StatusUnchanged, message).with_order(&order))
            },
            TransitionResult::Stale { requested, order } => {
                let message =
                    format!("Order is already {}. Ignoring the out-of-order move to {requested}", order.status);
                Ok(Outcome::success(OutcomeKind::StatusUnchanged, message).with_order(&order))
            },
            TransitionResult::Refused { requested, reason, .. } => {
                Err(ReconciliationError::TransitionRefused { order_id, requested, reason })
            },
            TransitionResult::OrderNotFound(id) => Err(ReconciliationError::OrderNotFound(id)),
        }
    }

    /// Queues the new-order notification, then one low-stock notification for every product in the order that has
    /// run low. Failures here never affect the order.
    async fn on_order_created(&self, order: &Order, payment: &Payment) {
        for emitter in &self.producers.new_order_producer {
            trace!("🔄️ Notifying new order hook subscribers");
            emitter.try_publish(NewOrderEvent::new(order.clone(), payment.customer_label()));
        }
        if self.producers.low_stock_producer.is_empty() {
            return;
        }
        let threshold = self.options.low_stock_threshold;
        let products = match self.db.fetch_low_stock_products(order.id, threshold).await {
            Ok(products) => products,
            Err(e) => {
                warn!("🔄️ Could not check stock levels for order #{}. {e}", order.id);
                return;
            },
        };
        for product in products {
            debug!(
                "🔄️ {} (#{}) is low on stock: {} left, threshold {}",
                product.product_name, product.product_id, product.current_stock, product.threshold
            );
            for emitter in &self.producers.low_stock_producer {
                emitter.try_publish(LowStockEvent::new(order.id, product.clone()));
            }
        }
    }

    fn publish_status_change(&self, order_id: i64, old_status: OrderStatusType, new_status: OrderStatusType) {
        for emitter in &self.producers.order_status_changed_producer {
            trace!("🔄️ Notifying order status changed hook subscribers");
            emitter.try_publish(OrderStatusChangedEvent::new(order_id, old_status, new_status));
        }
    }
}

fn validate_id(name: &str, id: i64) -> Result<(), ReconciliationError> {
    if id <= 0 {
        return Err(ReconciliationError::Validation(format!("The {name} id must be positive, but was {id}")));
    }
    Ok(())
}
