use crate::{
    db::traits::{AddressResolution, InsertOrderResult, TransitionResult},
    db_types::{NewOrder, OrderStatusType, Payment, PaymentStatus},
    status::TransitionPolicy,
};

/// This trait defines the highest level of behaviour for backends supporting the reconciliation engine.
///
/// This behaviour includes:
/// * Recording the payment status reported by the provider
/// * Finding or deriving a shipping address for a payment
/// * Creating the single order for a payment, atomically
/// * Applying order status transitions under a [`TransitionPolicy`]
///
/// Every mutating method runs in its own transaction. None of them hold locks after they return.
#[allow(async_fn_in_trait)]
pub trait ReconciliationDatabase: Clone {
    type Error: std::error::Error;

    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores the provider status against the payment with the given transaction id and returns the updated
    /// payment. A `PENDING` report never overwrites a status the provider has already decided on.
    ///
    /// Returns `None` if no payment with this transaction id exists.
    async fn record_payment_status(&self, txid: &str, status: PaymentStatus) -> Result<Option<Payment>, Self::Error>;

    /// Finds, or creates, a shipping address for the given payment. The checkout choice wins, followed by an address
    /// previously derived from this payment, then a new address derived from the billing details, and finally the
    /// user's default profile address.
    ///
    /// Repeated calls for the same payment return the same address id.
    async fn resolve_shipping_address(&self, payment_id: i64) -> Result<AddressResolution, Self::Error>;

    /// Takes a new order, and in a single atomic transaction,
    /// * checks that the payment is not already linked to an order. If it is, the existing order is returned.
    /// * checks that the payment is `APPROVED`, and rejects it otherwise
    /// * rejects the order if any line subtotal overflows
    /// * computes the total from the payment amount less any coupon discount
    /// * inserts the order and one item per payment line item
    /// * links the payment to the order
    /// * moves the order to `order.initial_status` and writes the status history
    /// * decrements product stock, never below zero, and increments the coupon usage counter
    ///
    /// A unique constraint violation on the order's payment id is not an error. It means another creator committed
    /// first, and that order is returned as [`InsertOrderResult::AlreadyExists`].
    async fn create_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error>;

    /// Moves the order to `new_status` if the policy allows it, recording the change in the status history.
    /// Writing the status the order already has is a no-op.
    async fn transition_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        provider_status: Option<PaymentStatus>,
        policy: TransitionPolicy,
    ) -> Result<TransitionResult, Self::Error>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
