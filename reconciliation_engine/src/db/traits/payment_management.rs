use crate::{
    db::traits::InsertPaymentResult,
    db_types::{Address, NewPayment, Payment, PaymentItem},
};

/// Read access to payments and the checkout data captured with them.
///
/// Payments are created by the upstream payment-intent flow. [`PaymentManagement::insert_payment`] exists so that
/// that flow (and test fixtures) can share the same backend.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    type Error: std::error::Error;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, Self::Error>;

    async fn fetch_payment_by_txid(&self, txid: &str) -> Result<Option<Payment>, Self::Error>;

    async fn fetch_payment_items(&self, payment_id: i64) -> Result<Vec<PaymentItem>, Self::Error>;

    /// Stores the payment and its line items. If a payment with the same transaction id exists, nothing is written.
    async fn insert_payment(&self, payment: NewPayment) -> Result<InsertPaymentResult, Self::Error>;

    async fn fetch_address(&self, address_id: i64) -> Result<Option<Address>, Self::Error>;
}
