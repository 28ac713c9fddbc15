use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use recon_common::MinorUnits;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------    PaymentStatus     ---------------------------------------------------------
/// The payment status as reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// The provider has not reached a decision yet.
    Pending,
    /// Funds have been captured.
    Approved,
    /// The provider or the issuer refused the payment.
    Declined,
    /// The payment was voided before capture.
    Voided,
    /// The provider failed to process the payment.
    Error,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::Approved,
        PaymentStatus::Declined,
        PaymentStatus::Voided,
        PaymentStatus::Error,
    ];
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Approved => write!(f, "APPROVED"),
            PaymentStatus::Declined => write!(f, "DECLINED"),
            PaymentStatus::Voided => write!(f, "VOIDED"),
            PaymentStatus::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "DECLINED" => Ok(Self::Declined),
            "VOIDED" => Ok(Self::Voided),
            "ERROR" => Ok(Self::Error),
            _ => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------   OrderStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order exists but payment has not been approved.
    Pending,
    /// Payment for the order has been approved.
    Paid,
    /// The merchant has accepted the order for fulfilment.
    Confirmed,
    /// The order has left the warehouse.
    Shipped,
    /// The order has reached the customer.
    Delivered,
    /// The order has been cancelled. This is a terminal state.
    Cancelled,
}

impl OrderStatusType {
    /// Position of the status along the fulfilment chain. `Cancelled` sits outside the chain and has no rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            OrderStatusType::Pending => Some(0),
            OrderStatusType::Paid => Some(1),
            OrderStatusType::Confirmed => Some(2),
            OrderStatusType::Shipped => Some(3),
            OrderStatusType::Delivered => Some(4),
            OrderStatusType::Cancelled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatusType::Pending => "pending",
            OrderStatusType::Paid => "paid",
            OrderStatusType::Confirmed => "confirmed",
            OrderStatusType::Shipped => "shipped",
            OrderStatusType::Delivered => "delivered",
            OrderStatusType::Cancelled => "cancelled",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: i64,
    /// The transaction id assigned by the payment provider
    pub txid: String,
    pub status: PaymentStatus,
    pub amount: MinorUnits,
    pub currency: String,
    /// The user that owns the payment
    pub user_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub billing_line1: Option<String>,
    pub billing_line2: Option<String>,
    pub billing_city: Option<String>,
    pub billing_region: Option<String>,
    pub billing_postal_code: Option<String>,
    pub billing_country: Option<String>,
    pub billing_phone: Option<String>,
    /// The shipping address chosen at checkout, if any
    pub shipping_address_id: Option<i64>,
    /// An already-validated coupon captured at checkout
    pub coupon_id: Option<i64>,
    /// Set exactly once, when the order for this payment is created
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// A human-readable label for the customer, used in notifications.
    pub fn customer_label(&self) -> String {
        [&self.customer_name, &self.customer_email]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| format!("user {}", self.user_id))
    }

    /// Builds a shipping address from the billing fields captured at payment time. Returns `None` if any of the
    /// mandatory fields is missing.
    pub fn billing_address(&self) -> Option<NewAddress> {
        let address = NewAddress {
            user_id: self.user_id.clone(),
            recipient: self.customer_name.clone().unwrap_or_default(),
            line1: self.billing_line1.clone().unwrap_or_default(),
            line2: self.billing_line2.clone(),
            city: self.billing_city.clone().unwrap_or_default(),
            region: self.billing_region.clone(),
            postal_code: self.billing_postal_code.clone().unwrap_or_default(),
            country: self.billing_country.clone().unwrap_or_default(),
            phone: self.billing_phone.clone(),
        };
        address.is_usable().then_some(address)
    }
}

//--------------------------------------      NewPayment       ---------------------------------------------------------
/// A payment as captured by the upstream payment-intent flow. Reconciliation only ever reads payments, so this is
/// mostly used to seed databases.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub txid: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub user_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub billing_address: Option<NewAddress>,
    pub shipping_address_id: Option<i64>,
    pub coupon_id: Option<i64>,
    pub items: Vec<NewPaymentItem>,
}

impl NewPayment {
    pub fn new<S: Into<String>>(txid: S, user_id: S, amount: MinorUnits) -> Self {
        Self {
            txid: txid.into(),
            amount,
            currency: "USD".to_string(),
            user_id: user_id.into(),
            customer_name: None,
            customer_email: None,
            billing_address: None,
            shipping_address_id: None,
            coupon_id: None,
            items: Vec::new(),
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn with_customer(mut self, name: &str, email: &str) -> Self {
        self.customer_name = Some(name.to_string());
        self.customer_email = Some(email.to_string());
        self
    }

    pub fn with_billing_address(mut self, address: NewAddress) -> Self {
        self.billing_address = Some(address);
        self
    }

    pub fn with_shipping_address(mut self, address_id: i64) -> Self {
        self.shipping_address_id = Some(address_id);
        self
    }

    pub fn with_coupon(mut self, coupon_id: i64) -> Self {
        self.coupon_id = Some(coupon_id);
        self
    }

    pub fn with_item(mut self, item: NewPaymentItem) -> Self {
        self.items.push(item);
        self
    }
}

//--------------------------------------      PaymentItem      ---------------------------------------------------------
/// A cart line captured at payment time. Order items are snapshotted from these.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentItem {
    pub id: i64,
    pub payment_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: MinorUnits,
}

#[derive(Debug, Clone)]
pub struct NewPaymentItem {
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: MinorUnits,
}

impl NewPaymentItem {
    pub fn new(product_id: i64, quantity: i64, unit_price: MinorUnits) -> Self {
        Self { product_id, variant_id: None, quantity, unit_price }
    }

    pub fn with_variant(mut self, variant_id: i64) -> Self {
        self.variant_id = Some(variant_id);
        self
    }
}

//--------------------------------------        Address        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Address {
    pub id: i64,
    pub user_id: String,
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
    /// Set when the address was derived from a payment's billing details
    pub source_payment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub user_id: String,
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl NewAddress {
    pub fn new(user_id: &str, line1: &str, city: &str, postal_code: &str, country: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            recipient: String::default(),
            line1: line1.to_string(),
            line2: None,
            city: city.to_string(),
            region: None,
            postal_code: postal_code.to_string(),
            country: country.to_string(),
            phone: None,
        }
    }

    pub fn with_recipient(mut self, recipient: &str) -> Self {
        self.recipient = recipient.to_string();
        self
    }

    /// An address can be shipped to if the street, city, postal code and country are all present.
    pub fn is_usable(&self) -> bool {
        [&self.line1, &self.city, &self.postal_code, &self.country].iter().all(|s| !s.trim().is_empty())
    }
}

//--------------------------------------        Coupon         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// `discount_value` is a whole percentage, 0 - 100
    Percentage,
    /// `discount_value` is an amount in minor units
    Fixed,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub times_used: i64,
}

impl Coupon {
    /// The discount this coupon grants on `amount`. Percentages round down. The discount never exceeds the amount.
    pub fn discount_on(&self, amount: MinorUnits) -> MinorUnits {
        let discount = match self.discount_type {
            DiscountType::Percentage => {
                let discount = i128::from(amount.value()) * i128::from(self.discount_value.clamp(0, 100)) / 100;
                // Bounded by the amount, so the conversion cannot fail
                i64::try_from(discount).unwrap_or(0)
            },
            DiscountType::Fixed => self.discount_value.max(0),
        };
        MinorUnits::from(discount.min(amount.value().max(0)))
    }

    /// Applies the coupon to `amount`, returning the discounted total.
    pub fn apply(&self, amount: MinorUnits) -> MinorUnits {
        amount.saturating_discount(self.discount_on(amount))
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    /// Unique. There is at most one order per payment.
    pub payment_id: i64,
    pub shipping_address_id: i64,
    pub coupon_id: Option<i64>,
    pub total: MinorUnits,
    pub currency: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub variant_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: MinorUnits,
    pub subtotal: MinorUnits,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
/// The inputs of the atomic order-creation operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub payment_id: i64,
    pub shipping_address_id: i64,
    pub coupon_id: Option<i64>,
    /// The status the order moves to straight after creation (orders are always born `pending`)
    pub initial_status: OrderStatusType,
    /// The provider status that triggered the creation, recorded in the status history
    pub provider_status: Option<PaymentStatus>,
}

impl NewOrder {
    pub fn new(payment_id: i64, shipping_address_id: i64) -> Self {
        Self {
            payment_id,
            shipping_address_id,
            coupon_id: None,
            initial_status: OrderStatusType::Pending,
            provider_status: None,
        }
    }

    pub fn with_coupon(mut self, coupon_id: Option<i64>) -> Self {
        self.coupon_id = coupon_id;
        self
    }

    pub fn with_initial_status(mut self, status: OrderStatusType, provider_status: Option<PaymentStatus>) -> Self {
        self.initial_status = status;
        self.provider_status = provider_status;
        self
    }
}

//--------------------------------------   OrderStatusChange   ---------------------------------------------------------
/// One entry in the audit trail of an order's status.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderStatusChange {
    pub id: i64,
    pub order_id: i64,
    /// `None` for the entry written when the order is created
    pub old_status: Option<OrderStatusType>,
    pub new_status: OrderStatusType,
    /// `None` for manual transitions
    pub provider_status: Option<PaymentStatus>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub stock: i64,
    pub low_stock_threshold: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct LowStockProduct {
    pub product_id: i64,
    pub product_name: String,
    pub current_stock: i64,
    pub threshold: i64,
}
