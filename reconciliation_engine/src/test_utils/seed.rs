//! Fixture helpers. These write directly to the tables that the catalog, checkout and profile services own in
//! production.
use crate::{
    db::sqlite::{addresses, coupons, products},
    db_types::{DiscountType, NewAddress, NewPayment, Product},
    traits::PaymentManagement,
    SqliteDatabase,
};

pub async fn insert_product(db: &SqliteDatabase, name: &str, stock: i64, low_stock_threshold: Option<i64>) -> i64 {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    products::insert_product(name, stock, low_stock_threshold, &mut conn).await.expect("Error inserting product")
}

pub async fn fetch_product(db: &SqliteDatabase, id: i64) -> Product {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    products::fetch_product(id, &mut conn).await.expect("Error fetching product").expect("Product does not exist")
}

pub async fn insert_coupon(db: &SqliteDatabase, code: &str, discount_type: DiscountType, value: i64) -> i64 {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    coupons::insert_coupon(code, discount_type, value, &mut conn).await.expect("Error inserting coupon")
}

pub async fn insert_address(db: &SqliteDatabase, address: NewAddress, is_default: bool) -> i64 {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    addresses::insert_address(address, is_default, &mut conn).await.expect("Error inserting address")
}

pub async fn insert_payment(db: &SqliteDatabase, payment: NewPayment) -> i64 {
    db.insert_payment(payment).await.expect("Error inserting payment").id()
}

/// A billing address that passes validation.
pub fn billing_address(user_id: &str) -> NewAddress {
    NewAddress::new(user_id, "1 Main St", "Springfield", "12345", "US").with_recipient("Alice Customer")
}
