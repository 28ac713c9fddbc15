use cucumber::given;
use reconciliation_engine::{
    db_types::{MinorUnits, NewAddress, NewPayment, NewPaymentItem},
    status::TransitionPolicy,
    test_utils::seed,
    ReconcilerOptions,
};

use crate::cucumber::{reconciler_world::ReconciliationSystem, ReconcilerWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut ReconcilerWorld) {
    let system = ReconciliationSystem::new().await;
    world.system = Some(system);
}

#[given("late approvals may reactivate cancelled orders")]
async fn allow_reactivation(world: &mut ReconcilerWorld) {
    let system = world.system.take().expect("ReconciliationSystem not initialised");
    let options = ReconcilerOptions { transition_policy: TransitionPolicy::new(true), ..Default::default() };
    let api = system.api.with_options(options);
    world.system = Some(ReconciliationSystem { api, ..system });
}

#[given(expr = "a payment [{word}] from '{word}' for {int} with a billing address")]
async fn payment_with_billing(world: &mut ReconcilerWorld, txid: String, user: String, amount: i64) {
    let payment = NewPayment::new(txid.as_str(), user.as_str(), MinorUnits::from(amount))
        .with_customer("Alice Customer", "alice@example.com")
        .with_billing_address(seed::billing_address(&user));
    seed::insert_payment(world.api().db(), payment).await;
}

#[given(expr = "a payment [{word}] from '{word}' for {int} without an address")]
async fn payment_without_address(world: &mut ReconcilerWorld, txid: String, user: String, amount: i64) {
    let payment = NewPayment::new(txid.as_str(), user.as_str(), MinorUnits::from(amount));
    seed::insert_payment(world.api().db(), payment).await;
}

#[given(expr = "'{word}' has a default address")]
async fn default_address(world: &mut ReconcilerWorld, user: String) {
    let address = NewAddress::new(&user, "9 Profile Rd", "Shelbyville", "54321", "US");
    seed::insert_address(world.api().db(), address, true).await;
}

#[given(expr = "a product '{word}' with {int} in stock")]
async fn product(world: &mut ReconcilerWorld, name: String, stock: i64) {
    seed::insert_product(world.api().db(), &name, stock, None).await;
}

#[given(expr = "a payment [{word}] from '{word}' for {int} units of product #{int}")]
async fn payment_for_product(world: &mut ReconcilerWorld, txid: String, user: String, quantity: i64, product_id: i64) {
    let payment = NewPayment::new(txid.as_str(), user.as_str(), MinorUnits::from(quantity * 1_000))
        .with_billing_address(seed::billing_address(&user))
        .with_item(NewPaymentItem::new(product_id, quantity, MinorUnits::from(1_000)));
    seed::insert_payment(world.api().db(), payment).await;
}
