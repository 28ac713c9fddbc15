use cucumber::{then, when};
use reconciliation_engine::{
    db_types::{OrderStatusType, PaymentStatus},
    OrderManagement,
    OutcomeKind,
    PaymentManagement,
    WebhookEvent,
};

use crate::cucumber::ReconcilerWorld;

fn parse_kind(kind: &str) -> OutcomeKind {
    serde_json::from_value(serde_json::Value::String(kind.to_string())).expect("Not a valid outcome kind")
}

#[when(expr = "the provider reports [{word}] as {word}")]
async fn provider_reports(world: &mut ReconcilerWorld, txid: String, status: String) {
    let status = status.parse::<PaymentStatus>().expect("Not a valid payment status");
    let outcome = world.api().reconcile(&txid, status).await;
    world.last_outcome = Some(outcome);
}

#[when(expr = "the webhook {string} arrives")]
async fn webhook_arrives(world: &mut ReconcilerWorld, body: String) {
    let outcome = match WebhookEvent::from_json(&body) {
        Ok(event) => world.api().handle_webhook(event).await,
        Err(e) => e.into(),
    };
    world.last_outcome = Some(outcome);
}

#[when(expr = "the order for [{word}] is marked as {word}")]
async fn manual_update(world: &mut ReconcilerWorld, txid: String, status: String) {
    let status = status.parse::<OrderStatusType>().expect("Not a valid order status");
    let payment = world.api().db().fetch_payment_by_txid(&txid).await.unwrap().expect("payment missing");
    let order_id = payment.order_id.expect("payment has no order");
    world.api().update_order_status(order_id, status).await.expect("Error updating order status");
}

#[then(expr = "the outcome is successful with kind {word}")]
async fn outcome_succeeds(world: &mut ReconcilerWorld, kind: String) {
    let outcome = world.outcome();
    assert!(outcome.success, "Expected success, got {outcome}");
    assert_eq!(outcome.kind, parse_kind(&kind));
}

#[then(expr = "the outcome fails with kind {word}")]
async fn outcome_fails(world: &mut ReconcilerWorld, kind: String) {
    let outcome = world.outcome();
    assert!(!outcome.success, "Expected failure, got {outcome}");
    assert_eq!(outcome.kind, parse_kind(&kind));
}

#[then(expr = "the order for [{word}] has status {word}")]
async fn order_status(world: &mut ReconcilerWorld, txid: String, status: String) {
    let status = status.parse::<OrderStatusType>().expect("Not a valid order status");
    let db = world.api().db();
    let payment = db.fetch_payment_by_txid(&txid).await.unwrap().expect("payment missing");
    let order = db.fetch_order_for_payment(payment.id).await.unwrap().expect("order missing");
    assert_eq!(order.status, status);
}

#[then(expr = "the order for [{word}] has a total of {int}")]
async fn order_total(world: &mut ReconcilerWorld, txid: String, total: i64) {
    let db = world.api().db();
    let payment = db.fetch_payment_by_txid(&txid).await.unwrap().expect("payment missing");
    let order = db.fetch_order_for_payment(payment.id).await.unwrap().expect("order missing");
    assert_eq!(order.total.value(), total);
}

#[then(regex = r"^there (?:is|are) (\d+) orders? for \[(\S+)\]$")]
async fn order_count(world: &mut ReconcilerWorld, count: i64, txid: String) {
    let db = world.api().db();
    let payment = db.fetch_payment_by_txid(&txid).await.unwrap().expect("payment missing");
    assert_eq!(db.count_orders_for_payment(payment.id).await.unwrap(), count);
}

#[then(expr = "{int} new order notification(s) is/are sent")]
async fn new_order_notifications(world: &mut ReconcilerWorld, count: usize) {
    let sent = world.system().notifier.wait_for("new_order", count).await;
    assert_eq!(sent, count);
}

#[then(expr = "{int} status change notification(s) to {word} is/are sent")]
async fn status_notifications(world: &mut ReconcilerWorld, count: usize, status: String) {
    let prefix = format!("status_change {status} ");
    let sent = world.system().notifier.wait_for(&prefix, count).await;
    assert_eq!(sent, count);
}

#[then(expr = "a low stock notification is sent for '{word}' with {int} left")]
async fn low_stock_notification(world: &mut ReconcilerWorld, name: String, stock: i64) {
    let prefix = format!("low_stock {name} {stock} ");
    let sent = world.system().notifier.wait_for(&prefix, 1).await;
    assert_eq!(sent, 1, "Expected one low stock notification for {name} with {stock} left");
}

#[then(expr = "no low stock notification is sent for '{word}'")]
async fn no_low_stock_notification(world: &mut ReconcilerWorld, name: String) {
    let sent = world.system().notifier.wait_for(&format!("low_stock {name} "), 1).await;
    assert_eq!(sent, 0);
}
