use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::*;
use mockall::mock;
use reconciliation_engine::{
    db_types::*,
    events::{EventHandlers, EventHooks, NotificationError, NotificationService},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed,
    },
    OutcomeKind,
    ReconciliationApi,
    ReconciliationDatabase,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::task::JoinHandle;

mock! {
    pub Notifier {}

    #[async_trait]
    impl NotificationService for Notifier {
        async fn notify_new_order(
            &self,
            order_id: i64,
            customer_label: &str,
            total: MinorUnits,
        ) -> Result<(), NotificationError>;

        async fn notify_order_status_change(
            &self,
            order_id: i64,
            new_status: OrderStatusType,
        ) -> Result<(), NotificationError>;

        async fn notify_low_stock(
            &self,
            product_id: i64,
            product_name: &str,
            current_stock: i64,
            threshold: i64,
        ) -> Result<(), NotificationError>;
    }
}

type Calls<T> = Arc<Mutex<Vec<T>>>;

struct Harness {
    api: ReconciliationApi<SqliteDatabase>,
    handlers: Vec<JoinHandle<()>>,
    db: SqliteDatabase,
}

impl Harness {
    async fn new(notifier: MockNotifier) -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let mut hooks = EventHooks::default();
        hooks.with_notifier(Arc::new(notifier));
        let handlers = EventHandlers::new(16, hooks);
        let api = ReconciliationApi::new(db.clone(), handlers.producers());
        let handlers = handlers.start_handlers();
        Self { api, handlers, db }
    }

    /// Drops the API so that the event channels close, then waits for every queued notification to be delivered.
    async fn finish(self) {
        let Harness { api, handlers, mut db } = self;
        drop(api);
        for handle in handlers {
            handle.await.expect("event handler panicked");
        }
        if let Err(e) = db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        Sqlite::drop_database(db.url()).await.unwrap();
    }
}

async fn seed_payment(db: &SqliteDatabase, txid: &str, items: &[(i64, i64)]) {
    let mut payment = NewPayment::new(txid, "alice", MinorUnits::from(150_000))
        .with_customer("Alice Customer", "alice@example.com")
        .with_billing_address(seed::billing_address("alice"));
    for (product_id, quantity) in items {
        payment = payment.with_item(NewPaymentItem::new(*product_id, *quantity, MinorUnits::from(100)));
    }
    seed::insert_payment(db, payment).await;
}

#[tokio::test]
async fn new_order_and_status_change_notifications() {
    let new_orders: Calls<(i64, String, MinorUnits)> = Arc::default();
    let status_changes: Calls<(i64, OrderStatusType)> = Arc::default();
    let mut notifier = MockNotifier::new();
    let calls = new_orders.clone();
    notifier.expect_notify_new_order().times(1).returning(move |id, label, total| {
        calls.lock().unwrap().push((id, label.to_string(), total));
        Ok(())
    });
    let calls = status_changes.clone();
    notifier.expect_notify_order_status_change().times(1).returning(move |id, status| {
        calls.lock().unwrap().push((id, status));
        Ok(())
    });
    notifier.expect_notify_low_stock().never();

    let harness = Harness::new(notifier).await;
    seed_payment(&harness.db, "tx-abc", &[]).await;
    let api = &harness.api;
    let order_id = api.reconcile("tx-abc", PaymentStatus::Approved).await.order_id.unwrap();
    // Replays do not notify
    api.reconcile("tx-abc", PaymentStatus::Approved).await;
    let outcome = api.reconcile("tx-abc", PaymentStatus::Declined).await;
    assert_eq!(outcome.kind, OutcomeKind::StatusChanged);
    api.reconcile("tx-abc", PaymentStatus::Declined).await;
    harness.finish().await;

    assert_eq!(*new_orders.lock().unwrap(), vec![(order_id, "Alice Customer".to_string(), MinorUnits::from(150_000))]);
    assert_eq!(*status_changes.lock().unwrap(), vec![(order_id, OrderStatusType::Cancelled)]);
}

#[tokio::test]
async fn low_stock_notifications() {
    let low_stock: Calls<(i64, String, i64, i64)> = Arc::default();
    let mut notifier = MockNotifier::new();
    notifier.expect_notify_new_order().times(1).returning(|_, _, _| Ok(()));
    let calls = low_stock.clone();
    notifier.expect_notify_low_stock().times(2).returning(move |id, name, stock, threshold| {
        calls.lock().unwrap().push((id, name.to_string(), stock, threshold));
        Ok(())
    });

    let harness = Harness::new(notifier).await;
    let db = harness.db.clone();
    // Falls to 3, below the default threshold of 5
    let mug = seed::insert_product(&db, "Mug", 5, None).await;
    // Plenty left
    let shirt = seed::insert_product(&db, "Shirt", 100, None).await;
    // Falls to exactly its own threshold
    let cap = seed::insert_product(&db, "Cap", 10, Some(9)).await;
    seed_payment(&db, "tx-stock", &[(mug, 2), (shirt, 1), (cap, 1)]).await;

    let outcome = harness.api.reconcile("tx-stock", PaymentStatus::Approved).await;
    assert_eq!(outcome.kind, OutcomeKind::OrderCreated);
    harness.finish().await;

    let mut calls = low_stock.lock().unwrap().clone();
    calls.sort();
    assert_eq!(calls, vec![(mug, "Mug".to_string(), 3, 5), (cap, "Cap".to_string(), 9, 9)]);
}

#[tokio::test]
async fn failing_notifier_does_not_affect_the_outcome() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify_new_order()
        .times(1)
        .returning(|_, _, _| Err(NotificationError::Unavailable("smtp is down".into())));
    notifier
        .expect_notify_order_status_change()
        .times(1)
        .returning(|_, _| Err(NotificationError::Rejected("no recipients".into())));

    let harness = Harness::new(notifier).await;
    seed_payment(&harness.db, "tx-fail", &[]).await;
    let outcome = harness.api.reconcile("tx-fail", PaymentStatus::Approved).await;
    assert!(outcome.success, "{outcome}");
    assert_eq!(outcome.kind, OutcomeKind::OrderCreated);
    let outcome = harness.api.reconcile("tx-fail", PaymentStatus::Voided).await;
    assert!(outcome.success, "{outcome}");
    assert_eq!(outcome.kind, OutcomeKind::StatusChanged);
    harness.finish().await;
}

#[tokio::test]
async fn manual_updates_notify() {
    let status_changes: Calls<(i64, OrderStatusType)> = Arc::default();
    let mut notifier = MockNotifier::new();
    notifier.expect_notify_new_order().returning(|_, _, _| Ok(()));
    let calls = status_changes.clone();
    notifier.expect_notify_order_status_change().times(2).returning(move |id, status| {
        calls.lock().unwrap().push((id, status));
        Ok(())
    });

    let harness = Harness::new(notifier).await;
    seed_payment(&harness.db, "tx-manual", &[]).await;
    let order_id = harness.api.reconcile("tx-manual", PaymentStatus::Approved).await.order_id.unwrap();
    harness.api.update_order_status(order_id, OrderStatusType::Confirmed).await.unwrap();
    harness.api.update_order_status(order_id, OrderStatusType::Confirmed).await.unwrap();
    harness.api.update_order_status(order_id, OrderStatusType::Shipped).await.unwrap();
    harness.finish().await;

    // Each event is delivered in its own job, so arrival order is not guaranteed
    let calls = status_changes.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert!(calls.contains(&(order_id, OrderStatusType::Confirmed)));
    assert!(calls.contains(&(order_id, OrderStatusType::Shipped)));
}
