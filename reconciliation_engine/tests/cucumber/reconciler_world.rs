use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use cucumber::World;
use log::*;
use reconciliation_engine::{
    db_types::{MinorUnits, OrderStatusType},
    events::{EventHandlers, EventHooks, NotificationError, NotificationService},
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    Outcome,
    ReconciliationApi,
    SqliteDatabase,
};
use tokio::{task::JoinHandle, time::sleep};

#[derive(Default, Debug, World)]
pub struct ReconcilerWorld {
    pub system: Option<ReconciliationSystem>,
    pub last_outcome: Option<Outcome>,
}

#[derive(Debug)]
pub struct ReconciliationSystem {
    pub db_path: String,
    pub api: ReconciliationApi<SqliteDatabase>,
    pub notifier: Arc<RecordingNotifier>,
    pub handlers: Vec<JoinHandle<()>>,
}

impl ReconcilerWorld {
    pub fn system(&self) -> &ReconciliationSystem {
        self.system.as_ref().expect("ReconciliationSystem not initialised")
    }

    pub fn api(&self) -> &ReconciliationApi<SqliteDatabase> {
        &self.system().api
    }

    pub fn outcome(&self) -> &Outcome {
        self.last_outcome.as_ref().expect("No notification has been reconciled yet")
    }
}

impl ReconciliationSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        create_database(&url).await;
        let db = run_migrations(&url).await;
        debug!("🚀️ Created database: {url}");
        let notifier = Arc::new(RecordingNotifier::default());
        let mut hooks = EventHooks::default();
        hooks.with_notifier(Arc::clone(&notifier));
        let handlers = EventHandlers::new(16, hooks);
        let api = ReconciliationApi::new(db, handlers.producers());
        let handlers = handlers.start_handlers();
        Self { db_path: url, api, notifier, handlers }
    }
}

/// Remembers every notification it is asked to send, in a compact text form.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn record(&self, message: String) {
        self.sent.lock().expect("notifier lock poisoned").push(message);
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        self.sent.lock().expect("notifier lock poisoned").iter().filter(|m| m.starts_with(prefix)).count()
    }

    /// Notifications are delivered asynchronously. Waits briefly for `expected` matching notifications to arrive and
    /// returns the final count.
    pub async fn wait_for(&self, prefix: &str, expected: usize) -> usize {
        for _ in 0..50 {
            if self.count_matching(prefix) >= expected {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        // Give stragglers a moment, so that too many notifications are caught as well
        sleep(Duration::from_millis(50)).await;
        self.count_matching(prefix)
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn notify_new_order(
        &self,
        order_id: i64,
        customer_label: &str,
        total: MinorUnits,
    ) -> Result<(), NotificationError> {
        self.record(format!("new_order {order_id} {customer_label} {}", total.value()));
        Ok(())
    }

    async fn notify_order_status_change(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
    ) -> Result<(), NotificationError> {
        self.record(format!("status_change {new_status} {order_id}"));
        Ok(())
    }

    async fn notify_low_stock(
        &self,
        product_id: i64,
        product_name: &str,
        current_stock: i64,
        threshold: i64,
    ) -> Result<(), NotificationError> {
        self.record(format!("low_stock {product_name} {current_stock} {threshold} #{product_id}"));
        Ok(())
    }
}
