use std::{path::Path, sync::Arc};

use anyhow::{anyhow, Context, Result};
use log::*;
use reconciliation_engine::{
    db_types::PaymentStatus,
    events::{EventHandlers, EventHooks, LogNotifier},
    OrderManagement,
    Outcome,
    ReconciliationApi,
    ReconciliationDatabase,
    SqliteDatabase,
    WebhookEvent,
};
use serde::Serialize;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::task::JoinHandle;

use crate::config::ReconcilerConfig;

/// A running engine: the API plus the event handlers that deliver its notifications.
pub struct Engine {
    api: ReconciliationApi<SqliteDatabase>,
    handlers: Vec<JoinHandle<()>>,
}

impl Engine {
    pub async fn start(config: &ReconcilerConfig) -> Result<Self> {
        let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
            .await
            .with_context(|| format!("Could not open the database at {}", config.database_url))?;
        let mut hooks = EventHooks::default();
        hooks.with_notifier(Arc::new(LogNotifier));
        let handlers = EventHandlers::new(config.event_buffer_size, hooks);
        let api = ReconciliationApi::new(db, handlers.producers()).with_options(config.options());
        let handlers = handlers.start_handlers();
        Ok(Self { api, handlers })
    }

    pub fn api(&self) -> &ReconciliationApi<SqliteDatabase> {
        &self.api
    }

    /// Waits for queued notifications to be delivered, then closes the database.
    pub async fn shutdown(self) -> Result<()> {
        let Engine { api, handlers } = self;
        let mut db = api.db().clone();
        drop(api);
        for handle in handlers {
            if let Err(e) = handle.await {
                warn!("📬️ An event handler did not shut down cleanly. {e}");
            }
        }
        db.close().await?;
        Ok(())
    }
}

pub async fn migrate(config: &ReconcilerConfig) -> Result<()> {
    let url = config.database_url.as_str();
    if !Sqlite::database_exists(url).await? {
        info!("🗃️ Creating database {url}");
        Sqlite::create_database(url).await?;
    }
    let mut db = SqliteDatabase::new_with_url(url, 1).await?;
    db.run_migrations().await?;
    db.close().await?;
    println!("Migrations complete for {url}");
    Ok(())
}

pub async fn reconcile(config: &ReconcilerConfig, txid: &str, status: PaymentStatus) -> Result<Outcome> {
    let engine = Engine::start(config).await?;
    let outcome = engine.api().reconcile(txid, status).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    engine.shutdown().await?;
    Ok(outcome)
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ReplaySummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub malformed: usize,
}

/// Reconciles every line of `path` in order. Blank lines are skipped; lines that are not valid webhook bodies count
/// as malformed.
pub async fn replay(config: &ReconcilerConfig, path: &Path) -> Result<ReplaySummary> {
    let contents = tokio::fs::read_to_string(path).await.with_context(|| format!("Could not read {}", path.display()))?;
    let engine = Engine::start(config).await?;
    let mut summary = ReplaySummary::default();
    for (n, line) in contents.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
        summary.processed += 1;
        let outcome = match WebhookEvent::from_json(line) {
            Ok(event) => engine.api().handle_webhook(event).await,
            Err(e) => Outcome::from(e),
        };
        if outcome.is_malformed_request() {
            summary.malformed += 1;
        } else if outcome.success {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
        }
        println!("{}: {}", n + 1, serde_json::to_string(&outcome)?);
    }
    engine.shutdown().await?;
    info!("🔄️ Replay of {} complete. {summary:?}", path.display());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary)
}

pub async fn print_order(config: &ReconcilerConfig, order_id: i64) -> Result<()> {
    let mut db = SqliteDatabase::new_with_url(&config.database_url, 1).await?;
    let order = db.fetch_order_with_items(order_id).await?.ok_or_else(|| anyhow!("Order #{order_id} does not exist"))?;
    let history = db.fetch_status_history(order_id).await?;
    let report = serde_json::json!({ "order": order, "history": history });
    println!("{}", serde_json::to_string_pretty(&report)?);
    db.close().await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use reconciliation_engine::{
        db_types::{MinorUnits, NewAddress, NewPayment},
        OrderManagement,
        OutcomeKind,
        PaymentManagement,
    };

    use super::*;

    async fn test_config(dir: &tempfile::TempDir) -> ReconcilerConfig {
        let url = format!("sqlite://{}", dir.path().join("reconciler.db").display());
        let config = ReconcilerConfig { database_url: url, ..Default::default() };
        migrate(&config).await.unwrap();
        config
    }

    async fn seed_payment(config: &ReconcilerConfig, txid: &str) -> i64 {
        let db = SqliteDatabase::new_with_url(&config.database_url, 1).await.unwrap();
        let address = NewAddress::new("alice", "1 Main St", "Springfield", "12345", "US");
        let payment = NewPayment::new(txid, "alice", MinorUnits::from(2_000)).with_billing_address(address);
        db.insert_payment(payment).await.unwrap().id()
    }

    #[tokio::test]
    async fn reconcile_creates_an_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir).await;
        let payment_id = seed_payment(&config, "tx-cli").await;
        let outcome = reconcile(&config, "tx-cli", PaymentStatus::Approved).await.unwrap();
        assert_eq!(outcome.kind, OutcomeKind::OrderCreated);
        let db = SqliteDatabase::new_with_url(&config.database_url, 1).await.unwrap();
        assert_eq!(db.count_orders_for_payment(payment_id).await.unwrap(), 1);
        print_order(&config, outcome.order_id.unwrap()).await.unwrap();
        assert!(print_order(&config, 999).await.is_err());
    }

    #[tokio::test]
    async fn replay_a_webhook_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir).await;
        seed_payment(&config, "tx-1").await;
        seed_payment(&config, "tx-2").await;
        let mut file = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        writeln!(file, r#"{{"transactionId": "tx-1", "paymentStatus": "PENDING"}}"#).unwrap();
        writeln!(file, r#"{{"transactionId": "tx-1", "paymentStatus": "APPROVED"}}"#).unwrap();
        writeln!(file, r#"{{"transactionId": "tx-1", "paymentStatus": "APPROVED"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"transactionId": "tx-2", "paymentStatus": "DECLINED"}}"#).unwrap();
        writeln!(file, r#"{{"transactionId": "tx-3", "paymentStatus": "APPROVED"}}"#).unwrap();
        writeln!(file, r#"{{"transactionId": "tx-1", "paymentStatus": "REFUNDED"}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();

        let summary = replay(&config, file.path()).await.unwrap();
        assert_eq!(summary, ReplaySummary { processed: 7, succeeded: 4, failed: 1, malformed: 2 });
        let db = SqliteDatabase::new_with_url(&config.database_url, 1).await.unwrap();
        let payment = db.fetch_payment_by_txid("tx-2").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Declined);
        assert_eq!(payment.order_id, None);
    }
}
