use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};
use reconciliation_engine::db_types::PaymentStatus;

#[derive(Parser, Debug)]
#[command(version, about = "Reconciles payment provider notifications with orders")]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Command,
}

/// All commands read their configuration from `RECON_*` environment variables, or a `.env` file.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the database if necessary and run the migrations.
    Migrate,
    /// Reconcile a single payment notification.
    Reconcile(ReconcileParams),
    /// Reconcile every webhook body in a file, one JSON object per line.
    Replay(ReplayParams),
    /// Print an order, its items and its status history.
    Order(OrderParams),
}

#[derive(Debug, Args)]
pub struct ReconcileParams {
    /// The provider's transaction id
    #[arg(short = 't', long = "txid")]
    pub txid: String,
    /// The payment status reported by the provider: PENDING, APPROVED, DECLINED, VOIDED or ERROR
    #[arg(short = 's', long = "status", value_parser = PaymentStatus::from_str)]
    pub status: PaymentStatus,
}

#[derive(Debug, Args)]
pub struct ReplayParams {
    /// A file of webhook bodies, e.g. `{"transactionId": "tx-abc", "paymentStatus": "APPROVED"}`, one per line
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct OrderParams {
    pub order_id: i64,
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_reconcile() {
        let args = Arguments::parse_from(["reconciler", "reconcile", "--txid", "tx-abc", "--status", "approved"]);
        match args.command {
            Command::Reconcile(p) => {
                assert_eq!(p.txid, "tx-abc");
                assert_eq!(p.status, PaymentStatus::Approved);
            },
            other => panic!("Unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = Arguments::try_parse_from(["reconciler", "reconcile", "-t", "tx", "-s", "REFUNDED"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(Arguments::try_parse_from(["reconciler", "reconcile", "-t", "tx", "-s", ""]).is_err());
    }

    #[test]
    fn parse_replay_and_order() {
        let args = Arguments::parse_from(["reconciler", "replay", "webhooks.jsonl"]);
        assert!(matches!(args.command, Command::Replay(p) if p.file == PathBuf::from("webhooks.jsonl")));
        let args = Arguments::parse_from(["reconciler", "order", "7"]);
        assert!(matches!(args.command, Command::Order(OrderParams { order_id: 7 })));
    }
}
