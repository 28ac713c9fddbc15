use clap::Parser;
use dotenvy::dotenv;
use log::*;

mod cli;
mod commands;
mod config;

use cli::{Arguments, Command};
use config::ReconcilerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();
    let args = Arguments::parse();
    let config = ReconcilerConfig::from_env_or_default();
    debug!("🚀️ Running {:?} against {}", args.command, config.database_url);
    match args.command {
        Command::Migrate => commands::migrate(&config).await,
        Command::Reconcile(params) => {
            let outcome = commands::reconcile(&config, &params.txid, params.status).await?;
            if !outcome.success {
                std::process::exit(1);
            }
            Ok(())
        },
        Command::Replay(params) => commands::replay(&config, &params.file).await.map(|_| ()),
        Command::Order(params) => commands::print_order(&config, params.order_id).await,
    }
}
