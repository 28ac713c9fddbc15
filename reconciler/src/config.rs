use std::{env, fmt::Display, str::FromStr};

use log::*;
use recon_common::helpers::parse_boolean_flag;
use reconciliation_engine::{status::TransitionPolicy, ReconcilerOptions, DEFAULT_LOW_STOCK_THRESHOLD};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/reconciler.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// The capacity of each notification channel. Notifications that do not fit are dropped.
    pub event_buffer_size: usize,
    /// Used for products that do not define their own low-stock threshold
    pub low_stock_threshold: i64,
    /// If true, a late approval moves a cancelled order back to `paid`
    pub allow_reactivation: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            allow_reactivation: false,
        }
    }
}

impl ReconcilerConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup. Missing or invalid values fall back to the defaults.
    pub fn from_vars<F>(var: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let database_url = var("RECON_DATABASE_URL").unwrap_or_else(|| {
            info!("🪛️ RECON_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = parse_or_default(&var, "RECON_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let event_buffer_size = parse_or_default(&var, "RECON_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        let mut low_stock_threshold =
            parse_or_default(&var, "RECON_LOW_STOCK_THRESHOLD", DEFAULT_LOW_STOCK_THRESHOLD);
        if low_stock_threshold < 0 {
            warn!(
                "🪛️ RECON_LOW_STOCK_THRESHOLD cannot be negative. Using the default, {DEFAULT_LOW_STOCK_THRESHOLD}."
            );
            low_stock_threshold = DEFAULT_LOW_STOCK_THRESHOLD;
        }
        let allow_reactivation = parse_boolean_flag(var("RECON_ALLOW_REACTIVATION"), false);
        if allow_reactivation {
            info!("🪛️ Late approvals will reactivate cancelled orders");
        }
        Self { database_url, max_connections, event_buffer_size, low_stock_threshold, allow_reactivation }
    }

    pub fn options(&self) -> ReconcilerOptions {
        ReconcilerOptions {
            low_stock_threshold: self.low_stock_threshold,
            transition_policy: TransitionPolicy::new(self.allow_reactivation),
        }
    }
}

fn parse_or_default<F, T>(var: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match var(name) {
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> ReconcilerConfig {
        let vars = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>();
        ReconcilerConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        assert_eq!(config_from(&[]), ReconcilerConfig::default());
    }

    #[test]
    fn overrides() {
        let config = config_from(&[
            ("RECON_DATABASE_URL", "sqlite://tmp/recon.db"),
            ("RECON_DB_MAX_CONNECTIONS", "3"),
            ("RECON_EVENT_BUFFER_SIZE", "8"),
            ("RECON_LOW_STOCK_THRESHOLD", "2"),
            ("RECON_ALLOW_REACTIVATION", "true"),
        ]);
        assert_eq!(config.database_url, "sqlite://tmp/recon.db");
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.event_buffer_size, 8);
        assert_eq!(config.options().low_stock_threshold, 2);
        assert!(config.options().transition_policy.allow_reactivation);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_from(&[
            ("RECON_DB_MAX_CONNECTIONS", "lots"),
            ("RECON_LOW_STOCK_THRESHOLD", "-4"),
            ("RECON_ALLOW_REACTIVATION", "perhaps"),
        ]);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.low_stock_threshold, DEFAULT_LOW_STOCK_THRESHOLD);
        assert!(!config.allow_reactivation);
    }
}
