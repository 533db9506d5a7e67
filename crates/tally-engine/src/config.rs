//! # Engine Configuration
//!
//! Settings loaded once at startup.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`TALLY_*`)
//! 2. Defaults (this file)
//!
//! ## Environment Variables
//! ```text
//! ┌──────────────────────────────┬───────────────────────┬──────────────┐
//! │ Variable                     │ Field                 │ Default      │
//! ├──────────────────────────────┼───────────────────────┼──────────────┤
//! │ TALLY_STORE_BACKEND          │ store_backend         │ sqlite       │
//! │ TALLY_DB_PATH                │ database_path         │ ./tally.db   │
//! │ TALLY_SUPER_ADMIN_EMAIL      │ super_admin_email     │ (empty)      │
//! │ TALLY_BATCH_BUDGET           │ batch_budget          │ 450          │
//! │ TALLY_LEDGER_MAX_RETRIES     │ ledger_max_retries    │ 5            │
//! │ TALLY_CURRENCY_SYMBOL        │ currency_symbol       │ ₦            │
//! │ TALLY_TRASH_LIMIT            │ trash_limit           │ 50           │
//! └──────────────────────────────┴───────────────────────┴──────────────┘
//! ```
//!
//! Configuration is read-only after initialization, so no lock is needed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tally_core::money::DEFAULT_CURRENCY_SYMBOL;
use tally_core::{Money, DEFAULT_BATCH_BUDGET, MAX_BATCH_WRITES, TRASH_LISTING_LIMIT};
use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Which document store backs the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, lost on exit. Tests and demos.
    Memory,
    /// SQLite file through sqlx.
    #[default]
    Sqlite,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "sqlite" | "sql" | "file" => Ok(StoreBackend::Sqlite),
            other => Err(EngineError::validation(format!(
                "Unknown store backend: '{}'. Valid options: memory, sqlite",
                other
            ))),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub store_backend: StoreBackend,

    /// SQLite file, ignored by the memory backend.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Email that always resolves to the super admin role.
    #[serde(default)]
    pub super_admin_email: String,

    /// Writes per atomic batch for bulk operations.
    /// Never above the store's hard limit of 500.
    #[serde(default = "default_batch_budget")]
    pub batch_budget: usize,

    /// Compare-and-swap attempts per ledger posting.
    #[serde(default = "default_ledger_max_retries")]
    pub ledger_max_retries: u32,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// Items returned by one trash listing.
    #[serde(default = "default_trash_limit")]
    pub trash_limit: usize,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./tally.db")
}

fn default_batch_budget() -> usize {
    DEFAULT_BATCH_BUDGET
}

fn default_ledger_max_retries() -> u32 {
    5
}

fn default_currency_symbol() -> String {
    DEFAULT_CURRENCY_SYMBOL.to_string()
}

fn default_trash_limit() -> usize {
    TRASH_LISTING_LIMIT
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            store_backend: StoreBackend::default(),
            database_path: default_database_path(),
            super_admin_email: String::new(),
            batch_budget: default_batch_budget(),
            ledger_max_retries: default_ledger_max_retries(),
            currency_symbol: default_currency_symbol(),
            trash_limit: default_trash_limit(),
        }
    }
}

impl EngineConfig {
    /// In-memory configuration with the given super admin. Used by tests.
    pub fn in_memory(super_admin_email: impl Into<String>) -> Self {
        EngineConfig {
            store_backend: StoreBackend::Memory,
            super_admin_email: super_admin_email.into(),
            ..Default::default()
        }
    }

    /// Creates a config from environment variables and defaults.
    ///
    /// Unparseable numeric values are ignored with a warning and the
    /// default is kept.
    pub fn from_env() -> Self {
        let mut config = EngineConfig::default();

        if let Ok(backend) = std::env::var("TALLY_STORE_BACKEND") {
            match backend.parse() {
                Ok(backend) => config.store_backend = backend,
                Err(e) => warn!(error = %e, "Ignoring TALLY_STORE_BACKEND"),
            }
        }

        if let Ok(path) = std::env::var("TALLY_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Ok(email) = std::env::var("TALLY_SUPER_ADMIN_EMAIL") {
            config.super_admin_email = email.trim().to_lowercase();
        }

        if let Some(budget) = env_number::<usize>("TALLY_BATCH_BUDGET") {
            config.batch_budget = budget.min(MAX_BATCH_WRITES);
        }

        if let Some(retries) = env_number::<u32>("TALLY_LEDGER_MAX_RETRIES") {
            config.ledger_max_retries = retries;
        }

        if let Ok(symbol) = std::env::var("TALLY_CURRENCY_SYMBOL") {
            config.currency_symbol = symbol;
        }

        if let Some(limit) = env_number::<usize>("TALLY_TRASH_LIMIT") {
            config.trash_limit = limit;
        }

        config
    }

    /// Checks the configuration before the engine opens a store.
    pub fn validate(&self) -> EngineResult<()> {
        if self.super_admin_email.trim().is_empty() {
            return Err(EngineError::validation("Super admin email is required"));
        }

        if self.batch_budget == 0 {
            return Err(EngineError::validation("Batch budget must be at least 1"));
        }

        if self.batch_budget > MAX_BATCH_WRITES {
            return Err(EngineError::validation(format!(
                "Batch budget {} exceeds the store limit of {}",
                self.batch_budget, MAX_BATCH_WRITES
            )));
        }

        if self.ledger_max_retries == 0 {
            return Err(EngineError::validation("Ledger retries must be at least 1"));
        }

        Ok(())
    }

    /// Formats an amount with the configured currency symbol.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let config = EngineConfig::default();
    /// assert_eq!(config.format_money(Money::from_cents(123456)), "₦1,234.56");
    /// ```
    pub fn format_money(&self, amount: Money) -> String {
        amount.format_with_symbol(&self.currency_symbol)
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring non-numeric setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert_eq!(config.batch_budget, 450);
        assert_eq!(config.ledger_max_retries, 5);
        assert_eq!(config.currency_symbol, "₦");
        assert_eq!(config.trash_limit, 50);
    }

    #[test]
    fn test_backend_parse_and_display() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("SQLite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert!("postgres".parse::<StoreBackend>().is_err());
        assert_eq!(StoreBackend::Memory.to_string(), "memory");
    }

    #[test]
    fn test_validate() {
        let mut config = EngineConfig::in_memory("owner@shop.ng");
        assert!(config.validate().is_ok());

        config.batch_budget = 0;
        assert!(config.validate().is_err());

        config.batch_budget = 501;
        assert!(config.validate().is_err());

        let missing_admin = EngineConfig::default();
        assert!(missing_admin.validate().is_err());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"storeBackend":"memory","superAdminEmail":"a@b.ng"}"#).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.batch_budget, 450);
        assert_eq!(config.database_path, PathBuf::from("./tally.db"));
    }

    #[test]
    fn test_format_money() {
        let config = EngineConfig::default();
        assert_eq!(config.format_money(Money::from_cents(123456)), "₦1,234.56");
    }
}
