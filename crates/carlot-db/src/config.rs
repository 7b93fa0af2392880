//! # Configuration
//!
//! Runtime settings for the database and the sale engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CARLOT_DB_PATH=/var/lib/carlot/carlot.db                           │
//! │     CARLOT_IMPLICIT_SHIFT=false                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/carlot/carlot.toml (Linux)                               │
//! │     ~/Library/Application Support/com.carlot.carlot/carlot.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "carlot.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [sales]
//! implicit_shift_creation = true
//! max_retries = 3
//! retry_backoff_ms = 25
//! default_currency = "EUR"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use carlot_core::sale::{CartLine, SaleRequest};
use carlot_core::validation::validate_currency;
use carlot_core::DEFAULT_CURRENCY;

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("carlot.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

/// `[sales]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSettings {
    /// Open a shift on the operator's first sale instead of failing with
    /// NoActiveShift.
    #[serde(default = "default_true")]
    pub implicit_shift_creation: bool,

    /// Extra attempts after a busy database or a lost stock race.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff unit; attempt `n` waits `n × retry_backoff_ms`.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Currency for requests built with [`SalesSettings::sale_request`].
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    25
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Default for SalesSettings {
    fn default() -> Self {
        SalesSettings {
            implicit_shift_creation: default_true(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            default_currency: default_currency(),
        }
    }
}

// =============================================================================
// Sale Policy
// =============================================================================

/// The part of the configuration the sale engine acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalePolicy {
    pub implicit_shift_creation: bool,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for SalePolicy {
    fn default() -> Self {
        SalesSettings::default().policy()
    }
}

impl SalesSettings {
    pub fn policy(&self) -> SalePolicy {
        SalePolicy {
            implicit_shift_creation: self.implicit_shift_creation,
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    /// A sale in the shop's default currency.
    pub fn sale_request(
        &self,
        operator_id: impl Into<String>,
        lines: Vec<CartLine>,
    ) -> SaleRequest {
        SaleRequest::new(operator_id, self.default_currency.clone(), lines)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Carlot configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarlotConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sales: SalesSettings,
}

impl CarlotConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (carlot.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Missing sections take their defaults.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Validates the configuration and normalises the default currency.
    pub fn validate(&mut self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::Config("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(DbError::Config(
                "database.min_connections must not exceed max_connections".into(),
            ));
        }

        self.sales.default_currency = validate_currency(&self.sales.default_currency)
            .map_err(|e| DbError::Config(format!("sales.default_currency: {}", e)))?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("CARLOT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("CARLOT_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(m) => self.database.max_connections = m,
                Err(_) => warn!(value = %max, "Ignoring invalid CARLOT_MAX_CONNECTIONS"),
            }
        }

        if let Ok(flag) = std::env::var("CARLOT_IMPLICIT_SHIFT") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.sales.implicit_shift_creation = true,
                "0" | "false" | "no" => self.sales.implicit_shift_creation = false,
                _ => warn!(value = %flag, "Ignoring invalid CARLOT_IMPLICIT_SHIFT"),
            }
        }

        if let Ok(retries) = std::env::var("CARLOT_SALE_RETRIES") {
            match retries.parse::<u32>() {
                Ok(r) => self.sales.max_retries = r,
                Err(_) => warn!(value = %retries, "Ignoring invalid CARLOT_SALE_RETRIES"),
            }
        }

        if let Ok(currency) = std::env::var("CARLOT_DEFAULT_CURRENCY") {
            self.sales.default_currency = currency;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "carlot", "carlot")
            .map(|dirs| dirs.config_dir().join("carlot.toml"))
    }

    /// Pool settings for [`Database::new`](crate::Database::new).
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
            .sale_policy(self.sales.policy())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CarlotConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert!(config.sales.implicit_shift_creation);
        assert_eq!(config.sales.max_retries, 3);
        assert_eq!(config.sales.default_currency, "EUR");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CarlotConfig::from_toml(
            r#"
            [sales]
            implicit_shift_creation = false
            default_currency = "gel"
            "#,
        )
        .unwrap();

        assert!(!config.sales.implicit_shift_creation);
        assert_eq!(config.sales.max_retries, 3);
        assert_eq!(config.database, DatabaseSettings::default());
    }

    #[test]
    fn test_validation_normalises_currency() {
        let mut config = CarlotConfig::default();
        config.sales.default_currency = " gel ".to_string();
        config.validate().unwrap();
        assert_eq!(config.sales.default_currency, "GEL");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = CarlotConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = CarlotConfig::default();
        config.database.path = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = CarlotConfig::default();
        config.sales.default_currency = "EURO".to_string();
        assert!(matches!(config.validate(), Err(DbError::Config(_))));
    }

    #[test]
    fn test_policy_and_db_config() {
        let mut config = CarlotConfig::default();
        config.sales.retry_backoff_ms = 40;
        config.database.busy_timeout_secs = 2;

        let policy = config.sales.policy();
        assert_eq!(policy.retry_backoff, Duration::from_millis(40));

        let db = config.db_config();
        assert_eq!(db.busy_timeout, Duration::from_secs(2));
        assert_eq!(db.sale_policy, policy);
    }

    #[test]
    fn test_sale_request_uses_default_currency() {
        let mut config = CarlotConfig::from_toml("[sales]\ndefault_currency = \" gel\"").unwrap();
        config.validate().unwrap();

        let request = config.sales.sale_request("op-1", vec![CartLine::new("p-1", 1, 500)]);
        assert_eq!(request.currency, "GEL");
        assert_eq!(request.validate().unwrap(), "GEL");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CarlotConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(CarlotConfig::from_toml(&text).unwrap(), config);
    }
}
