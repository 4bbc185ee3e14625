//! Explicit configuration objects handed to adapters at construction.
//!
//! Library code never reads the process environment on its own; the binary
//! calls the `from_env` constructors once at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GATEWAY_URL: &str = "https://api.xendit.co";
pub const DEFAULT_NAMESPACE: &str = "public";

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: String,
    /// Upper bound on every gateway round trip.
    pub timeout: Duration,
    /// Attempts for instrument creation. Confirmation is always attempted once.
    pub max_open_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            secret_key: String::new(),
            timeout: Duration::from_secs(10),
            max_open_attempts: 3,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl GatewayConfig {
    /// Reads `GATEWAY_BASE_URL`, `GATEWAY_SECRET_KEY`, `GATEWAY_TIMEOUT_SECS`
    /// and `GATEWAY_MAX_ATTEMPTS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("GATEWAY_BASE_URL").unwrap_or(defaults.base_url),
            secret_key: env::var("GATEWAY_SECRET_KEY").unwrap_or(defaults.secret_key),
            timeout: env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_open_attempts: env::var("GATEWAY_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|attempts: &u32| *attempts > 0)
                .unwrap_or(defaults.max_open_attempts),
            retry_backoff: defaults.retry_backoff,
        }
    }

    pub fn settlement(&self) -> SettlementConfig {
        SettlementConfig {
            max_open_attempts: self.max_open_attempts,
            retry_backoff: self.retry_backoff,
        }
    }
}

/// Retry policy applied by the settlement orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementConfig {
    pub max_open_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        GatewayConfig::default().settlement()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Persistent database location. In-memory storage when absent.
    pub db_path: Option<PathBuf>,
    /// Prefix for every column family, so several tenants can share a database.
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl StorageConfig {
    /// Reads `DB_SCHEMA` for the namespace.
    pub fn from_env(db_path: Option<PathBuf>) -> Self {
        Self {
            db_path,
            namespace: env::var("DB_SCHEMA")
                .ok()
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        }
    }
}
