//! Configuration
//!
//! Layered configuration for the harness: built-in defaults, then an optional
//! TOML file, then `FIREBRIDGE__`-prefixed environment variables (`__`
//! separates nested keys, e.g. `FIREBRIDGE__STORE__BACKEND=rest`).

pub mod facade;
pub mod sources;

pub use facade::ConfigLoader;

use crate::logging::LoggingConfig;
use crate::store::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Name of the hosted bounded context.
    #[serde(default = "default_context_name")]
    pub context_name: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub subscriptions: SubscriptionConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_context_name() -> String {
    "tasks".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            context_name: default_context_name(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            subscriptions: SubscriptionConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.store.backend == StoreBackend::Rest && self.store.database_url.is_none() {
            return Err("store.database_url is required for the rest backend".to_string());
        }
        if self.subscriptions.lifetime_secs == 0 {
            return Err("subscriptions.lifetime_secs must be greater than zero".to_string());
        }
        if self.subscriptions.sweep_interval_secs == 0 {
            return Err("subscriptions.sweep_interval_secs must be greater than zero".to_string());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Rest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Base URL of the realtime database (rest backend only).
    #[serde(default)]
    pub database_url: Option<String>,

    /// Sent as the `auth` query parameter when set.
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: None,
            auth_token: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// How long a subscription lives without a keep-up.
    #[serde(default = "default_lifetime_secs")]
    pub lifetime_secs: u64,

    /// How often expired subscriptions are swept.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_lifetime_secs() -> u64 {
    120
}

fn default_sweep_interval_secs() -> u64 {
    30
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: default_lifetime_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SubscriptionConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
