//! Application configuration management.

use std::time::Duration;

use serde::Deserialize;

use crate::error::FaultClass;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Accrual authority configuration.
    pub accrual: AccrualConfig,
    /// Background reconciliation configuration.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    /// Storage retry policy configuration.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Accrual authority configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AccrualConfig {
    /// Base address of the accrual service, e.g. `http://localhost:8081`.
    pub address: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Wait after a failed or unparseable query, in seconds.
    #[serde(default = "default_failure_delay")]
    pub failure_delay_secs: u64,
    /// Minimum wait between polls of a non-terminal order, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_failure_delay() -> u64 {
    5
}

fn default_poll_interval() -> u64 {
    1000
}

impl AccrualConfig {
    /// Creates a configuration for `address` with default timings.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            request_timeout_secs: default_request_timeout(),
            failure_delay_secs: default_failure_delay(),
            poll_interval_ms: default_poll_interval(),
        }
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Wait after a failed query.
    #[must_use]
    pub const fn failure_delay(&self) -> Duration {
        Duration::from_secs(self.failure_delay_secs)
    }

    /// Wait between polls of a non-terminal order.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Background reconciliation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Maximum number of orders polled at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Interval between recovery sweeps over unresolved orders, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_max_concurrent() -> usize {
    64
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl ReconcilerConfig {
    /// Interval between recovery sweeps.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Storage retry policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Waits between consecutive attempts, in milliseconds.
    #[serde(default = "default_delays")]
    pub delays_ms: Vec<u64>,
    /// Which transient fault class storage calls are retried on.
    #[serde(default = "default_fault_class")]
    pub fault_class: FaultClass,
}

fn default_max_attempts() -> usize {
    3
}

fn default_delays() -> Vec<u64> {
    vec![1000, 3000, 5000]
}

fn default_fault_class() -> FaultClass {
    FaultClass::ConnectionException
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delays_ms: default_delays(),
            fault_class: default_fault_class(),
        }
    }
}

impl RetryConfig {
    /// Waits applied between attempts: `max_attempts - 1` entries.
    ///
    /// When fewer delays than gaps are configured, the last delay repeats.
    #[must_use]
    pub fn schedule(&self) -> Vec<Duration> {
        let gaps = self.max_attempts.saturating_sub(1);
        let last = self.delays_ms.last().copied().unwrap_or_default();
        (0..gaps)
            .map(|i| Duration::from_millis(self.delays_ms.get(i).copied().unwrap_or(last)))
            .collect()
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// `DATABASE_URI` and `ACCRUAL_SYSTEM_ADDRESS` are honoured for
    /// compatibility with existing deployments and take precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("LOYALTY")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("retry.delays_ms"),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URI").ok())?
            .set_override_option(
                "accrual.address",
                std::env::var("ACCRUAL_SYSTEM_ADDRESS").ok(),
            )?
            .build()?;

        config.try_deserialize()
    }
}
