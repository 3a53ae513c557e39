//! Configuration loaded from environment variables.

use std::time::Duration;

/// Limits applied by the order saga.
///
/// Reads from environment variables:
/// - `ORDER_CALL_TIMEOUT_MS`: bound on every collaborator call (default: `5000`)
/// - `ORDER_RELEASE_ATTEMPTS`: attempts per stock release (default: `3`)
/// - `ORDER_RELEASE_BACKOFF_MS`: pause between release attempts (default: `100`)
/// - `ORDER_NUMBER_ATTEMPTS`: order numbers tried before giving up (default: `5`)
/// - `ORDER_FLAG_ATTEMPTS`: saves of a reconciliation flag that may hit a
///   concurrent update (default: `3`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaConfig {
    pub call_timeout: Duration,
    pub release_attempts: u32,
    pub release_backoff: Duration,
    pub order_number_attempts: u32,
    pub flag_attempts: u32,
}

impl SagaConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            call_timeout: env_millis("ORDER_CALL_TIMEOUT_MS").unwrap_or(defaults.call_timeout),
            release_attempts: env_parse("ORDER_RELEASE_ATTEMPTS")
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.release_attempts),
            release_backoff: env_millis("ORDER_RELEASE_BACKOFF_MS")
                .unwrap_or(defaults.release_backoff),
            order_number_attempts: env_parse("ORDER_NUMBER_ATTEMPTS")
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.order_number_attempts),
            flag_attempts: env_parse("ORDER_FLAG_ATTEMPTS")
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.flag_attempts),
        }
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_millis(5000),
            release_attempts: 3,
            release_backoff: Duration::from_millis(100),
            order_number_attempts: 5,
            flag_attempts: 3,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Process configuration for binaries.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL`: PostgreSQL connection string (no default)
/// - plus everything [`SagaConfig::from_env`] reads
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub saga: SagaConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: env_parse("LOG_FORMAT").unwrap_or_default(),
            database_url: std::env::var("DATABASE_URL").ok(),
            saga: SagaConfig::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            saga: SagaConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
