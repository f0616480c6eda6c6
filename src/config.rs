use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::db::retry::RetryConfig;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
/// Fallback supplier for shortfall lines whose product has no default supplier.
const DEFAULT_GENERIC_SUPPLIER_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "database_url must not be empty"))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1, message = "port must be non-zero"))]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Buffer size of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    /// Supplier assigned to shortfall lines when a product has none
    #[serde(default = "default_generic_supplier_id")]
    pub generic_supplier_id: Uuid,

    /// Lock-timeout retry: attempts including the first
    #[serde(default = "default_lock_retry_attempts")]
    #[validate(range(min = 1, max = 20))]
    pub lock_retry_attempts: u32,
    #[serde(default = "default_lock_retry_initial_delay_ms")]
    pub lock_retry_initial_delay_ms: u64,
    #[serde(default = "default_lock_retry_max_delay_ms")]
    pub lock_retry_max_delay_ms: u64,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Backoff applied by request handlers when stock rows are contended.
    pub fn lock_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.lock_retry_attempts,
            initial_delay: Duration::from_millis(self.lock_retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.lock_retry_max_delay_ms),
            backoff_factor: 2.0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://fulfillment.db?mode=rwc".to_string(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            generic_supplier_id: default_generic_supplier_id(),
            lock_retry_attempts: default_lock_retry_attempts(),
            lock_retry_initial_delay_ms: default_lock_retry_initial_delay_ms(),
            lock_retry_max_delay_ms: default_lock_retry_max_delay_ms(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}
fn default_generic_supplier_id() -> Uuid {
    Uuid::parse_str(DEFAULT_GENERIC_SUPPLIER_ID).unwrap_or_else(|_| Uuid::nil())
}
fn default_lock_retry_attempts() -> u32 {
    3
}
fn default_lock_retry_initial_delay_ms() -> u64 {
    50
}
fn default_lock_retry_max_delay_ms() -> u64 {
    1_000
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("invalid_log_level")),
    }
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("stateset_fulfillment={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads configuration from defaults, `config/default`, `config/{RUN_ENV}` and
/// `APP__*` environment variables, in that order of precedence.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let defaults = AppConfig::default();
    let config = Config::builder()
        .set_default("database_url", defaults.database_url)?
        .set_default("host", defaults.host)?
        .set_default("port", i64::from(defaults.port))?
        .set_default("environment", run_env.clone())?
        .set_default("log_level", defaults.log_level)?
        .set_default("log_json", defaults.log_json)?
        .set_default("auto_migrate", defaults.auto_migrate)?
        .set_default("generic_supplier_id", defaults.generic_supplier_id.to_string())?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.bind_address(), "0.0.0.0:8080");
        assert!(!cfg.is_production());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let cfg = AppConfig {
            log_level: "verbose".into(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_retry_attempts() {
        let cfg = AppConfig {
            lock_retry_attempts: 0,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn lock_retry_uses_configured_delays() {
        let cfg = AppConfig {
            lock_retry_attempts: 5,
            lock_retry_initial_delay_ms: 10,
            lock_retry_max_delay_ms: 200,
            ..AppConfig::default()
        };
        let retry = cfg.lock_retry();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_delay, Duration::from_millis(10));
        assert_eq!(retry.max_delay, Duration::from_millis(200));
    }

    #[test]
    fn generic_supplier_default_is_stable() {
        assert_eq!(
            AppConfig::default().generic_supplier_id.to_string(),
            DEFAULT_GENERIC_SUPPLIER_ID
        );
    }
}
