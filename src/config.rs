//! # Configuration
//!
//! Daemon configuration loading and management.
//!
//! # Configuration Sources
//!
//! Configuration is loaded in the following order (later sources override earlier):
//! 1. Default values
//! 2. Configuration file (`config.toml`, or the path in `ESCROW_TRADE_CONFIG_FILE`)
//! 3. Environment variables (prefixed with `ESCROW_TRADE_`)
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ESCROW_TRADE_SERVICE_URL` | Trade service base URL | `http://localhost:8080/` |
//! | `ESCROW_TRADE_SERVICE_BACKEND` | `http` or `memory` | `http` |
//! | `ESCROW_TRADE_POLL_INTERVAL_SECS` | Poll interval | `15` |
//! | `ESCROW_TRADE_NETWORK_RETRY_DELAY_SECS` | Back-off after a failed fetch | `100` |
//! | `ESCROW_TRADE_TRADES_DIR` | Snapshot directory | `./data/trades` |
//! | `ESCROW_TRADE_PROFILE_PUB_KEY` | Local profile key | (required) |
//! | `ESCROW_TRADE_ESCROW_PUB_KEY` | Local escrow key | profile key |
//! | `ESCROW_TRADE_LOG_LEVEL` | Log level | `info` |
//! | `ESCROW_TRADE_LOG_FORMAT` | Log format (json/pretty) | `json` |
//!
//! # Examples
//!
//! ```ignore
//! use escrow_trade::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! config.validate()?;
//! println!("polling {} every {}s", config.trade_service.base_url, config.engine.poll_interval_secs);
//! ```

use crate::application::services::{EngineConfig, RetryPolicy};
use crate::domain::value_objects::{BtcAmount, CurrencyCode, PaymentMethod};
use crate::infrastructure::profile::StaticProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse configuration.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Invalid configuration value.
    #[error("invalid config value for {field}: {message}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Error message.
        message: String,
    },

    /// Environment variable error.
    #[error("environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Trade Service Configuration
// ============================================================================

/// Which trade service implementation to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceBackend {
    /// Remote HTTP trade service.
    #[default]
    Http,
    /// In-process store, for local development.
    Memory,
}

/// Remote trade service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeServiceConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: ServiceBackend,

    /// Base URL of the HTTP trade service.
    #[serde(default = "default_service_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for TradeServiceConfig {
    fn default() -> Self {
        Self {
            backend: ServiceBackend::Http,
            base_url: default_service_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl TradeServiceConfig {
    /// Parses the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url)
            .map_err(|e| ConfigError::invalid("trade_service.base_url", e.to_string()))
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Reconciliation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Seconds between poll passes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds to back off after the trade service is unreachable.
    #[serde(default = "default_network_retry_delay")]
    pub network_retry_delay_secs: u64,

    /// Rebase attempts after a write conflict.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Retries for a push failing on the network.
    #[serde(default = "default_push_retries")]
    pub push_max_retries: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            network_retry_delay_secs: default_network_retry_delay(),
            max_conflict_retries: default_max_conflict_retries(),
            push_max_retries: default_push_retries(),
        }
    }
}

impl EngineSettings {
    /// Builds the engine configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            network_retry_delay: Duration::from_secs(self.network_retry_delay_secs),
            max_conflict_retries: self.max_conflict_retries,
            push_retry: RetryPolicy {
                max_retries: self.push_max_retries,
                ..RetryPolicy::default()
            },
            ..EngineConfig::default()
        }
    }
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Local snapshot storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per trade.
    #[default]
    File,
    /// Process memory only.
    Memory,
}

/// Local storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory holding trade snapshots.
    #[serde(default = "default_trades_dir")]
    pub trades_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            trades_dir: default_trades_dir(),
        }
    }
}

// ============================================================================
// Identity Configuration
// ============================================================================

/// Fiat payment details for one currency and method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetailsEntry {
    /// Currency.
    pub currency: CurrencyCode,
    /// Payment rail.
    pub method: PaymentMethod,
    /// Details handed to the buyer, e.g. an account number.
    pub details: String,
}

/// Local identity configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Profile public key.
    #[serde(default)]
    pub pub_key: String,

    /// Fiat payment details offered when funding as seller.
    #[serde(default)]
    pub payment_details: Vec<PaymentDetailsEntry>,
}

impl ProfileConfig {
    /// Builds the static profile.
    #[must_use]
    pub fn profile(&self) -> StaticProfile {
        self.payment_details
            .iter()
            .fold(StaticProfile::new(&self.pub_key), |profile, entry| {
                profile.with_payment_details(entry.currency, entry.method, &entry.details)
            })
    }
}

/// Simulated wallet configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Escrow public key. Falls back to the profile key when empty.
    #[serde(default)]
    pub escrow_pub_key: String,

    /// Fee per transaction.
    #[serde(default = "default_tx_fee")]
    pub tx_fee: BtcAmount,

    /// Balance credited to the deposit address at startup.
    #[serde(default = "default_btc_zero")]
    pub initial_balance: BtcAmount,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            escrow_pub_key: String::new(),
            tx_fee: default_tx_fee(),
            initial_balance: BtcAmount::ZERO,
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (structured logging).
    #[default]
    Json,
    /// Pretty format (human-readable).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include timestamps in logs.
    #[serde(default = "default_true")]
    pub include_timestamps: bool,

    /// Include target (module path) in logs.
    #[serde(default = "default_true")]
    pub include_target: bool,

    /// Include span information in logs.
    #[serde(default = "default_true")]
    pub include_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Json,
            include_timestamps: true,
            include_target: true,
            include_spans: true,
        }
    }
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Trade service configuration.
    #[serde(default)]
    pub trade_service: TradeServiceConfig,

    /// Engine configuration.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Identity configuration.
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Wallet configuration.
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,

    /// Service name for tracing.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Environment (development, staging, production).
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            trade_service: TradeServiceConfig::default(),
            engine: EngineSettings::default(),
            storage: StorageConfig::default(),
            profile: ProfileConfig::default(),
            wallet: WalletConfig::default(),
            log: LogConfig::default(),
            service_name: default_service_name(),
            environment: default_environment(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment variables and optional config file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading fails.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let config_path = std::env::var("ESCROW_TRADE_CONFIG_FILE")
            .unwrap_or_else(|_| "config.toml".to_string());

        if Path::new(&config_path).exists() {
            config = Self::from_file(&config_path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Escrow key for the wallet: the configured one, else the profile key.
    #[must_use]
    pub fn escrow_pub_key(&self) -> &str {
        if self.wallet.escrow_pub_key.is_empty() {
            &self.profile.pub_key
        } else {
            &self.wallet.escrow_pub_key
        }
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Trade service
        if let Some(url) = var("ESCROW_TRADE_SERVICE_URL") {
            self.trade_service.base_url = url;
        }
        if let Some(backend) = var("ESCROW_TRADE_SERVICE_BACKEND") {
            self.trade_service.backend = match backend.to_lowercase().as_str() {
                "memory" => ServiceBackend::Memory,
                _ => ServiceBackend::Http,
            };
        }
        if let Some(timeout) = var("ESCROW_TRADE_REQUEST_TIMEOUT_SECS")
            && let Ok(t) = timeout.parse()
        {
            self.trade_service.request_timeout_secs = t;
        }

        // Engine
        if let Some(interval) = var("ESCROW_TRADE_POLL_INTERVAL_SECS")
            && let Ok(i) = interval.parse()
        {
            self.engine.poll_interval_secs = i;
        }
        if let Some(delay) = var("ESCROW_TRADE_NETWORK_RETRY_DELAY_SECS")
            && let Ok(d) = delay.parse()
        {
            self.engine.network_retry_delay_secs = d;
        }

        // Storage
        if let Some(dir) = var("ESCROW_TRADE_TRADES_DIR") {
            self.storage.trades_dir = PathBuf::from(dir);
        }

        // Identity
        if let Some(key) = var("ESCROW_TRADE_PROFILE_PUB_KEY") {
            self.profile.pub_key = key;
        }
        if let Some(key) = var("ESCROW_TRADE_ESCROW_PUB_KEY") {
            self.wallet.escrow_pub_key = key;
        }

        // Logging
        if let Some(level) = var("ESCROW_TRADE_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(format) = var("ESCROW_TRADE_LOG_FORMAT") {
            self.log.format = match format.to_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                _ => LogFormat::Json,
            };
        }

        // Service
        if let Some(name) = var("ESCROW_TRADE_SERVICE_NAME") {
            self.service_name = name;
        }
        if let Some(env) = var("ESCROW_TRADE_ENVIRONMENT") {
            self.environment = env;
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trade_service.backend == ServiceBackend::Http {
            self.trade_service.url()?;
        }
        if self.trade_service.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "trade_service.request_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.engine.poll_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "engine.poll_interval_secs",
                "must be greater than zero",
            ));
        }
        if self.engine.network_retry_delay_secs == 0 {
            return Err(ConfigError::invalid(
                "engine.network_retry_delay_secs",
                "must be greater than zero",
            ));
        }
        if self.profile.pub_key.trim().is_empty() {
            return Err(ConfigError::invalid("profile.pub_key", "must be set"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log.level".to_string(),
                message: format!(
                    "invalid log level '{}', must be one of: {:?}",
                    self.log.level, valid_levels
                ),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Default Value Functions
// ============================================================================

fn default_service_url() -> String {
    "http://localhost:8080/".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    15
}

fn default_network_retry_delay() -> u64 {
    100
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_push_retries() -> u32 {
    3
}

fn default_trades_dir() -> PathBuf {
    PathBuf::from("./data/trades")
}

fn default_tx_fee() -> BtcAmount {
    BtcAmount::new(rust_decimal::Decimal::new(1, 4)).unwrap_or(BtcAmount::ZERO)
}

fn default_btc_zero() -> BtcAmount {
    BtcAmount::ZERO
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "escrow-trade".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::application::ports::Profile;
    use std::collections::HashMap;

    fn configured() -> AppConfig {
        AppConfig {
            profile: ProfileConfig {
                pub_key: "alice".to_string(),
                ..ProfileConfig::default()
            },
            ..AppConfig::default()
        }
    }

    mod defaults {
        use super::*;

        #[test]
        fn app_config_default() {
            let config = AppConfig::default();
            assert_eq!(config.engine.poll_interval_secs, 15);
            assert_eq!(config.engine.network_retry_delay_secs, 100);
            assert_eq!(config.engine.max_conflict_retries, 3);
            assert_eq!(config.log.level, "info");
            assert_eq!(config.service_name, "escrow-trade");
        }

        #[test]
        fn log_format_default() {
            assert_eq!(LogFormat::default(), LogFormat::Json);
        }

        #[test]
        fn engine_config_mirrors_settings() {
            let engine = EngineSettings::default().engine_config();
            assert_eq!(engine.poll_interval, Duration::from_secs(15));
            assert_eq!(engine.network_retry_delay, Duration::from_secs(100));
            assert_eq!(engine.push_retry.max_retries, 3);
        }

        #[test]
        fn escrow_key_falls_back_to_profile() {
            let mut config = configured();
            assert_eq!(config.escrow_pub_key(), "alice");
            config.wallet.escrow_pub_key = "alice-escrow".to_string();
            assert_eq!(config.escrow_pub_key(), "alice-escrow");
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn configured_profile_is_valid() {
            assert!(configured().validate().is_ok());
        }

        #[test]
        fn missing_profile_key_is_invalid() {
            let err = AppConfig::default().validate().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "profile.pub_key"));
        }

        #[test]
        fn invalid_log_level() {
            let mut config = configured();
            config.log.level = "invalid".to_string();
            assert!(config.validate().is_err());
        }

        #[test]
        fn unparsable_url() {
            let mut config = configured();
            config.trade_service.base_url = "not a url".to_string();
            assert!(config.validate().is_err());

            config.trade_service.backend = ServiceBackend::Memory;
            assert!(config.validate().is_ok());
        }

        #[test]
        fn zero_interval() {
            let mut config = configured();
            config.engine.poll_interval_secs = 0;
            assert!(config.validate().is_err());
        }
    }

    mod sources {
        use super::*;

        #[test]
        fn toml_sections() {
            let config = AppConfig::from_toml(
                r#"
                environment = "staging"

                [trade_service]
                base_url = "https://trades.example.com/api/"

                [engine]
                poll_interval_secs = 5

                [profile]
                pub_key = "bob"

                [[profile.payment_details]]
                currency = "EUR"
                method = "SEPA"
                details = "IBAN DE00 1234"

                [log]
                format = "pretty"
                "#,
            )
            .unwrap();

            assert_eq!(config.environment, "staging");
            assert_eq!(config.engine.poll_interval_secs, 5);
            assert_eq!(config.engine.network_retry_delay_secs, 100);
            assert_eq!(config.log.format, LogFormat::Pretty);
            let profile = config.profile.profile();
            assert_eq!(profile.pub_key(), "bob");
            assert_eq!(
                profile.payment_details(CurrencyCode::Eur, PaymentMethod::Sepa),
                Some("IBAN DE00 1234".to_string())
            );
        }

        #[test]
        fn malformed_toml_is_parse_error() {
            let err = AppConfig::from_toml("[engine\npoll").unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)));
        }

        #[test]
        fn file_round_trip() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("config.toml");
            std::fs::write(&path, "[profile]\npub_key = \"carol\"\n").unwrap();
            let config = AppConfig::from_file(&path).unwrap();
            assert_eq!(config.profile.pub_key, "carol");
        }

        #[test]
        fn env_overrides_apply() {
            let vars: HashMap<&str, &str> = [
                ("ESCROW_TRADE_PROFILE_PUB_KEY", "dave"),
                ("ESCROW_TRADE_POLL_INTERVAL_SECS", "3"),
                ("ESCROW_TRADE_NETWORK_RETRY_DELAY_SECS", "not-a-number"),
                ("ESCROW_TRADE_SERVICE_BACKEND", "memory"),
                ("ESCROW_TRADE_LOG_FORMAT", "PRETTY"),
            ]
            .into_iter()
            .collect();
            let mut config = AppConfig::default();
            config.apply_overrides(|key| vars.get(key).map(|v| (*v).to_string()));

            assert_eq!(config.profile.pub_key, "dave");
            assert_eq!(config.engine.poll_interval_secs, 3);
            assert_eq!(config.engine.network_retry_delay_secs, 100);
            assert_eq!(config.trade_service.backend, ServiceBackend::Memory);
            assert_eq!(config.log.format, LogFormat::Pretty);
        }
    }
}
