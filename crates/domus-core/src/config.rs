//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use crate::error::AppError;
use crate::models::{RateSource, SequenceDefaults};
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub invoicing: InvoicingConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub indexation: IndexationConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Comma separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Database configuration
///
/// When `url` is absent the application runs on the local JSON-file store.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Run pending migrations at start-up
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_run_migrations() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            run_migrations: default_run_migrations(),
        }
    }
}

/// Redis configuration
///
/// When `url` is set, the last-known exchange rate is shared through Redis
/// instead of being kept per process.
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default)]
    pub url: Option<String>,

    /// TTL for cached rates in seconds
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
}

fn default_cache_ttl() -> u64 {
    7 * 24 * 3600
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            default_ttl_secs: default_cache_ttl(),
        }
    }
}

/// Local JSON-file storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding one JSON file per collection
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Invoicing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InvoicingConfig {
    /// Series used when an owner sequence is first created
    #[serde(default = "default_series")]
    pub default_series: String,

    /// Zero-padding width used when an owner sequence is first created
    #[serde(default = "default_pad_width")]
    pub default_pad_width: i32,

    /// Whether new sequences include the year
    #[serde(default = "default_include_year")]
    pub default_include_year: bool,

    /// IANA timezone used to determine "today" and the invoice year
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Exchange rate source used to convert EUR rents
    #[serde(default = "default_invoice_rate_source")]
    pub rate_source: String,

    /// Currency invoices are issued in
    #[serde(default = "default_local_currency")]
    pub local_currency: String,
}

fn default_series() -> String {
    "MS".to_string()
}

fn default_pad_width() -> i32 {
    5
}

fn default_include_year() -> bool {
    true
}

fn default_timezone() -> String {
    "Europe/Bucharest".to_string()
}

fn default_invoice_rate_source() -> String {
    "bnr".to_string()
}

fn default_local_currency() -> String {
    "RON".to_string()
}

impl Default for InvoicingConfig {
    fn default() -> Self {
        Self {
            default_series: default_series(),
            default_pad_width: default_pad_width(),
            default_include_year: default_include_year(),
            timezone: default_timezone(),
            rate_source: default_invoice_rate_source(),
            local_currency: default_local_currency(),
        }
    }
}

impl InvoicingConfig {
    /// Defaults applied to a sequence created on first allocation
    pub fn sequence_defaults(&self) -> SequenceDefaults {
        SequenceDefaults {
            series: self.default_series.clone(),
            pad_width: self.default_pad_width,
            include_year: self.default_include_year,
        }
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz, AppError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| AppError::Config(format!("Invalid timezone {}: {}", self.timezone, e)))
    }

    /// Parsed invoicing rate source
    pub fn source(&self) -> Result<RateSource, AppError> {
        RateSource::from_str(&self.rate_source)
            .ok_or_else(|| AppError::Config(format!("Unknown rate source: {}", self.rate_source)))
    }
}

/// Upstream endpoint and extraction pattern of one rate source
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// URL fetched with a plain GET
    pub url: String,

    /// Regular expression whose first capture group holds the EUR rate
    pub pattern: String,
}

/// Exchange rate resolver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    /// Upper bound for a single upstream fetch
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Rate returned when every other tier is exhausted
    #[serde(default = "default_rate")]
    pub default_rate: f64,

    #[serde(default = "default_bnr_source")]
    pub bnr: SourceConfig,

    #[serde(default = "default_bcr_source")]
    pub bcr: SourceConfig,

    #[serde(default = "default_bt_source")]
    pub bt: SourceConfig,
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_rate() -> f64 {
    5.0
}

fn default_bnr_source() -> SourceConfig {
    SourceConfig {
        url: "https://www.bnr.ro/nbrfxrates.xml".to_string(),
        pattern: r#"<Rate currency="EUR">\s*([0-9]+[.,][0-9]+)\s*</Rate>"#.to_string(),
    }
}

fn default_bcr_source() -> SourceConfig {
    SourceConfig {
        url: "https://www.bcr.ro/ro/persoane-fizice/curs-valutar".to_string(),
        pattern: r#"(?s)EUR.{0,400}?([0-9]+[.,][0-9]{2,4})"#.to_string(),
    }
}

fn default_bt_source() -> SourceConfig {
    SourceConfig {
        url: "https://www.bancatransilvania.ro/curs-valutar-spot".to_string(),
        pattern: r#"(?s)EUR.{0,400}?([0-9]+[.,][0-9]{2,4})"#.to_string(),
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            default_rate: default_rate(),
            bnr: default_bnr_source(),
            bcr: default_bcr_source(),
            bt: default_bt_source(),
        }
    }
}

impl ExchangeConfig {
    /// Endpoint configuration of a source
    pub fn source(&self, source: RateSource) -> &SourceConfig {
        match source {
            RateSource::Bnr => &self.bnr,
            RateSource::Bcr => &self.bcr,
            RateSource::Bt => &self.bt,
        }
    }
}

/// Rent indexation configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexationConfig {
    /// Allow a factor below 1 (deflation lowers the rent)
    #[serde(default)]
    pub allow_decrease: bool,
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("storage.data_dir", "data")?
            .set_default("invoicing.default_series", "MS")?
            .set_default("invoicing.default_pad_width", 5)?
            .set_default("invoicing.default_include_year", true)?
            .set_default("exchange.timeout_secs", 10)?
            .set_default("exchange.default_rate", 5.0)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with DOMUS_ prefix
            .add_source(
                Environment::with_prefix("DOMUS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
