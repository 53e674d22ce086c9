//! Command-line interface parsing for the RedGreen service
//!
//! Every setting can come from a flag or an environment variable. The parsed
//! arguments are validated into a [`StartupConfig`] before anything is wired.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::aggregator::FetchMode;
use crate::data::banana::BANANA_URL;
use crate::data::strawberry::STRAWBERRY_URL;
use crate::refresh::RefreshConfig;

/// Database path that selects an in-memory store
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// An upstream URL is not an absolute http(s) URL
    #[error("Invalid {name} URL: '{value}'. Expected an http:// or https:// URL")]
    InvalidUrl { name: &'static str, value: String },

    /// The upstream timeout must be positive
    #[error("Invalid timeout: must be at least 1 second")]
    InvalidTimeout,
}

/// RedGreen - aggregate RED and GREEN products from the fruit CRMs
#[derive(Parser, Debug)]
#[command(name = "redgreen")]
#[command(about = "Aggregates RED and GREEN product data behind a rate-limited cache")]
#[command(version)]
pub struct Cli {
    /// Minutes that must pass between rate checks before the cache is evicted
    #[arg(long, env = "RATE_LIMIT", default_value_t = 5, allow_negative_numbers = true)]
    pub rate_limit: i64,

    /// Address to bind the HTTP server to
    #[arg(long, env = "REDGREEN_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP server to
    #[arg(long, env = "REDGREEN_PORT", default_value_t = 8080)]
    pub port: u16,

    /// SQLite database file for persisted records (":memory:" for none on disk)
    #[arg(long, env = "REDGREEN_DATABASE", default_value = "redgreen.db")]
    pub database: String,

    /// Banana CRM endpoint
    #[arg(long, env = "BANANA_URL", default_value = BANANA_URL)]
    pub banana_url: String,

    /// Strawberry CRM endpoint
    #[arg(long, env = "STRAWBERRY_URL", default_value = STRAWBERRY_URL)]
    pub strawberry_url: String,

    /// Timeout for each upstream request, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Fetch both upstreams at the same time instead of one after the other
    #[arg(long)]
    pub concurrent_fetch: bool,

    /// Run the rate check before every read of the aggregation
    #[arg(long)]
    pub check_on_read: bool,

    /// Run the rate check in the background every N seconds (0 disables)
    #[arg(long, env = "CHECK_INTERVAL_SECS", default_value_t = 0)]
    pub check_interval_secs: u64,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Where persisted records are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

/// Validated configuration for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub rate_limit_minutes: i64,
    pub bind_addr: String,
    pub database: DatabaseLocation,
    pub banana_url: String,
    pub strawberry_url: String,
    pub upstream_timeout: Duration,
    pub fetch_mode: FetchMode,
    pub check_on_read: bool,
    pub refresh: RefreshConfig,
    pub log_level: String,
}

/// Checks that `value` looks like an absolute http(s) URL
fn validate_url(name: &'static str, value: &str) -> Result<String, CliError> {
    let trimmed = value.trim();
    let has_scheme = trimmed.starts_with("http://") || trimmed.starts_with("https://");
    let has_host = trimmed
        .split_once("://")
        .map(|(_, rest)| !rest.is_empty())
        .unwrap_or(false);

    if has_scheme && has_host {
        Ok(trimmed.to_string())
    } else {
        Err(CliError::InvalidUrl {
            name,
            value: value.to_string(),
        })
    }
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with validated settings
    /// * `Err(CliError)` if a URL or the timeout is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.timeout_secs == 0 {
            return Err(CliError::InvalidTimeout);
        }

        let database = if cli.database == IN_MEMORY_DATABASE {
            DatabaseLocation::InMemory
        } else {
            DatabaseLocation::File(PathBuf::from(&cli.database))
        };

        let fetch_mode = if cli.concurrent_fetch {
            FetchMode::Concurrent
        } else {
            FetchMode::Sequential
        };

        Ok(StartupConfig {
            rate_limit_minutes: cli.rate_limit,
            bind_addr: format!("{}:{}", cli.host, cli.port),
            database,
            banana_url: validate_url("banana", &cli.banana_url)?,
            strawberry_url: validate_url("strawberry", &cli.strawberry_url)?,
            upstream_timeout: Duration::from_secs(cli.timeout_secs),
            fetch_mode,
            check_on_read: cli.check_on_read,
            refresh: RefreshConfig::from_secs(cli.check_interval_secs),
            log_level: cli.log_level.clone(),
        })
    }
}
