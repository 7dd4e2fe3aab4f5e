//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::Money;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Base URL of the vehicle taxonomy service
    pub taxonomy_base_url: String,

    /// Timeout for a single upstream attempt
    pub taxonomy_timeout: Duration,

    /// Maximum age of a served reference-cache entry
    pub reference_cache_ttl: chrono::Duration,

    /// Penalty per late day stamped on new rentals
    pub rental_penalty_per_day: Money,

    /// Days after a rental's end date before late fees accrue
    pub late_fee_grace_days: u32,

    /// Capacity of the notification outbox queue
    pub notification_queue_capacity: usize,

    /// How often expired cache entries are purged
    pub cache_purge_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_env("DATABASE_MAX_CONNECTIONS", "10")?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_env("PORT", "3000")?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let taxonomy_base_url = env::var("TAXONOMY_BASE_URL")
            .unwrap_or_else(|_| "https://vpic.nhtsa.dot.gov/api/vehicles".to_string());

        let taxonomy_timeout = Duration::from_secs(parse_env("TAXONOMY_TIMEOUT_SECS", "20")?);

        let ttl_hours: i64 = parse_env("REFERENCE_CACHE_TTL_HOURS", "24")?;
        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue("REFERENCE_CACHE_TTL_HOURS"));
        }

        let rental_penalty_per_day = parse_env("RENTAL_PENALTY_PER_DAY", "50000")?;

        let late_fee_grace_days = parse_env("LATE_FEE_GRACE_DAYS", "0")?;

        let notification_queue_capacity: usize = parse_env("NOTIFICATION_QUEUE_CAPACITY", "1024")?;
        if notification_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue("NOTIFICATION_QUEUE_CAPACITY"));
        }

        let cache_purge_interval = parse_interval("CACHE_PURGE_INTERVAL_SECS", "3600")?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            taxonomy_base_url,
            taxonomy_timeout,
            reference_cache_ttl: chrono::Duration::hours(ttl_hours),
            rental_penalty_per_day,
            late_fee_grace_days,
            notification_queue_capacity,
            cache_purge_interval,
        })
    }
}

/// Parse a period in whole seconds; zero is rejected
fn parse_interval(key: &'static str, default: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_env(key, default)?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue(key));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_env<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
