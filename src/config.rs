//! Application configuration management
//!
//! This module handles loading and validating configuration from environment variables.
//! All configuration is loaded at startup and validated before the worker runs.

use std::env;
use std::sync::LazyLock;

use crate::constants::{
    DEFAULT_BLOCK_TIMEOUT_MS, DEFAULT_CLAIM_MIN_IDLE_MS, DEFAULT_DATABASE_MAX_CONNECTIONS,
    DEFAULT_EXECUTION_REQUEST_STREAM, DEFAULT_EXECUTION_RESULT_STREAM, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_INGEST_RETRIES, DEFAULT_REDIS_URL, DEFAULT_RESULT_CONSUMER_GROUP,
};

/// Global application configuration (lazily initialized)
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::from_env().expect("Failed to load configuration from environment")
});

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub execution: ExecutionConfig,
}

/// Process-level settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub rust_log: String,
    /// Emit JSON log lines instead of the human-readable format
    pub json_logs: bool,
}

/// Database configuration. Without a URL the worker keeps everything in memory.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Executor transport configuration
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub request_stream: String,
    pub result_stream: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub block_timeout_ms: usize,
    pub max_retries: u32,
    /// Entries pending on another consumer this long are taken over
    pub claim_min_idle_ms: u64,
}

impl ExecutionConfig {
    /// Stream that outcomes land in once retries are exhausted
    pub fn dead_letter_stream(&self) -> String {
        format!("{}_dead_letter", self.result_stream)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            service: ServiceConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            execution: ExecutionConfig::from_env()?,
        })
    }
}

impl ServiceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
            json_logs: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| DEFAULT_DATABASE_MAX_CONNECTIONS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()))?,
        })
    }
}

impl RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
        })
    }
}

impl ExecutionConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let consumer_name = match env::var("CONSUMER_NAME") {
            Ok(name) if !name.trim().is_empty() => name,
            _ => format!("evaluations-{}", uuid::Uuid::new_v4().simple()),
        };

        Ok(Self {
            request_stream: env::var("EXECUTION_REQUEST_STREAM")
                .unwrap_or_else(|_| DEFAULT_EXECUTION_REQUEST_STREAM.to_string()),
            result_stream: env::var("EXECUTION_RESULT_STREAM")
                .unwrap_or_else(|_| DEFAULT_EXECUTION_RESULT_STREAM.to_string()),
            consumer_group: env::var("RESULT_CONSUMER_GROUP")
                .unwrap_or_else(|_| DEFAULT_RESULT_CONSUMER_GROUP.to_string()),
            consumer_name,
            block_timeout_ms: env::var("BLOCK_TIMEOUT_MS")
                .unwrap_or_else(|_| DEFAULT_BLOCK_TIMEOUT_MS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BLOCK_TIMEOUT_MS".to_string()))?,
            max_retries: env::var("MAX_INGEST_RETRIES")
                .unwrap_or_else(|_| DEFAULT_MAX_INGEST_RETRIES.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MAX_INGEST_RETRIES".to_string()))?,
            claim_min_idle_ms: env::var("CLAIM_MIN_IDLE_MS")
                .unwrap_or_else(|_| DEFAULT_CLAIM_MIN_IDLE_MS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CLAIM_MIN_IDLE_MS".to_string()))?,
        })
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}
