//! Configuration management for the provider pool manager.
//!
//! Configuration is set via environment variables:
//! - `MAX_ERROR_COUNT` - Optional. Consecutive failures before an entry is
//!   marked unhealthy. Defaults to `3`.
//! - `HEALTH_CHECK_INTERVAL_MS` - Optional. Cool-down before an unhealthy
//!   entry becomes eligible for recovery. Defaults to `600000` (10 min).
//! - `SAVE_DEBOUNCE_TIME_MS` - Optional. Debounce window for coalesced
//!   persistence. Defaults to `1000`.
//! - `LOG_LEVEL` - Optional. One of `debug`, `info`, `warn`, `error`.
//!   Defaults to `info`.
//! - `PROVIDER_POOLS_FILE_PATH` - Optional. Path to the pool document.
//!   Defaults to `provider_pools.json`.
//! - `USE_SYSTEM_PROXY_{GEMINI,OPENAI,CLAUDE,QWEN,KIRO}` - Optional,
//!   per-family proxy toggles consulted by the probe engine when it asks
//!   the adapter layer for a fresh client. Default `false`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("invalid log level {0:?}, expected one of debug/info/warn/error")]
    InvalidLogLevel(String),
}

/// One of the four accepted log verbosity levels (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
    }

    pub fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Per-family proxy toggles (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct ProxyFlags {
    pub gemini: bool,
    pub openai: bool,
    pub claude: bool,
    pub qwen: bool,
    pub kiro: bool,
}

/// Provider pool manager configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Consecutive failures before an entry flips unhealthy.
    pub max_error_count: u32,

    /// Cool-down before a recovery probe may be triggered for an unhealthy
    /// entry.
    pub health_check_interval: Duration,

    /// Debounce window for coalesced persistence.
    pub save_debounce_time: Duration,

    /// Logging verbosity.
    pub log_level: LogLevel,

    /// Path to the on-disk pool document.
    pub pool_file_path: PathBuf,

    /// Per-family proxy toggles.
    pub proxy: ProxyFlags,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_error_count = parse_env_or("MAX_ERROR_COUNT", 3)?;
        let health_check_interval_ms: u64 = parse_env_or("HEALTH_CHECK_INTERVAL_MS", 600_000)?;
        let save_debounce_time_ms: u64 = parse_env_or("SAVE_DEBOUNCE_TIME_MS", 1_000)?;

        let log_level = match std::env::var("LOG_LEVEL") {
            Ok(v) => LogLevel::parse(&v)?,
            Err(_) => LogLevel::Info,
        };

        let pool_file_path = std::env::var("PROVIDER_POOLS_FILE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("provider_pools.json"));

        let proxy = ProxyFlags {
            gemini: bool_env("USE_SYSTEM_PROXY_GEMINI"),
            openai: bool_env("USE_SYSTEM_PROXY_OPENAI"),
            claude: bool_env("USE_SYSTEM_PROXY_CLAUDE"),
            qwen: bool_env("USE_SYSTEM_PROXY_QWEN"),
            kiro: bool_env("USE_SYSTEM_PROXY_KIRO"),
        };

        Ok(Self {
            max_error_count,
            health_check_interval: Duration::from_millis(health_check_interval_ms),
            save_debounce_time: Duration::from_millis(save_debounce_time_ms),
            log_level,
            pool_file_path,
            proxy,
        })
    }

    /// Build a config with explicit values (useful for tests).
    pub fn for_test(pool_file_path: PathBuf) -> Self {
        Self {
            max_error_count: 3,
            health_check_interval: Duration::from_millis(600_000),
            save_debounce_time: Duration::from_millis(1_000),
            log_level: LogLevel::Info,
            pool_file_path,
            proxy: ProxyFlags::default(),
        }
    }
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{e}"))),
        Err(_) => Ok(default),
    }
}

fn bool_env(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
