//! Process configuration.
//!
//! # Environment Variables
//!
//! - `HOST`: bind address (default: `127.0.0.1`)
//! - `PORT`: bind port (default: `3000`)
//! - `CACHE_REVALIDATE_SECONDS`: data cache window for task lists (default: `15`)

use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CACHE_REVALIDATE_SECONDS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid PORT value: {0}")]
    InvalidPort(String),

    #[error("invalid CACHE_REVALIDATE_SECONDS value: {0} (expected a positive number of seconds)")]
    InvalidRevalidateSeconds(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cache_revalidate_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cache_revalidate_seconds: DEFAULT_CACHE_REVALIDATE_SECONDS,
        }
    }
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if `PORT` or `CACHE_REVALIDATE_SECONDS` is set
    /// but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source. Unset and blank values take the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = read("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match read("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidPort(value))?,
            None => DEFAULT_PORT,
        };

        let cache_revalidate_seconds = match read("CACHE_REVALIDATE_SECONDS") {
            Some(value) => match value.parse::<u64>() {
                Ok(seconds) if seconds > 0 => seconds,
                _ => return Err(ConfigError::InvalidRevalidateSeconds(value)),
            },
            None => DEFAULT_CACHE_REVALIDATE_SECONDS,
        };

        Ok(Self {
            host,
            port,
            cache_revalidate_seconds,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_revalidate_seconds)
    }
}
