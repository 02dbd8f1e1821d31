//! Configuration module for the tender backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Upper bound of pooled SQLite connections
    pub db_max_connections: u32,
    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse(
            "SERVER_ADDRESS",
            lookup("SERVER_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        )?;

        let db_path = lookup("TENDER_DB_PATH")
            .unwrap_or_else(|| "./data/tenders.sqlite".to_string())
            .into();

        let db_max_connections = parse(
            "TENDER_DB_MAX_CONNECTIONS",
            lookup("TENDER_DB_MAX_CONNECTIONS").unwrap_or_else(|| "5".to_string()),
        )?;

        let log_level = lookup("TENDER_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_format = match lookup("TENDER_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "TENDER_LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected text or json".to_string(),
                })
            }
        };

        Ok(Self {
            bind_addr,
            db_path,
            db_max_connections,
            log_level,
            log_format,
        })
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}
