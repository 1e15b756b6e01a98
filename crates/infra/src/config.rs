//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use pourline_observability::LogFormat;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },
}

impl ConfigError {
    fn invalid(var: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Invalid { var, message: message.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Unset means the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub heartbeat_interval: Duration,
    pub db_max_connections: u32,
    pub log_format: LogFormat,
    /// Explicit override; see [`AppConfig::seed_demo_catalog`].
    pub seed_demo: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            heartbeat_interval: Duration::from_secs(30),
            db_max_connections: 5,
            log_format: LogFormat::Json,
            seed_demo: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let bind_addr = match get("BIND_ADDR") {
            Some(v) => v.parse().map_err(|e| ConfigError::invalid("BIND_ADDR", e))?,
            None => defaults.bind_addr,
        };

        let heartbeat_interval = match get("HEARTBEAT_INTERVAL_SECS") {
            Some(v) => {
                let secs: u64 = v.parse().map_err(|e| ConfigError::invalid("HEARTBEAT_INTERVAL_SECS", e))?;
                if secs == 0 {
                    return Err(ConfigError::invalid("HEARTBEAT_INTERVAL_SECS", "must be at least 1"));
                }
                Duration::from_secs(secs)
            }
            None => defaults.heartbeat_interval,
        };

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => {
                let n: u32 = v.parse().map_err(|e| ConfigError::invalid("DB_MAX_CONNECTIONS", e))?;
                if n == 0 {
                    return Err(ConfigError::invalid("DB_MAX_CONNECTIONS", "must be at least 1"));
                }
                n
            }
            None => defaults.db_max_connections,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(v) => v.parse().map_err(|e| ConfigError::invalid("LOG_FORMAT", e))?,
            None => defaults.log_format,
        };

        let seed_demo = get("SEED_DEMO_CATALOG")
            .map(|v| parse_bool(&v).ok_or_else(|| ConfigError::invalid("SEED_DEMO_CATALOG", format!("`{v}` is not a boolean"))))
            .transpose()?;

        Ok(Self {
            database_url: get("DATABASE_URL"),
            bind_addr,
            heartbeat_interval,
            db_max_connections,
            log_format,
            seed_demo,
        })
    }

    /// Seeding defaults to on for the in-memory store and off for Postgres.
    pub fn seed_demo_catalog(&self) -> bool {
        self.seed_demo.unwrap_or(self.database_url.is_none())
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
