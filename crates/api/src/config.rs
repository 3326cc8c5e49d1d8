//! Application configuration loaded from environment variables.

use std::time::Duration;

use application::ExpirySettings;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON lines, anything else for text
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `EXPIRY_SWEEP_INTERVAL_SECS`: reservation sweep period (default: `60`)
/// - `EXPIRY_WARNING_WINDOW_SECS`: expiring-soon horizon (default: `900`)
/// - `EXPIRY_BATCH_SIZE`: reservations per sweep (default: `100`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub expiry_sweep_interval: Duration,
    pub expiry_warning_window: Duration,
    pub expiry_batch_size: usize,
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match std::env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            expiry_sweep_interval: parsed("EXPIRY_SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.expiry_sweep_interval),
            expiry_warning_window: parsed("EXPIRY_WARNING_WINDOW_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.expiry_warning_window),
            expiry_batch_size: parsed("EXPIRY_BATCH_SIZE").unwrap_or(defaults.expiry_batch_size),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn expiry_settings(&self) -> ExpirySettings {
        ExpirySettings {
            interval: self.expiry_sweep_interval,
            warning_window: chrono::Duration::from_std(self.expiry_warning_window)
                .unwrap_or_else(|_| chrono::Duration::minutes(15)),
            batch_size: self.expiry_batch_size.max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            expiry_sweep_interval: Duration::from_secs(60),
            expiry_warning_window: Duration::from_secs(900),
            expiry_batch_size: 100,
        }
    }
}
