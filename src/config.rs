//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub connectivity: ConnectivityConfig,
    pub cache: CacheConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

/// Local store configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Remote spreadsheet store configuration
///
/// Credentials are supplied from outside (secret store or environment);
/// the store is unavailable when either of them is missing.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// REST API root (e.g., "https://sheets.googleapis.com/v4")
    pub base_url: String,
    /// Spreadsheet holding one worksheet per table
    pub spreadsheet_id: Option<String>,
    /// OAuth bearer token
    pub access_token: Option<String>,
    /// Per-request timeout in seconds (default: 30)
    pub request_timeout_seconds: u64,
    /// Attempts per remote operation (default: 3)
    pub max_attempts: u32,
    /// Sleep between attempts in milliseconds (default: 1000)
    pub retry_backoff_ms: u64,
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Connectivity probe configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
    /// Host and port to open a TCP connection to (default: "8.8.8.8:53")
    pub target: String,
    /// Connect timeout in milliseconds (default: 1000)
    pub timeout_ms: u64,
    /// How long a probe result is reused, in seconds (default: 30)
    pub ttl_seconds: u64,
}

impl ConnectivityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Record cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Table snapshot TTL in seconds (default: 60)
    pub ttl_seconds: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Seed administrator written into a freshly created Users table
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Admin username (default: "admin")
    #[serde(default = "default_admin_username")]
    pub username: String,
    /// Admin password (default: "admin")
    #[serde(default = "default_admin_password")]
    pub password: String,
    /// Admin role (default: "Admin")
    #[serde(default = "default_admin_role")]
    pub role: String,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin".to_string()
}

fn default_admin_role() -> String {
    "Admin".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: default_admin_password(),
            role: default_admin_role(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (ROLLBOOK__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("database.path", "data/rollbook.db")?
            .set_default("remote.base_url", "https://sheets.googleapis.com/v4")?
            .set_default("remote.request_timeout_seconds", 30)?
            .set_default("remote.max_attempts", 3)?
            .set_default("remote.retry_backoff_ms", 1000)?
            .set_default("connectivity.target", "8.8.8.8:53")?
            .set_default("connectivity.timeout_ms", 1000)?
            .set_default("connectivity.ttl_seconds", 30)?
            .set_default("cache.ttl_seconds", 60)?
            .set_default("admin.username", "admin")?
            .set_default("admin.password", "admin")?
            .set_default("admin.role", "Admin")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("ROLLBOOK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Whether remote credentials are present at all
    pub fn has_remote_credentials(&self) -> bool {
        non_empty(self.remote.spreadsheet_id.as_deref()).is_some()
            && non_empty(self.remote.access_token.as_deref()).is_some()
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.remote.max_attempts == 0 {
            return Err(AppError::Config(
                "remote.max_attempts must be greater than 0".to_string(),
            ));
        }

        if url::Url::parse(&self.remote.base_url).is_err() {
            return Err(AppError::Config(format!(
                "remote.base_url is not a valid URL: {}",
                self.remote.base_url
            )));
        }

        if self.connectivity.target.parse::<SocketAddr>().is_err()
            && self.connectivity.target.rsplit_once(':').is_none()
        {
            return Err(AppError::Config(format!(
                "connectivity.target must be host:port, got {}",
                self.connectivity.target
            )));
        }

        if self.admin.username.trim().is_empty() {
            return Err(AppError::Config(
                "admin.username must not be empty".to_string(),
            ));
        }

        if !self.has_remote_credentials() {
            tracing::warn!("Remote store credentials not configured; running local-only");
        }

        Ok(())
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
pub(crate) fn test_config(db_path: PathBuf) -> AppConfig {
    AppConfig {
        database: DatabaseConfig { path: db_path },
        remote: RemoteConfig {
            base_url: "https://sheets.googleapis.com/v4".to_string(),
            spreadsheet_id: None,
            access_token: None,
            request_timeout_seconds: 5,
            max_attempts: 3,
            retry_backoff_ms: 1,
        },
        connectivity: ConnectivityConfig {
            target: "127.0.0.1:9".to_string(),
            timeout_ms: 50,
            ttl_seconds: 30,
        },
        cache: CacheConfig { ttl_seconds: 60 },
        admin: AdminConfig::default(),
        logging: LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}
