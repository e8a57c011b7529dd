//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub subject: SubjectConfig,
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// The single account whose data is served
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectConfig {
    /// Upstream username; scopes every cache key
    pub username: String,
}

/// Key/value store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite file path (required for the sqlite backend)
    pub path: Option<PathBuf>,
    /// Interval between expired-record sweeps in seconds
    #[serde(default = "default_purge_interval_seconds")]
    pub purge_interval_seconds: u64,
}

/// Store backend selector
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

fn default_purge_interval_seconds() -> u64 {
    600
}

/// Snapshot cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Store TTL for dataset records (default: 86400)
    pub data_ttl_seconds: u64,
    /// Age after which the snapshot is stale and may be refreshed (default: 3600)
    pub max_age_seconds: u64,
}

impl CacheConfig {
    pub fn data_ttl(&self) -> Duration {
        Duration::from_secs(self.data_ttl_seconds)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }
}

/// Refresh coordination configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// Endpoint that starts the external fetch job
    pub job_url: Option<String>,
    /// URL the job should call back when it finishes
    pub callback_url: Option<String>,
    /// Shared secret the job presents as a bearer token on callbacks
    pub callback_token: Option<String>,
    /// Lifetime of the `running` status before it is presumed dead (default: 300)
    pub running_ttl_seconds: u64,
    /// Lifetime of `complete`/`error` statuses (default: 60)
    pub outcome_ttl_seconds: u64,
    /// Timeout for dispatching the job (default: 10)
    pub dispatch_timeout_seconds: u64,
}

impl RefreshConfig {
    pub fn running_ttl(&self) -> Duration {
        Duration::from_secs(self.running_ttl_seconds)
    }

    pub fn outcome_ttl(&self) -> Duration {
        Duration::from_secs(self.outcome_ttl_seconds)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_seconds)
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
    /// 4. Environment variables (COOLFOLLOWERS__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("store.backend", "memory")?
            .set_default("store.purge_interval_seconds", 600)?
            .set_default("cache.data_ttl_seconds", 86400)?
            .set_default("cache.max_age_seconds", 3600)?
            .set_default("refresh.running_ttl_seconds", 300)?
            .set_default("refresh.outcome_ttl_seconds", 60)?
            .set_default("refresh.dispatch_timeout_seconds", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("COOLFOLLOWERS")
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

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.subject.username.trim().is_empty() {
            return Err(AppError::Config(
                "subject.username must not be empty".to_string(),
            ));
        }

        if self.cache.max_age_seconds == 0 {
            return Err(AppError::Config(
                "cache.max_age_seconds must be greater than 0".to_string(),
            ));
        }

        // Datasets must outlive the staleness window, otherwise a fresh marker
        // could point at evicted data.
        if self.cache.data_ttl_seconds < self.cache.max_age_seconds {
            return Err(AppError::Config(format!(
                "cache.data_ttl_seconds ({}) must be at least cache.max_age_seconds ({})",
                self.cache.data_ttl_seconds, self.cache.max_age_seconds
            )));
        }

        if self.refresh.running_ttl_seconds == 0 || self.refresh.outcome_ttl_seconds == 0 {
            return Err(AppError::Config(
                "refresh.running_ttl_seconds and refresh.outcome_ttl_seconds must be greater than 0"
                    .to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Sqlite && self.store.path.is_none() {
            return Err(AppError::Config(
                "store.path is required when store.backend=sqlite".to_string(),
            ));
        }

        if let Some(job_url) = &self.refresh.job_url {
            url::Url::parse(job_url)
                .map_err(|e| AppError::Config(format!("refresh.job_url is invalid: {e}")))?;
        }

        if self.refresh.job_url.is_none() {
            tracing::warn!("refresh.job_url is not set; refresh requests will fail to dispatch");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            subject: SubjectConfig {
                username: "anipottsbuilds".to_string(),
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                path: None,
                purge_interval_seconds: 600,
            },
            cache: CacheConfig {
                data_ttl_seconds: 86_400,
                max_age_seconds: 3_600,
            },
            refresh: RefreshConfig {
                job_url: Some("http://127.0.0.1:9000/api/ig-refresh".to_string()),
                callback_url: None,
                callback_token: None,
                running_ttl_seconds: 300,
                outcome_ttl_seconds: 60,
                dispatch_timeout_seconds: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_data_ttl_shorter_than_max_age() {
        let mut config = valid_config();
        config.cache.data_ttl_seconds = 60;

        let error = config
            .validate()
            .expect_err("data TTL below max age must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("cache.data_ttl_seconds")
        ));
    }

    #[test]
    fn validate_rejects_sqlite_without_path() {
        let mut config = valid_config();
        config.store.backend = StoreBackend::Sqlite;

        let error = config
            .validate()
            .expect_err("sqlite backend needs a path");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("store.path")
        ));
    }

    #[test]
    fn validate_rejects_blank_subject() {
        let mut config = valid_config();
        config.subject.username = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_job_url() {
        let mut config = valid_config();
        config.refresh.job_url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }
}
