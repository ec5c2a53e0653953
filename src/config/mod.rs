//! Configuration management for fleetsync
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. Command-line overrides are applied by the binary.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::api::Environment;
use crate::models::SynchronizationSettings;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source-of-truth environment
    pub master: EnvironmentConfig,

    /// Environment brought into agreement with master
    pub target: EnvironmentConfig,

    /// Synchronization window and run options
    pub sync: SyncConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection details for one scheduling API instance
#[derive(Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Base URL, e.g. `https://api.example.com`
    pub base_url: String,

    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,
}

impl std::fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Synchronization options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// First day of the window (inclusive)
    pub start_date: NaiveDate,

    /// Last day of the window (inclusive)
    pub end_date: NaiveDate,

    /// Compute diffs only
    #[serde(default)]
    pub dry_run: bool,

    /// Batch size (kept for compatibility with existing config files)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Resources reconciled concurrently
    #[serde(default = "default_max_concurrent_resources")]
    pub max_concurrent_resources: usize,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: format!("fleetsync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_max_concurrent_resources() -> usize {
    1
}

fn env_environment(prefix: &str) -> Result<EnvironmentConfig> {
    let var = |suffix: &str| {
        let key = format!("FLEETSYNC_{prefix}_{suffix}");
        std::env::var(&key).with_context(|| format!("Missing environment variable {key}"))
    };

    Ok(EnvironmentConfig {
        base_url: var("URL")?,
        client_id: var("CLIENT_ID")?,
        client_secret: var("CLIENT_SECRET")?,
    })
}

fn env_date(key: &str) -> Result<Option<NaiveDate>> {
    match std::env::var(key) {
        Ok(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .map(Some)
            .with_context(|| format!("{key} must be a YYYY-MM-DD date, got {value:?}")),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Credentials are required; the window defaults to the current
    /// calendar year when `FLEETSYNC_START_DATE`/`FLEETSYNC_END_DATE` are unset.
    pub fn from_env() -> Result<Self> {
        let master = env_environment("MASTER")?;
        let target = env_environment("TARGET")?;

        let year = SynchronizationSettings::full_year(chrono::Utc::now().date_naive());
        let start_date = env_date("FLEETSYNC_START_DATE")?.unwrap_or(year.start_date);
        let end_date = env_date("FLEETSYNC_END_DATE")?.unwrap_or(year.end_date);

        let dry_run = std::env::var("FLEETSYNC_DRY_RUN")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        let batch_size = std::env::var("FLEETSYNC_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or_else(default_batch_size);

        let max_concurrent_resources = std::env::var("FLEETSYNC_MAX_CONCURRENT_RESOURCES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or_else(default_max_concurrent_resources);

        let request_timeout_secs = std::env::var("FLEETSYNC_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let log_level =
            std::env::var("FLEETSYNC_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let log_format =
            std::env::var("FLEETSYNC_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            master,
            target,
            sync: SyncConfig {
                start_date,
                end_date,
                dry_run,
                batch_size,
                max_concurrent_resources,
            },
            http: HttpConfig {
                request_timeout_secs,
                ..HttpConfig::default()
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, env) in [("master", &self.master), ("target", &self.target)] {
            let url = Url::parse(&env.base_url)
                .with_context(|| format!("{name}.base_url is not a valid URL"))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("{name}.base_url must use http or https");
            }
            if env.client_id.trim().is_empty() {
                anyhow::bail!("{name}.client_id must not be empty");
            }
        }

        if self.master.base_url.trim_end_matches('/') == self.target.base_url.trim_end_matches('/')
        {
            anyhow::bail!("master and target must be different environments");
        }

        if self.sync.start_date > self.sync.end_date {
            anyhow::bail!("start_date must not be after end_date");
        }

        if self.sync.batch_size == 0 {
            anyhow::bail!("batch_size must be greater than 0");
        }

        if self.sync.max_concurrent_resources == 0 {
            anyhow::bail!("max_concurrent_resources must be greater than 0");
        }

        if self.http.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }

    /// Settings handed to the orchestrator
    #[must_use]
    pub fn settings(&self) -> SynchronizationSettings {
        SynchronizationSettings {
            start_date: self.sync.start_date,
            end_date: self.sync.end_date,
            dry_run: self.sync.dry_run,
            batch_size: self.sync.batch_size,
            max_concurrent_resources: self.sync.max_concurrent_resources,
        }
    }

    /// Master environment descriptor
    #[must_use]
    pub fn master_environment(&self) -> Environment {
        Environment::from_config("master", &self.master)
    }

    /// Target environment descriptor
    #[must_use]
    pub fn target_environment(&self) -> Environment {
        Environment::from_config("target", &self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[master]
base_url = "https://master.example.com"
client_id = "master-client"
client_secret = "master-secret"

[target]
base_url = "https://target.example.com"
client_id = "target-client"
client_secret = "target-secret"

[sync]
start_date = "2025-01-01"
end_date = "2025-03-31"
dry_run = true
"#;

    fn sample() -> Config {
        toml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.batch_size, 100);
        assert_eq!(config.sync.max_concurrent_resources, 1);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_settings_conversion() {
        let settings = sample().settings();
        assert!(settings.dry_run);
        assert_eq!(settings.start_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(settings.end_date, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    }

    #[test]
    fn test_example_config_is_valid() {
        let config: Config =
            toml::from_str(include_str!("../../fleetsync.example.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.request_timeout_secs, 30);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let mut config = sample();
        config.sync.start_date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_environment_rejected() {
        let mut config = sample();
        config.target.base_url = "https://master.example.com/".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let mut config = sample();
        config.master.base_url = "ftp://master.example.com".into();
        assert!(config.validate().is_err());

        config.master.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = sample();
        config.sync.max_concurrent_resources = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", sample().master);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("master-secret"));
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = sample();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
