//! Configuration management for Searchlight.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `$SEARCHLIGHT_CONFIG` when set, otherwise from
/// `~/.config/searchlight/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Audit batch runner settings
    pub runner: RunnerConfig,
    /// Crawler behavior settings
    pub crawler: CrawlerConfig,
    /// LLM integration settings (GEO audits)
    pub llm: LlmConfig,
    /// Session and invite settings
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - `SEARCHLIGHT_CONFIG` names a file that does not exist
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        if let Ok(explicit) = std::env::var("SEARCHLIGHT_CONFIG") {
            let path = PathBuf::from(explicit);
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.display().to_string(),
                });
            }
            return Self::load_from(&path);
        }

        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides, then validate.
    ///
    /// Supports the following environment variables:
    /// - `SEARCHLIGHT_BIND`: Override the server bind address
    /// - `SEARCHLIGHT_DATABASE_URL`: Override the database URL
    /// - `SEARCHLIGHT_CONTINUATION_SECRET`: Shared secret for batch continuation calls
    /// - `SEARCHLIGHT_LLM_API_KEY`: API key for the configured LLM provider
    /// - `SEARCHLIGHT_STALE_MINUTES`: Override the staleness threshold
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SEARCHLIGHT_BIND") {
            tracing::debug!("Override server.bind from env: {}", val);
            self.server.bind = val;
        }

        if let Ok(val) = std::env::var("SEARCHLIGHT_DATABASE_URL") {
            tracing::debug!("Override database.url from env");
            self.database.url = val;
        }

        if let Ok(val) = std::env::var("SEARCHLIGHT_CONTINUATION_SECRET") {
            if !val.is_empty() {
                self.server.continuation_secret = Some(val);
            }
        }

        if let Ok(val) = std::env::var("SEARCHLIGHT_LLM_API_KEY") {
            if !val.is_empty() {
                self.llm.api_key = Some(val);
            }
        }

        if let Ok(val) = std::env::var("SEARCHLIGHT_STALE_MINUTES") {
            if let Ok(minutes) = val.parse() {
                self.runner.stale_after_minutes = minutes;
                tracing::debug!("Override runner.stale_after_minutes from env: {}", minutes);
            }
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.runner.batch_size == 0 {
            return Err(invalid("runner.batch_size", "must be greater than zero"));
        }
        if self.runner.safety_margin_secs >= self.runner.time_budget_secs {
            return Err(invalid(
                "runner.safety_margin_secs",
                "must be smaller than runner.time_budget_secs",
            ));
        }
        if self.runner.continuation_grace_secs >= self.runner.stale_after_minutes * 60 {
            return Err(invalid(
                "runner.continuation_grace_secs",
                "must be shorter than the staleness threshold",
            ));
        }
        if self.crawler.concurrency == 0 {
            return Err(invalid("crawler.concurrency", "must be greater than zero"));
        }
        if self.llm.geo_chunk_size == 0 {
            return Err(invalid("llm.geo_chunk_size", "must be greater than zero"));
        }
        Ok(())
    }

    /// Save configuration to the default location.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/searchlight/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "searchlight", "searchlight")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/searchlight`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "searchlight", "searchlight")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,
    /// Externally reachable base URL, used for continuation calls
    pub public_base_url: String,
    /// Shared secret required on `/continue` calls (env only, never serialized)
    #[serde(skip)]
    pub continuation_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            public_base_url: "http://127.0.0.1:8080".to_string(),
            continuation_secret: None,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL
    pub url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:searchlight.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

/// Audit batch runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Maximum pages crawled per batch invocation
    pub batch_size: u32,
    /// Wall-clock budget of one batch invocation in seconds
    pub time_budget_secs: u64,
    /// No new page fetch starts within this many seconds of the budget
    pub safety_margin_secs: u64,
    /// In-progress audits idle this long are failed
    pub stale_after_minutes: u64,
    /// Claimable audits idle this long get their continuation re-armed
    pub continuation_grace_secs: u64,
    /// Interval between background sweeps
    pub sweep_interval_secs: u64,
}

impl RunnerConfig {
    /// Batch time budget as a `Duration`.
    #[must_use]
    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }

    /// Safety margin as a `Duration`.
    #[must_use]
    pub fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.safety_margin_secs)
    }

    /// Staleness threshold as a `Duration`.
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_minutes * 60)
    }

    /// Continuation grace as a `Duration`.
    #[must_use]
    pub fn continuation_grace(&self) -> Duration {
        Duration::from_secs(self.continuation_grace_secs)
    }

    /// Sweep interval as a `Duration`.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            time_budget_secs: 50,
            safety_margin_secs: 10,
            stale_after_minutes: 10,
            continuation_grace_secs: 120,
            sweep_interval_secs: 60,
        }
    }
}

/// Crawler behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// User agent string
    pub user_agent: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Concurrent fetches within one batch
    pub concurrency: usize,
    /// Attempts per page for transient failures
    pub max_retries: u32,
    /// Base delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Page cap used when an audit request does not specify one
    pub default_max_pages: u32,
    /// Maximum link depth from the target URL
    pub max_depth: u32,
    /// Maximum redirects followed per request
    pub max_redirects: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: "SearchlightBot/0.1 (+https://github.com/searchlight-audits/searchlight)"
                .to_string(),
            timeout_secs: 15,
            concurrency: 4,
            max_retries: 3,
            retry_delay_ms: 1000,
            default_max_pages: 50,
            max_depth: 3,
            max_redirects: 5,
        }
    }
}

/// LLM integration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Whether GEO audits may call an LLM
    pub enabled: bool,
    /// Provider: `anthropic` or `openai`
    pub provider: String,
    /// Model override; provider default when unset
    pub model: Option<String>,
    /// API key (env only, never serialized)
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Maximum tokens for completions
    pub max_tokens: u32,
    /// Temperature for completions
    pub temperature: f32,
    /// Pages sent per GEO prompt
    pub geo_chunk_size: usize,
    /// Characters of page text included per page
    pub excerpt_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "anthropic".to_string(),
            model: None,
            api_key: None,
            max_tokens: 4096,
            temperature: 0.2,
            geo_chunk_size: 5,
            excerpt_chars: 2000,
        }
    }
}

/// Session and invite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of bearer sessions in hours
    pub session_ttl_hours: i64,
    /// Lifetime of team invites in days
    pub invite_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 72,
            invite_ttl_days: 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.runner.batch_size, 10);
        assert_eq!(config.runner.stale_after_minutes, 10);
        assert_eq!(config.crawler.concurrency, 4);
        assert!(!config.llm.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_skips_secrets() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-secret".to_string());
        config.server.continuation_secret = Some("hunter2".to_string());

        let toml_str = toml::to_string_pretty(&config).expect("serialize config");
        assert!(toml_str.contains("[runner]"));
        assert!(toml_str.contains("[crawler]"));
        assert!(!toml_str.contains("sk-secret"));
        assert!(!toml_str.contains("hunter2"));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.runner.batch_size = 25;
        config.crawler.max_depth = 5;
        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.runner.batch_size, 25);
        assert_eq!(loaded.crawler.max_depth, 5);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[runner]
batch_size = 4

[llm]
enabled = true
provider = "openai"
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.runner.batch_size, 4);
        assert!(config.llm.enabled);
        assert_eq!(config.llm.provider, "openai");
        // These should be defaults
        assert_eq!(config.runner.time_budget_secs, 50);
        assert_eq!(config.crawler.concurrency, 4);
    }

    #[test]
    fn test_validate_rejects_margin_beyond_budget() {
        let mut config = AppConfig::default();
        config.runner.safety_margin_secs = config.runner.time_budget_secs;
        let err = config.validate().expect_err("margin must be rejected");
        assert!(err.to_string().contains("runner.safety_margin_secs"));
    }

    #[test]
    fn test_validate_rejects_grace_beyond_staleness() {
        let mut config = AppConfig::default();
        config.runner.stale_after_minutes = 1;
        config.runner.continuation_grace_secs = 90;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = AppConfig::default();
        config.runner.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_runner_durations() {
        let runner = RunnerConfig::default();
        assert_eq!(runner.stale_after(), Duration::from_secs(600));
        assert_eq!(runner.time_budget(), Duration::from_secs(50));
        assert_eq!(runner.continuation_grace(), Duration::from_secs(120));
    }
}
