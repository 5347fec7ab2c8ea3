//! Configuration loading for Voxide services
//!
//! Two-tier resolution: a TOML bootstrap file supplies the static
//! configuration, environment variables override individual keys. All
//! values are resolved once at startup and immutable for the life of the
//! process.
//!
//! Priority (highest first):
//! 1. Environment variables (`VOXIDE_*`)
//! 2. TOML configuration file
//! 3. Built-in defaults

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime; the service must restart to
/// pick up changes.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder of the filesystem object store
    ///
    /// If not specified, falls back to the OS-dependent data directory.
    #[serde(default)]
    pub store_root: Option<PathBuf>,

    /// Path to the SQLite database file
    ///
    /// Default: `<store_root>/voxide.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Text-analytics service connection
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Pipeline routing and storage-layout settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Text-analytics service connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Base URL of the text-analytics HTTP API
    #[serde(default = "default_analytics_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// BCP 47 language code passed to every analysis call
    #[serde(default = "default_language_code")]
    pub language_code: String,
}

/// Pipeline routing and storage-layout settings
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Transcripts below this many bytes are analyzed inline; at or above,
    /// three detection jobs are dispatched instead.
    #[serde(default = "default_sync_threshold_bytes")]
    pub sync_threshold_bytes: u64,

    /// Store prefix for consolidated analysis artifacts
    #[serde(default = "default_analysis_prefix")]
    pub analysis_prefix: String,

    /// Store prefix for staged job input text
    #[serde(default = "default_job_input_prefix")]
    pub job_input_prefix: String,

    /// Store prefix for job output artifacts
    #[serde(default = "default_job_output_prefix")]
    pub job_output_prefix: String,

    /// Age in seconds after which an in-flight dispatch record is reported
    /// as stale at startup
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_port() -> u16 {
    5727
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_analytics_url() -> String {
    "http://127.0.0.1:8600".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_sync_threshold_bytes() -> u64 {
    5000
}

fn default_analysis_prefix() -> String {
    "analysis/".to_string()
}

fn default_job_input_prefix() -> String {
    "analysis-input/".to_string()
}

fn default_job_output_prefix() -> String {
    "analysis-output/".to_string()
}

fn default_stale_after_secs() -> u64 {
    86_400
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            store_root: None,
            database_path: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            analytics: AnalyticsConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            base_url: default_analytics_url(),
            request_timeout_secs: default_request_timeout_secs(),
            language_code: default_language_code(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sync_threshold_bytes: default_sync_threshold_bytes(),
            analysis_prefix: default_analysis_prefix(),
            job_input_prefix: default_job_input_prefix(),
            job_output_prefix: default_job_output_prefix(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl TomlConfig {
    /// Resolved object-store root, falling back to the OS data directory.
    pub fn resolved_store_root(&self) -> PathBuf {
        self.store_root
            .clone()
            .unwrap_or_else(default_store_root)
    }

    /// Resolved database path, defaulting to `voxide.db` inside the store
    /// root.
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.resolved_store_root().join("voxide.db"))
    }

    /// Validate values that have no sensible fallback.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.sync_threshold_bytes == 0 {
            return Err(Error::Config(
                "pipeline.sync_threshold_bytes must be greater than zero".to_string(),
            ));
        }
        if self.analytics.base_url.trim().is_empty() {
            return Err(Error::Config(
                "analytics.base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default configuration file path for the platform
/// (`<config dir>/voxide/voxide-ta.toml`), if a config directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("voxide").join("voxide-ta.toml"))
}

/// OS-dependent default store root
fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("voxide").join("store"))
        .unwrap_or_else(|| PathBuf::from("./voxide_store"))
}

/// Load configuration from a TOML file and apply environment overrides.
///
/// An explicitly given `path` must exist; the default path is optional and
/// silently skipped when absent (fresh installs run on defaults).
pub fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let config: TomlConfig = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
            info!("Configuration loaded from {}", path.display());
            config
        }
        None => match default_config_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                let config: TomlConfig = toml::from_str(&content).map_err(|e| {
                    Error::Config(format!("Failed to parse {}: {}", path.display(), e))
                })?;
                info!("Configuration loaded from {}", path.display());
                config
            }
            _ => {
                info!("No configuration file found, using built-in defaults");
                TomlConfig::default()
            }
        },
    };

    apply_env_overrides(&mut config)?;
    normalize_prefixes(&mut config);
    config.validate()?;
    Ok(config)
}

/// Apply `VOXIDE_*` environment overrides on top of the loaded file.
fn apply_env_overrides(config: &mut TomlConfig) -> Result<()> {
    if let Ok(value) = std::env::var("VOXIDE_STORE_ROOT") {
        info!("store_root overridden from environment");
        config.store_root = Some(PathBuf::from(value));
    }
    if let Ok(value) = std::env::var("VOXIDE_DATABASE_PATH") {
        info!("database_path overridden from environment");
        config.database_path = Some(PathBuf::from(value));
    }
    if let Ok(value) = std::env::var("VOXIDE_PORT") {
        config.port = value
            .parse()
            .map_err(|_| Error::Config(format!("VOXIDE_PORT is not a valid port: {}", value)))?;
        info!("port overridden from environment");
    }
    if let Ok(value) = std::env::var("VOXIDE_ANALYTICS_URL") {
        info!("analytics.base_url overridden from environment");
        config.analytics.base_url = value;
    }
    if let Ok(value) = std::env::var("VOXIDE_LANGUAGE_CODE") {
        info!("analytics.language_code overridden from environment");
        config.analytics.language_code = value;
    }
    if let Ok(value) = std::env::var("VOXIDE_SYNC_THRESHOLD_BYTES") {
        config.pipeline.sync_threshold_bytes = value.parse().map_err(|_| {
            Error::Config(format!(
                "VOXIDE_SYNC_THRESHOLD_BYTES is not a valid byte count: {}",
                value
            ))
        })?;
        info!("pipeline.sync_threshold_bytes overridden from environment");
    }
    Ok(())
}

/// Storage prefixes are joined to keys by plain concatenation; make sure
/// each ends with exactly one `/`.
fn normalize_prefixes(config: &mut TomlConfig) {
    for prefix in [
        &mut config.pipeline.analysis_prefix,
        &mut config.pipeline.job_input_prefix,
        &mut config.pipeline.job_output_prefix,
    ] {
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
    }
}
