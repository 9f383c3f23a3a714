//! Configuration management for sitescribe
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files. Command-line flags override individual values in `main`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::parser::clean::DEFAULT_BOILERPLATE_PHRASES;

/// Sitemap used when none is configured
pub const DEFAULT_SITEMAP_URL: &str = "https://productschool.com/sitemap.xml";

/// Directory prefixes used when none are configured
pub const DEFAULT_DIRECTORIES: &[&str] = &["/blog/", "/resources/"];

/// Seconds between consecutive page dispatches
pub const DEFAULT_RATE_LIMIT_SECS: u64 = 10;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sitemap and fetch configuration
    pub scraper: ScraperConfig,

    /// PDF renderer configuration
    pub render: RenderConfig,

    /// Storage locations
    pub storage: StorageConfig,

    /// Text cleaning configuration
    pub cleaner: CleanerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Sitemap and fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Sitemap URL
    pub sitemap_url: String,

    /// Path prefixes to keep (empty keeps everything)
    pub directories: Vec<String>,

    /// Seconds between consecutive requests
    pub rate_limit_secs: u64,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds
    pub retry_base_delay_ms: u64,

    /// User agent string
    pub user_agent: String,
}

/// PDF renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Path or name of the wkhtmltopdf binary
    pub wkhtmltopdf_path: PathBuf,

    /// Seconds before a render is killed
    pub timeout_secs: u64,

    /// Extra arguments passed before the URL
    pub extra_args: Vec<String>,
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,

    /// Artifact root directory
    pub pages_dir: PathBuf,
}

/// Text cleaning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Phrases removed from cleaned text
    pub boilerplate_phrases: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            sitemap_url: DEFAULT_SITEMAP_URL.to_string(),
            directories: DEFAULT_DIRECTORIES.iter().map(|d| d.to_string()).collect(),
            rate_limit_secs: DEFAULT_RATE_LIMIT_SECS,
            request_timeout_secs: 15,
            max_retries: 3,
            retry_base_delay_ms: 2_000,
            user_agent: format!("sitescribe/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            wkhtmltopdf_path: PathBuf::from("wkhtmltopdf"),
            timeout_secs: 120,
            extra_args: vec!["--quiet".to_string()],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data.db"),
            pages_dir: PathBuf::from("pages"),
        }
    }
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            boilerplate_phrases: DEFAULT_BOILERPLATE_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            render: RenderConfig::default(),
            storage: StorageConfig::default(),
            cleaner: CleanerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("SITESCRIBE_SITEMAP_URL") {
            config.scraper.sitemap_url = url;
        }
        if let Ok(dirs) = std::env::var("SITESCRIBE_DIRECTORIES") {
            config.scraper.directories = dirs
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(secs) = env_parse("SITESCRIBE_RATE_LIMIT_SECS") {
            config.scraper.rate_limit_secs = secs;
        }
        if let Some(secs) = env_parse("SITESCRIBE_REQUEST_TIMEOUT") {
            config.scraper.request_timeout_secs = secs;
        }
        if let Some(retries) = env_parse("SITESCRIBE_MAX_RETRIES") {
            config.scraper.max_retries = retries;
        }
        if let Ok(agent) = std::env::var("SITESCRIBE_USER_AGENT") {
            config.scraper.user_agent = agent;
        }
        if let Ok(path) = std::env::var("SITESCRIBE_WKHTMLTOPDF") {
            config.render.wkhtmltopdf_path = path.into();
        }
        if let Some(secs) = env_parse("SITESCRIBE_RENDER_TIMEOUT") {
            config.render.timeout_secs = secs;
        }
        if let Ok(path) = std::env::var("SITESCRIBE_SQLITE_PATH") {
            config.storage.sqlite_path = path.into();
        }
        if let Ok(path) = std::env::var("SITESCRIBE_PAGES_DIR") {
            config.storage.pages_dir = path.into();
        }
        if let Ok(level) = std::env::var("SITESCRIBE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("SITESCRIBE_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
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
        if self.scraper.sitemap_url.trim().is_empty() {
            anyhow::bail!("sitemap_url must not be empty");
        }

        if self.scraper.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.render.timeout_secs == 0 {
            anyhow::bail!("render timeout_secs must be greater than 0");
        }

        if self.storage.pages_dir.as_os_str().is_empty() {
            anyhow::bail!("pages_dir must not be empty");
        }

        Ok(())
    }

    /// Get the interval between dispatches as Duration
    #[must_use]
    pub fn rate_interval(&self) -> Duration {
        Duration::from_secs(self.scraper.rate_limit_secs)
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.scraper.request_timeout_secs)
    }
}
