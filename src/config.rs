//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::error::ReportError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Search query submitted to the marketplace
    #[serde(default = "default_query")]
    pub query: String,

    /// Marketplace base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Number of search pages to inspect
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum pages fetched at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Extra attempts after a transient fetch failure
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Initial retry backoff, doubled on every attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Timeout for a single fetch attempt
    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    /// Overall run deadline; pages still in flight when it expires are abandoned
    #[serde(default)]
    pub deadline_ms: Option<u64>,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Base delay before each request in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Random jitter added to delay (0 to this value)
    #[serde(default = "default_delay_jitter_ms")]
    pub delay_jitter_ms: u64,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_query() -> String {
    "ice roller".to_string()
}

fn default_base_url() -> String {
    "https://www.daraz.com.bd".to_string()
}

fn default_max_pages() -> u32 {
    3
}

fn default_concurrency() -> usize {
    3
}

fn default_retry_budget() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_page_timeout_ms() -> u64 {
    30_000
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_delay_jitter_ms() -> u64 {
    1500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query: default_query(),
            base_url: default_base_url(),
            max_pages: default_max_pages(),
            concurrency: default_concurrency(),
            retry_budget: default_retry_budget(),
            retry_backoff_ms: default_retry_backoff_ms(),
            page_timeout_ms: default_page_timeout_ms(),
            deadline_ms: None,
            proxy: None,
            delay_ms: default_delay_ms(),
            delay_jitter_ms: default_delay_jitter_ms(),
            format: OutputFormat::Table,
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("config.toml");
        if local_config.exists() {
            debug!("Found config.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("daraz-report").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(query) = std::env::var("DARAZ_QUERY") {
            if !query.trim().is_empty() {
                self.query = query;
            }
        }

        if let Ok(proxy) = std::env::var("DARAZ_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(delay) = std::env::var("DARAZ_DELAY") {
            if let Ok(d) = delay.parse() {
                self.delay_ms = d;
            }
        }

        if let Ok(pages) = std::env::var("DARAZ_MAX_PAGES") {
            if let Ok(p) = pages.parse() {
                self.max_pages = p;
            }
        }

        if let Ok(concurrency) = std::env::var("DARAZ_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.concurrency = c;
            }
        }

        self
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.query.trim().is_empty() {
            return Err(ReportError::InvalidConfig("query must not be empty".into()));
        }
        if self.max_pages == 0 {
            return Err(ReportError::InvalidConfig("max_pages must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(ReportError::InvalidConfig("concurrency must be at least 1".into()));
        }
        if self.page_timeout_ms == 0 {
            return Err(ReportError::InvalidConfig("page_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown format: {}. Use: table, json, markdown", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}
