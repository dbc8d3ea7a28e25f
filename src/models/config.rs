//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Page fetching behavior
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Notification transport settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Cycle scheduling and diffing
    #[serde(default)]
    pub cycle: CycleConfig,

    /// Resource store backend
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Overlay secrets and endpoints from environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.notifier.keyword_bot_token = Some(token);
        }
        if let Some(token) = non_empty("TELEGRAM_UPDATES_BOT_TOKEN") {
            self.notifier.updates_bot_token = Some(token);
        }
        if let Some(url) = non_empty("SUPABASE_URL") {
            self.store.supabase_url = Some(url);
        }
        if let Some(key) = non_empty("SUPABASE_KEY") {
            self.store.supabase_key = Some(key);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.notifier.timeout_secs == 0 {
            return Err(AppError::validation("notifier.timeout_secs must be > 0"));
        }
        if url::Url::parse(&self.notifier.api_base).is_err() {
            return Err(AppError::validation(format!(
                "notifier.api_base is not a valid URL: {}",
                self.notifier.api_base
            )));
        }
        if self.cycle.interval_secs == 0 {
            return Err(AppError::validation("cycle.interval_secs must be > 0"));
        }
        if self.logging.level.trim().parse::<log::LevelFilter>().is_err() {
            return Err(AppError::validation(format!(
                "logging.level is not a log level: {}",
                self.logging.level
            )));
        }
        if self.store.backend == StoreBackend::Supabase {
            if self.store.supabase_url.is_none() {
                return Err(AppError::validation(
                    "store.supabase_url is required for the supabase backend",
                ));
            }
            if self.store.supabase_key.is_none() {
                return Err(AppError::validation(
                    "store.supabase_key is required for the supabase backend",
                ));
            }
            if self.store.table.trim().is_empty() {
                return Err(AppError::validation("store.table is empty"));
            }
        }
        Ok(())
    }
}

/// Page fetching behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for page requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Upper bound on waiting for page content, in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub timeout_secs: u64,

    /// Extra wait after the page has loaded, in milliseconds
    #[serde(default)]
    pub settle_delay_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::fetch_timeout(),
            settle_delay_ms: 0,
        }
    }
}

/// Notification transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Bot API base URL
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Token for keyword-found messages (primary channel)
    #[serde(default)]
    pub keyword_bot_token: Option<String>,

    /// Token for change messages (secondary channel)
    #[serde(default)]
    pub updates_bot_token: Option<String>,

    #[serde(default = "defaults::notify_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::api_base(),
            keyword_bot_token: None,
            updates_bot_token: None,
            timeout_secs: defaults::notify_timeout(),
        }
    }
}

/// Sentence pairing strategy used when diffing two snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SentenceAlignment {
    /// Compare sentences by index only
    #[default]
    Positional,
    /// Align sentences by longest common subsequence first
    Aligned,
}

/// Cycle scheduling and diffing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Pause between two resources, in milliseconds
    #[serde(default = "defaults::resource_delay")]
    pub resource_delay_ms: u64,

    /// Pause between two cycles in watch mode, in seconds
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    #[serde(default)]
    pub alignment: SentenceAlignment,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            resource_delay_ms: defaults::resource_delay(),
            interval_secs: defaults::interval(),
            alignment: SentenceAlignment::default(),
        }
    }
}

/// Which store implementation backs the resource records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Local,
    Supabase,
}

/// Resource store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory holding `resources.json` for the local backend
    #[serde(default = "defaults::local_dir")]
    pub local_dir: PathBuf,

    #[serde(default)]
    pub supabase_url: Option<String>,

    #[serde(default)]
    pub supabase_key: Option<String>,

    /// Table holding one row per monitored URL
    #[serde(default = "defaults::table")]
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            local_dir: defaults::local_dir(),
            supabase_url: None,
            supabase_key: None,
            table: defaults::table(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is unset; `verbose` forces debug.
    pub fn default_filter(&self, verbose: bool) -> &str {
        if verbose { "debug" } else { self.level.trim() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36 sitewatch/0.1".into()
    }
    pub fn fetch_timeout() -> u64 {
        10
    }

    // Notifier defaults
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn notify_timeout() -> u64 {
        15
    }

    // Cycle defaults
    pub fn resource_delay() -> u64 {
        1000
    }
    pub fn interval() -> u64 {
        300
    }

    // Store defaults
    pub fn local_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn table() -> String {
        "ezynotify".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
