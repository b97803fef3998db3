//! Inbox Configuration
//!
//! Configuration management for the command-line inbox. Stored as TOML at
//! `~/.config/cosmic/cosmic-sms/sms.toml`.

use anyhow::{Context, Result};
use chrono::Weekday;
use cosmic_sms_core::{
    AggregationPolicy, CoordinatorConfig, ReconcileMode, RelativeTimeFormatter, StaticPermissions,
    DEFAULT_PREVIEW_CHARS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "sms.toml";

/// Inbox configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Message log location
    #[serde(default)]
    pub store: StoreConfig,

    /// Conversation list behaviour
    #[serde(default)]
    pub inbox: InboxConfig,

    /// Send and reconciliation behaviour
    #[serde(default)]
    pub send: SendConfig,

    /// Capability answers for the permission gate
    #[serde(default)]
    pub permissions: PermissionConfig,

    /// Timestamp rendering
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Message log location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path (a leading `~/` expands to the home directory)
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Conversation list behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxConfig {
    /// How each thread's summary message is chosen
    #[serde(default)]
    pub aggregation_policy: AggregationPolicy,

    /// Snippet length in the list, in characters
    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,
}

/// Send and reconciliation behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendConfig {
    /// Delay before re-reading the thread after a send
    #[serde(default = "default_reconcile_delay_ms")]
    pub reconcile_delay_ms: u64,

    /// Show the sent message before the re-read confirms it
    #[serde(default = "default_false")]
    pub optimistic_append: bool,
}

/// Capability answers for the permission gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(default = "default_true")]
    pub read: bool,

    #[serde(default = "default_true")]
    pub send: bool,
}

/// Timestamp rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// First day of the calendar week (monday, sunday, ...)
    #[serde(default = "default_week_start")]
    pub week_start: String,
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("cosmic")
        .join("cosmic-sms")
        .join("messages.db")
}

fn default_snippet_max_chars() -> usize {
    DEFAULT_PREVIEW_CHARS
}

fn default_reconcile_delay_ms() -> u64 {
    300
}

fn default_week_start() -> String {
    "monday".to_string()
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            aggregation_policy: AggregationPolicy::default(),
            snippet_max_chars: default_snippet_max_chars(),
        }
    }
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            reconcile_delay_ms: default_reconcile_delay_ms(),
            optimistic_append: false,
        }
    }
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            read: true,
            send: true,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            week_start: default_week_start(),
        }
    }
}

impl Config {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("cosmic")
            .join("cosmic-sms")
            .join(CONFIG_FILE)
    }

    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from `path`, creating a default file if missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!("Created default configuration at {}", path.display());
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Reject settings that would only fail later
    pub fn validate(&self) -> Result<()> {
        self.week_start()?;
        if self.inbox.snippet_max_chars == 0 {
            anyhow::bail!("inbox.snippet_max_chars must be at least 1");
        }
        Ok(())
    }

    /// Ensure the database directory exists
    pub fn ensure_directories(&self) -> Result<()> {
        if let Some(parent) = self.database_path().parent() {
            fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        Ok(())
    }

    /// Database path with `~/` expanded
    pub fn database_path(&self) -> PathBuf {
        match self.store.database.strip_prefix("~") {
            Ok(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| self.store.database.clone()),
            Err(_) => self.store.database.clone(),
        }
    }

    pub fn week_start(&self) -> Result<Weekday> {
        self.display
            .week_start
            .parse::<Weekday>()
            .map_err(|_| anyhow::anyhow!("Invalid week_start '{}'", self.display.week_start))
    }

    pub fn formatter(&self) -> Result<RelativeTimeFormatter> {
        Ok(RelativeTimeFormatter::new(self.week_start()?))
    }

    pub fn permissions(&self) -> StaticPermissions {
        StaticPermissions::new(self.permissions.read, self.permissions.send)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            reconcile_delay: Duration::from_millis(self.send.reconcile_delay_ms),
            mode: if self.send.optimistic_append {
                ReconcileMode::Optimistic
            } else {
                ReconcileMode::Delayed
            },
        }
    }
}
