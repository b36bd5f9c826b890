//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/folio/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/folio/` (~/.config/folio/)
//! - Data: `$XDG_DATA_HOME/folio/` (~/.local/share/folio/)
//! - State/Logs: `$XDG_STATE_HOME/folio/` (~/.local/state/folio/)

use crate::error::{Error, Result};
use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Analytics window configuration
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Database tuning
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Time windows used by the analytics engine.
///
/// All windows are trailing intervals measured back from a single UTC
/// "now" captured at the start of each engine call.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Repeat views by one user on one book inside this window are suppressed
    #[serde(default = "default_dedup_window_minutes")]
    pub dedup_window_minutes: u32,

    /// Window for daily histograms, peak hours and popularity recency
    #[serde(default = "default_window_days")]
    pub stats_window_days: u32,

    /// Length of each of the two adjacent trending windows
    #[serde(default = "default_window_days")]
    pub trending_window_days: u32,

    /// Window for user engagement counts and platform active users
    #[serde(default = "default_window_days")]
    pub engagement_window_days: u32,

    /// Number of genres taken from a user's view history for recommendations
    #[serde(default = "default_affinity_genres")]
    pub affinity_genres: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            dedup_window_minutes: default_dedup_window_minutes(),
            stats_window_days: default_window_days(),
            trending_window_days: default_window_days(),
            engagement_window_days: default_window_days(),
            affinity_genres: default_affinity_genres(),
        }
    }
}

impl AnalyticsConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::minutes(self.dedup_window_minutes as i64)
    }

    pub fn stats_window(&self) -> Duration {
        Duration::days(self.stats_window_days as i64)
    }

    pub fn trending_window(&self) -> Duration {
        Duration::days(self.trending_window_days as i64)
    }

    pub fn engagement_window(&self) -> Duration {
        Duration::days(self.engagement_window_days as i64)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.dedup_window_minutes == 0 {
            return Err(Error::Config(
                "analytics.dedup_window_minutes must be at least 1".to_string(),
            ));
        }
        for (name, days) in [
            ("stats_window_days", self.stats_window_days),
            ("trending_window_days", self.trending_window_days),
            ("engagement_window_days", self.engagement_window_days),
        ] {
            if days == 0 {
                return Err(Error::Config(format!(
                    "analytics.{} must be at least 1",
                    name
                )));
            }
        }
        if self.affinity_genres == 0 {
            return Err(Error::Config(
                "analytics.affinity_genres must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_dedup_window_minutes() -> u32 {
    60
}

fn default_window_days() -> u32 {
    30
}

fn default_affinity_genres() -> usize {
    3
}

/// SQLite connection tuning
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// How long a writer waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of rotated log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.analytics.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/folio/config.toml` (~/.config/folio/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("folio").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("folio")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("folio")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/folio/folio.db` (~/.local/share/folio/folio.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("folio.db")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("folio.log")
    }
}
