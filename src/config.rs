//! Configuration management for cadence.
//!
//! This module handles the `.cadence/config.yaml` file which stores the
//! database location, log level, scheduler timing and notification text.

use crate::error::{Error, Result};
use crate::reminders::render::{MessageRenderer, DEFAULT_FALLBACK_BODY, DEFAULT_TEMPLATE};
use crate::store::DEFAULT_DB_PATH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file path relative to the base directory.
pub const CONFIG_FILE_PATH: &str = ".cadence/config.yaml";

/// Seconds between scheduler runs.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Most reminders dispatched in one scheduler run.
pub const DEFAULT_MAX_BATCH: usize = 500;

/// Seconds a single dispatch may take.
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 10;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// `SQLite` database file, relative to the base directory unless absolute.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Scheduler timing.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Notification text.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Scheduler timing and batching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Seconds between runs.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Most reminders dispatched per run.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Seconds a single dispatch may take before it counts as failed.
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,
}

/// Notification body rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Tera template for the body.
    #[serde(default = "default_template")]
    pub template: String,

    /// Body used when the template renders nothing or fails.
    #[serde(default = "default_fallback_body")]
    pub fallback_body: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

const fn default_max_batch() -> usize {
    DEFAULT_MAX_BATCH
}

const fn default_dispatch_timeout_secs() -> u64 {
    DEFAULT_DISPATCH_TIMEOUT_SECS
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

fn default_fallback_body() -> String {
    DEFAULT_FALLBACK_BODY.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
            scheduler: SchedulerConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            max_batch: DEFAULT_MAX_BATCH,
            dispatch_timeout_secs: DEFAULT_DISPATCH_TIMEOUT_SECS,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { template: default_template(), fallback_body: default_fallback_body() }
    }
}

impl NotificationConfig {
    /// Build the renderer these settings describe.
    ///
    /// # Errors
    ///
    /// Returns an error if the template does not parse.
    pub fn renderer(&self) -> Result<MessageRenderer> {
        MessageRenderer::new(&self.template, self.fallback_body.clone())
    }
}

impl EngineConfig {
    /// Load config from a specific base directory, returning None if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_from(base_dir: &Path) -> Result<Option<Self>> {
        let config_path = Self::config_path(base_dir);
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Load config from a base directory, falling back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed or is invalid.
    pub fn load_or_default(base_dir: &Path) -> Result<Self> {
        let config = Self::load_from(base_dir)?.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, base_dir: &Path) -> Result<()> {
        let config_path = Self::config_path(base_dir);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config file path for a base directory.
    pub fn config_path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE_PATH)
    }

    /// The database file this config points at, resolved against `base_dir`.
    #[must_use]
    pub fn database_path_in(&self, base_dir: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            base_dir.join(&self.database_path)
        }
    }

    /// Check that the engine can run with these values.
    ///
    /// # Errors
    ///
    /// Returns `Config` for a zero interval, batch or timeout, and a template
    /// error if the notification template does not parse.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.interval_secs == 0 {
            return Err(Error::Config("scheduler.interval_secs must be positive".to_string()));
        }
        if self.scheduler.max_batch == 0 {
            return Err(Error::Config("scheduler.max_batch must be positive".to_string()));
        }
        if self.scheduler.dispatch_timeout_secs == 0 {
            return Err(Error::Config("scheduler.dispatch_timeout_secs must be positive".to_string()));
        }
        self.notifications.renderer()?;
        Ok(())
    }
}
