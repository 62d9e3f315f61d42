//! Configuration management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use quotabar_core::{CrossingPolicy, DEFAULT_THRESHOLDS, Thresholds};
use quotabar_fetch::ExecutorKind;

use crate::error::StoreError;
use crate::persistence::{default_cache_dir, default_config_path, default_descriptor_path, default_state_path};

/// Default refresh interval in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 180;
/// Shortest refresh interval accepted.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 10;
/// Default bound on one fetch in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Monitor configuration.
///
/// Every field has a default, so a partial file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between automatic refreshes.
    pub refresh_interval_secs: u64,
    /// Percentages that trigger a notification, ascending.
    pub thresholds: Vec<u32>,
    /// What to emit when several thresholds are crossed at once.
    pub crossing_policy: CrossingPolicy,
    /// Debug logging.
    pub verbose: bool,
    /// External tool that performs the request.
    pub executor: ExecutorKind,
    /// Bound on one fetch in seconds.
    pub fetch_timeout_secs: u64,
    /// Captured `curl` command.
    pub descriptor_path: PathBuf,
    /// Whether threshold crossings produce desktop notifications.
    pub notifications_enabled: bool,
    /// Whether fired thresholds survive a restart.
    pub persist_state: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            thresholds: DEFAULT_THRESHOLDS.iter().copied().map(u32::from).collect(),
            crossing_policy: CrossingPolicy::default(),
            verbose: false,
            executor: ExecutorKind::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            descriptor_path: default_descriptor_path(),
            notifications_enabled: true,
            persist_state: true,
        }
    }
}

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_config_path()
    }

    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from`].
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from a specific path, or defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Checks the values a file could get wrong.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` for empty, out-of-range, or unsorted
    /// thresholds and for a zero fetch timeout. A too-short refresh interval
    /// is not an error; it is clamped with a warning.
    pub fn validate(&self) -> Result<(), StoreError> {
        self.thresholds()?;
        if self.fetch_timeout_secs == 0 {
            return Err(StoreError::Config("fetch_timeout_secs must be positive".to_string()));
        }
        if self.refresh_interval_secs < MIN_REFRESH_INTERVAL_SECS {
            warn!(
                requested = self.refresh_interval_secs,
                minimum = MIN_REFRESH_INTERVAL_SECS,
                "Refresh interval too short, using minimum"
            );
        }
        Ok(())
    }

    /// The validated threshold list.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` if the list is not a valid threshold set.
    pub fn thresholds(&self) -> Result<Thresholds, StoreError> {
        Ok(Thresholds::new(&self.thresholds)?)
    }

    /// Time between automatic refreshes, raised to the minimum if needed.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    }

    /// Bound on one fetch.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Where threshold state is persisted, if persistence is on.
    pub fn state_path(&self) -> Option<PathBuf> {
        self.persist_state.then(default_state_path)
    }

    /// Working directory for executors that need scratch files.
    pub fn work_dir(&self) -> PathBuf {
        default_cache_dir()
    }
}

// ============================================================================
// Tests
// ============================================================================
