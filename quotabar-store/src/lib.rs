// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `QuotaBar` Store
//!
//! Runtime state and orchestration for the `QuotaBar` monitor.
//!
//! This crate provides:
//!
//! - **Config**: JSON configuration with defaults for every field
//! - **Persistence**: atomic, owner-only JSON files for threshold state
//! - **Monitor**: the fetch → parse → track → present cycle
//! - **Scheduler**: interval ticks plus single-flight manual refresh
//!
//! ## Usage
//!
//! ```ignore
//! use quotabar_store::{Config, Monitor, Scheduler};
//!
//! let config = Config::load()?;
//! let mut monitor = Monitor::new(fetcher, tracker, clock, presenter);
//!
//! let (scheduler, handle) = Scheduler::new(config.refresh_interval());
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! // Elsewhere: handle.trigger() for "update now", shutdown_tx.send(true) to stop.
//! scheduler.run(&mut monitor, shutdown_rx).await;
//! ```

pub mod config;
pub mod error;
pub mod monitor;
pub mod persistence;
pub mod scheduler;

pub use config::{
    Config, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_REFRESH_INTERVAL_SECS, MIN_REFRESH_INTERVAL_SECS,
};
pub use error::StoreError;
pub use monitor::{Monitor, RunOutcome, RunReport, load_tracker_state};
pub use persistence::{
    default_cache_dir, default_config_dir, default_config_path, default_descriptor_path,
    default_state_path, ensure_dir, load_json, load_json_or_default, remove_file, save_json,
};
pub use scheduler::{Pipeline, RefreshHandle, Scheduler, TriggerOutcome};
