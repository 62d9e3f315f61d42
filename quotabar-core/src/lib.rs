// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `QuotaBar` Core
//!
//! Core types, threshold tracking, and ports for the `QuotaBar` monitor.
//!
//! This crate provides the foundational abstractions used across all other
//! `QuotaBar` crates, including:
//!
//! - Domain models (quotas, readings, snapshots, notifications)
//! - The per-quota threshold-crossing state machine
//! - Error types
//! - The clock and presenter ports
//!
//! ## Key Types
//!
//! ### Usage Types
//! - [`QuotaKind`] - The session (5h) and weekly (7d) windows
//! - [`QuotaReading`] - One quota's percentage and reset time
//! - [`UsageSnapshot`] - Immutable result of one successful fetch
//!
//! ### Notification Types
//! - [`Thresholds`] - Validated ascending threshold list
//! - [`ThresholdTracker`] - Decides which thresholds fire
//! - [`NotificationEvent`] - A threshold crossing
//! - [`StatusLine`] - The `5h: XX% | 7d: YY%` display
//!
//! ### Ports
//! - [`Clock`] - Injectable time source
//! - [`Presenter`] - Fire-and-forget display/notification sink

pub mod error;
pub mod models;
pub mod thresholds;
pub mod tracker;
pub mod traits;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Quota types
    QuotaKind,
    QuotaReading,
    clamp_percent,
    // Usage types
    UsageSnapshot,
    describe_reset,
    format_reset_time,
    // Presentation
    NOTIFICATION_TITLE,
    Notification,
    NotificationEvent,
    StatusLine,
};

// Re-export tracking
pub use thresholds::{CrossingPolicy, DEFAULT_THRESHOLDS, Thresholds};
pub use tracker::{QuotaState, ThresholdTracker, TrackerState};

// Re-export traits
pub use traits::{Clock, ManualClock, Presenter, SystemClock};
