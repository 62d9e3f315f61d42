//! Domain models for QuotaBar.
//!
//! ## Submodules
//!
//! - [`quota`] - Quota identity and readings (QuotaKind, QuotaReading)
//! - [`usage`] - Usage snapshots and reset presentation
//! - [`notification`] - Notification events, notifications, status line

mod notification;
mod quota;
mod usage;

pub use notification::{NOTIFICATION_TITLE, Notification, NotificationEvent, StatusLine};
pub use quota::{QuotaKind, QuotaReading, clamp_percent};
pub use usage::{UsageSnapshot, describe_reset, format_reset_time};
