//! Presentation types handed to the presenter port.
//!
//! - [`NotificationEvent`] - a threshold crossing, fired once
//! - [`Notification`] - the `{title, body}` pair delivered to the host
//! - [`StatusLine`] - the `5h: XX% | 7d: YY%` display

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::quota::{QuotaKind, QuotaReading};

/// Title used for every usage notification.
pub const NOTIFICATION_TITLE: &str = "Claude Usage Alert";

// ============================================================================
// Notification Event
// ============================================================================

/// A threshold crossing. Handed to the presenter once and never replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Quota whose usage crossed the threshold.
    pub quota: QuotaKind,
    /// The threshold that was crossed.
    pub threshold: u8,
    /// Usage percentage when the event fired.
    pub percent_at_fire: f64,
    /// When the event fired.
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    /// Renders this event as a host notification.
    pub fn to_notification(&self) -> Notification {
        Notification {
            title: NOTIFICATION_TITLE.to_string(),
            body: format!(
                "{} usage reached {}% (threshold: {}%)",
                self.quota.display_name(),
                self.percent_at_fire.round(),
                self.threshold
            ),
        }
    }
}

// ============================================================================
// Notification
// ============================================================================

/// A notification as delivered to the host notification surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
}

impl Notification {
    /// Creates a notification.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// The one-time alert shown when the captured request stops being accepted.
    pub fn auth_expired() -> Self {
        Self::new(
            "Claude session expired",
            "The usage request was rejected. Capture a fresh cURL command to resume monitoring.",
        )
    }

    /// A fixed alert for checking that desktop notifications arrive.
    pub fn test_alert() -> Self {
        Self::new(
            "Claude Usage Monitor",
            "Test Notification: if you see this, notifications are working!",
        )
    }
}

// ============================================================================
// Status Line
// ============================================================================

/// The persistent status display, `5h: XX% | 7d: YY%`.
///
/// A quota without a reading this cycle renders as `N/A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusLine {
    /// Rounded session percentage, if known this cycle.
    pub session: Option<i64>,
    /// Rounded weekly percentage, if known this cycle.
    pub weekly: Option<i64>,
    /// Whether the captured request is currently rejected as unauthorized.
    pub auth_expired: bool,
}

impl StatusLine {
    /// A status line with both quotas unavailable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Builds a status line from this cycle's readings.
    pub fn from_readings(session: Option<&QuotaReading>, weekly: Option<&QuotaReading>) -> Self {
        Self {
            session: session.map(QuotaReading::rounded_percent),
            weekly: weekly.map(QuotaReading::rounded_percent),
            auth_expired: false,
        }
    }

    /// Marks the line as auth-expired.
    pub fn with_auth_expired(mut self, expired: bool) -> Self {
        self.auth_expired = expired;
        self
    }

    /// The plain `5h: XX% | 7d: YY%` text, without any state marker.
    pub fn text(&self) -> String {
        format!(
            "{}: {} | {}: {}",
            QuotaKind::Session.label(),
            format_percent(self.session),
            QuotaKind::Weekly.label(),
            format_percent(self.weekly)
        )
    }
}

fn format_percent(value: Option<i64>) -> String {
    match value {
        Some(pct) => format!("{pct}%"),
        None => "N/A".to_string(),
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())?;
        if self.auth_expired {
            f.write_str(" (auth expired)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
