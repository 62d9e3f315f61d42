//! Quota identity and per-quota readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Quota Kind
// ============================================================================

/// One of the two independently tracked usage windows.
///
/// Serialized with the same keys the usage endpoint uses (`five_hour`,
/// `seven_day`) so persisted state and responses line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuotaKind {
    /// Rolling 5-hour session window.
    #[serde(rename = "five_hour")]
    Session,
    /// Rolling 7-day weekly window.
    #[serde(rename = "seven_day")]
    Weekly,
}

impl QuotaKind {
    /// Both quotas, in display order.
    pub const ALL: [QuotaKind; 2] = [QuotaKind::Session, QuotaKind::Weekly];

    /// Short label used in the status line (`5h` / `7d`).
    pub fn label(self) -> &'static str {
        match self {
            Self::Session => "5h",
            Self::Weekly => "7d",
        }
    }

    /// Key of this quota's object in the usage response.
    pub fn response_key(self) -> &'static str {
        match self {
            Self::Session => "five_hour",
            Self::Weekly => "seven_day",
        }
    }

    /// Human-readable name for notifications.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Session => "5-hour session",
            Self::Weekly => "7-day weekly",
        }
    }
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Quota Reading
// ============================================================================

/// A single quota's usage as reported by one response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaReading {
    /// Percentage used, always within [0, 100].
    pub percent: f64,
    /// When this quota's window resets.
    pub resets_at: DateTime<Utc>,
}

impl QuotaReading {
    /// Creates a reading, clamping the percentage into [0, 100].
    ///
    /// Non-finite values are treated as 0.
    pub fn new(percent: f64, resets_at: DateTime<Utc>) -> Self {
        Self {
            percent: clamp_percent(percent),
            resets_at,
        }
    }

    /// Percentage rounded for display (half away from zero).
    #[allow(clippy::cast_possible_truncation)]
    pub fn rounded_percent(&self) -> i64 {
        self.percent.round() as i64
    }
}

/// Clamps a raw percentage into [0, 100].
pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

// ============================================================================
// Tests
// ============================================================================
