//! Usage snapshot types.
//!
//! - [`UsageSnapshot`] - immutable result of one successful fetch + parse
//! - [`describe_reset`] / [`format_reset_time`] - reset time presentation

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use super::quota::{QuotaKind, QuotaReading};

// ============================================================================
// Usage Snapshot
// ============================================================================

/// Both quotas' usage as reported by a single successful fetch.
///
/// A snapshot is never mutated after construction; the next successful
/// fetch produces a new one that supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    session: QuotaReading,
    weekly: QuotaReading,
    fetched_at: DateTime<Utc>,
}

impl UsageSnapshot {
    /// Creates a snapshot from the two quota readings.
    pub fn new(session: QuotaReading, weekly: QuotaReading, fetched_at: DateTime<Utc>) -> Self {
        Self {
            session,
            weekly,
            fetched_at,
        }
    }

    /// Returns the reading for the given quota.
    pub fn reading(&self, quota: QuotaKind) -> &QuotaReading {
        match quota {
            QuotaKind::Session => &self.session,
            QuotaKind::Weekly => &self.weekly,
        }
    }

    /// Session (5-hour) usage percentage.
    pub fn session_percent(&self) -> f64 {
        self.session.percent
    }

    /// Weekly (7-day) usage percentage.
    pub fn weekly_percent(&self) -> f64 {
        self.weekly.percent
    }

    /// When the session window resets.
    pub fn session_reset_at(&self) -> DateTime<Utc> {
        self.session.resets_at
    }

    /// When the weekly window resets.
    pub fn weekly_reset_at(&self) -> DateTime<Utc> {
        self.weekly.resets_at
    }

    /// When this snapshot was fetched.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Highest usage across both quotas.
    pub fn max_percent(&self) -> f64 {
        self.session.percent.max(self.weekly.percent)
    }
}

// ============================================================================
// Reset Presentation
// ============================================================================

/// Describes the time remaining until `resets_at`, e.g. `Resets in 2h 5m`.
pub fn describe_reset(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = resets_at - now;
    let total_secs = remaining.num_seconds();
    if total_secs < 0 {
        return "Resetting soon".to_string();
    }

    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;

    if hours > 24 {
        format!("Resets in {}d {}h", hours / 24, hours % 24)
    } else if hours > 0 {
        format!("Resets in {hours}h {minutes}m")
    } else {
        format!("Resets in {minutes}m")
    }
}

/// Formats `resets_at` as local wall-clock time (`3:45 PM`, or `Wed 3:45 PM`
/// with `with_day`).
pub fn format_reset_time(resets_at: DateTime<Utc>, with_day: bool) -> String {
    let local = resets_at.with_timezone(&Local);
    if with_day {
        local.format("%a %-I:%M %p").to_string()
    } else {
        local.format("%-I:%M %p").to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_snapshot_accessors() {
        let snapshot = UsageSnapshot::new(
            QuotaReading::new(42.0, at(12, 0)),
            QuotaReading::new(13.0, at(23, 0)),
            at(10, 0),
        );

        assert_eq!(snapshot.session_percent(), 42.0);
        assert_eq!(snapshot.weekly_percent(), 13.0);
        assert_eq!(snapshot.session_reset_at(), at(12, 0));
        assert_eq!(snapshot.weekly_reset_at(), at(23, 0));
        assert_eq!(snapshot.reading(QuotaKind::Weekly).percent, 13.0);
        assert_eq!(snapshot.max_percent(), 42.0);
    }

    #[test]
    fn test_describe_reset() {
        let now = at(10, 0);
        assert_eq!(describe_reset(now - Duration::minutes(1), now), "Resetting soon");
        assert_eq!(describe_reset(now + Duration::minutes(42), now), "Resets in 42m");
        assert_eq!(
            describe_reset(now + Duration::minutes(125), now),
            "Resets in 2h 5m"
        );
        assert_eq!(
            describe_reset(now + Duration::hours(50), now),
            "Resets in 2d 2h"
        );
    }

    #[test]
    fn test_format_reset_time_is_not_empty() {
        assert!(!format_reset_time(at(15, 45), false).is_empty());
        assert!(format_reset_time(at(15, 45), true).contains(' '));
    }
}
