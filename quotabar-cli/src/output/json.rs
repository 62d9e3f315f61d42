//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use quotabar_core::{QuotaKind, QuotaReading, UsageSnapshot, describe_reset};
use serde::{Serialize, Serializer};

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for one fetch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutput {
    /// The `5h: XX% | 7d: YY%` line.
    pub status: String,
    /// The 5-hour session quota.
    pub five_hour: QuotaOutput,
    /// The 7-day weekly quota.
    pub seven_day: QuotaOutput,
    #[serde(serialize_with = "serialize_datetime")]
    pub fetched_at: DateTime<Utc>,
}

/// A single quota.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaOutput {
    pub used_percent: f64,
    #[serde(serialize_with = "serialize_datetime")]
    pub resets_at: DateTime<Utc>,
    pub resets_in: String,
}

// ============================================================================
// Serialization helpers
// ============================================================================

fn serialize_datetime<S>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&dt.to_rfc3339())
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a usage snapshot.
    pub fn format_snapshot(&self, snapshot: &UsageSnapshot, now: DateTime<Utc>) -> Result<String> {
        let session = snapshot.reading(QuotaKind::Session);
        let weekly = snapshot.reading(QuotaKind::Weekly);

        let output = UsageOutput {
            status: quotabar_core::StatusLine::from_readings(Some(session), Some(weekly)).text(),
            five_hour: quota_output(session, now),
            seven_day: quota_output(weekly, now),
            fetched_at: snapshot.fetched_at(),
        };
        self.format(&output)
    }
}

fn quota_output(reading: &QuotaReading, now: DateTime<Utc>) -> QuotaOutput {
    QuotaOutput {
        used_percent: reading.percent,
        resets_at: reading.resets_at,
        resets_in: describe_reset(reading.resets_at, now),
    }
}
