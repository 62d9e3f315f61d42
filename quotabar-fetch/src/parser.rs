//! Usage response parsing.
//!
//! The endpoint answers with one object per quota window:
//!
//! ```json
//! {
//!   "five_hour": {"utilization": 42.0, "resets_at": "2025-01-01T12:00:00+00:00"},
//!   "seven_day": {"utilization": 13, "resets_at": "2025-01-05T00:00:00Z"},
//!   "seven_day_opus": null
//! }
//! ```
//!
//! Only `five_hour` and `seven_day` are read; anything else is ignored.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use quotabar_core::{QuotaKind, QuotaReading, UsageSnapshot};

use crate::error::ParseError;

const UTILIZATION: &str = "utilization";
const RESETS_AT: &str = "resets_at";

// ============================================================================
// Partial Usage
// ============================================================================

/// Per-quota parse result of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialUsage {
    /// The 5-hour session quota.
    pub session: Result<QuotaReading, ParseError>,
    /// The 7-day weekly quota.
    pub weekly: Result<QuotaReading, ParseError>,
    /// When the response was received.
    pub fetched_at: DateTime<Utc>,
}

impl PartialUsage {
    /// Returns the parse result for one quota.
    pub fn reading(&self, quota: QuotaKind) -> Result<&QuotaReading, &ParseError> {
        match quota {
            QuotaKind::Session => self.session.as_ref(),
            QuotaKind::Weekly => self.weekly.as_ref(),
        }
    }

    /// Returns true if both quotas parsed.
    pub fn is_complete(&self) -> bool {
        self.session.is_ok() && self.weekly.is_ok()
    }

    /// Converts to a full snapshot, failing with the first quota's error.
    ///
    /// # Errors
    ///
    /// Returns the session error if the session quota failed, otherwise the
    /// weekly error.
    pub fn into_snapshot(self) -> Result<UsageSnapshot, ParseError> {
        Ok(UsageSnapshot::new(self.session?, self.weekly?, self.fetched_at))
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Parses a response body, keeping whichever quota is readable.
///
/// # Errors
///
/// Fails as a whole only when the body is not a JSON object.
pub fn parse_partial(body: &str, fetched_at: DateTime<Utc>) -> Result<PartialUsage, ParseError> {
    let root: Value = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "Usage response is not JSON");
        ParseError::InvalidJson(e.to_string())
    })?;

    let Value::Object(root) = root else {
        return Err(ParseError::InvalidType {
            field: "$".to_string(),
            expected: "object",
        });
    };

    let usage = PartialUsage {
        session: parse_quota(&root, QuotaKind::Session),
        weekly: parse_quota(&root, QuotaKind::Weekly),
        fetched_at,
    };

    debug!(
        session = ?usage.session.as_ref().map(|r| r.percent),
        weekly = ?usage.weekly.as_ref().map(|r| r.percent),
        "Parsed usage response"
    );

    Ok(usage)
}

/// Parses a response body that must carry both quotas.
///
/// # Errors
///
/// Returns the first problem found: invalid JSON, a missing field, or a
/// field of the wrong type.
pub fn parse_usage(body: &str, fetched_at: DateTime<Utc>) -> Result<UsageSnapshot, ParseError> {
    parse_partial(body, fetched_at)?.into_snapshot()
}

// ============================================================================
// Field Extraction
// ============================================================================

fn parse_quota(root: &Map<String, Value>, quota: QuotaKind) -> Result<QuotaReading, ParseError> {
    let key = quota.response_key();
    let window = match root.get(key) {
        None | Some(Value::Null) => return Err(ParseError::MissingField(key.to_string())),
        Some(Value::Object(window)) => window,
        Some(_) => {
            return Err(ParseError::InvalidType {
                field: key.to_string(),
                expected: "object",
            });
        }
    };

    let percent = match window.get(UTILIZATION) {
        None | Some(Value::Null) => return Err(ParseError::MissingField(path(key, UTILIZATION))),
        Some(value) => value.as_f64().ok_or_else(|| ParseError::InvalidType {
            field: path(key, UTILIZATION),
            expected: "number",
        })?,
    };

    let resets_at = match window.get(RESETS_AT) {
        None | Some(Value::Null) => return Err(ParseError::MissingField(path(key, RESETS_AT))),
        Some(Value::String(s)) => parse_timestamp(s).ok_or_else(|| ParseError::InvalidType {
            field: path(key, RESETS_AT),
            expected: "RFC 3339 timestamp",
        })?,
        Some(_) => {
            return Err(ParseError::InvalidType {
                field: path(key, RESETS_AT),
                expected: "RFC 3339 timestamp",
            });
        }
    };

    if !(0.0..=100.0).contains(&percent) {
        debug!(quota = %quota, percent, "Clamping out-of-range utilization");
    }

    Ok(QuotaReading::new(percent, resets_at))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn path(key: &str, field: &str) -> String {
    format!("{key}.{field}")
}

// ============================================================================
// Tests
// ============================================================================
