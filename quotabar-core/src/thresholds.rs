//! Configured notification thresholds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Thresholds used when none are configured.
pub const DEFAULT_THRESHOLDS: [u8; 4] = [25, 50, 75, 90];

// ============================================================================
// Thresholds
// ============================================================================

/// A fixed, strictly ascending list of percentages in `1..=100`.
///
/// Construction validates the list, so any `Thresholds` value upholds the
/// ordering the tracker relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct Thresholds(Vec<u8>);

impl Thresholds {
    /// Validates and wraps a threshold list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, contains a value outside
    /// `1..=100`, or is not strictly ascending.
    pub fn new(values: &[u32]) -> Result<Self, CoreError> {
        if values.is_empty() {
            return Err(CoreError::NoThresholds);
        }
        if let Some(&bad) = values.iter().find(|&&v| v == 0 || v > 100) {
            return Err(CoreError::ThresholdOutOfRange(bad));
        }
        if values.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::ThresholdsNotAscending(values.to_vec()));
        }

        // Range-checked above.
        let values = values
            .iter()
            .map(|&v| u8::try_from(v).unwrap_or(100))
            .collect();
        Ok(Self(values))
    }

    /// Thresholds in ascending order.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Iterates thresholds in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    /// Returns true if `value` is one of the configured thresholds.
    pub fn contains(&self, value: u8) -> bool {
        self.0.binary_search(&value).is_ok()
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLDS.to_vec())
    }
}

impl TryFrom<Vec<u32>> for Thresholds {
    type Error = CoreError;

    fn try_from(values: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(&values)
    }
}

impl From<Thresholds> for Vec<u32> {
    fn from(thresholds: Thresholds) -> Self {
        thresholds.0.into_iter().map(u32::from).collect()
    }
}

impl fmt::Display for Thresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|t| format!("{t}%")).collect();
        f.write_str(&parts.join(", "))
    }
}

// ============================================================================
// Crossing Policy
// ============================================================================

/// What to emit when one observation crosses several thresholds at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingPolicy {
    /// Emit every newly crossed threshold, lowest first.
    #[default]
    FireAll,
    /// Emit only the highest newly crossed threshold; the lower ones are
    /// still marked as fired.
    HighestOnly,
}

// ============================================================================
// Tests
// ============================================================================
