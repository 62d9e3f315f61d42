//! Core error types for QuotaBar.

use thiserror::Error;

/// Core error type for QuotaBar operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Threshold list is empty.
    #[error("At least one threshold must be configured")]
    NoThresholds,

    /// Threshold outside 1..=100.
    #[error("Threshold {0} out of valid range [1, 100]")]
    ThresholdOutOfRange(u32),

    /// Thresholds not strictly ascending.
    #[error("Thresholds must be strictly ascending: {0:?}")]
    ThresholdsNotAscending(Vec<u32>),
}
