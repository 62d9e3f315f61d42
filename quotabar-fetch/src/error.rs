//! Fetch error types.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Classified failure of one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The executor did not finish within the bounded timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The external request tool is not installed.
    #[error("Request executor not found: {0}")]
    ExecutorMissing(String),

    /// The request was rejected as unauthorized.
    #[error("Authentication expired: {0}")]
    AuthExpired(String),

    /// The executor ran but produced no usable output.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Returns true if the next scheduled tick may succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout(_) | FetchError::Malformed(_))
    }

    /// Returns true if the monitor cannot work at all until the user acts.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::ExecutorMissing(_))
    }
}

impl From<ProcessError> for FetchError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound(cmd) => FetchError::ExecutorMissing(cmd),
            ProcessError::Timeout(timeout) => FetchError::Timeout(timeout),
            ProcessError::NonZeroExit { code, stderr } => {
                FetchError::Malformed(format!("executor exited with code {code}: {}", stderr.trim()))
            }
            ProcessError::ExecutionFailed(msg) => FetchError::Malformed(msg),
            ProcessError::Io(e) => FetchError::Malformed(format!("executor I/O error: {e}")),
        }
    }
}

// ============================================================================
// Parse Error
// ============================================================================

/// Failure to extract usage from a response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A required field is absent or null.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A field is present but has the wrong type or format.
    #[error("Invalid type for {field}: expected {expected}")]
    InvalidType {
        /// Dotted path of the field.
        field: String,
        /// What the field should have been.
        expected: &'static str,
    },

    /// The body is not JSON at all.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

// ============================================================================
// Descriptor Error
// ============================================================================

/// Failure to load or understand the captured request descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The descriptor file could not be read.
    #[error("Cannot read request descriptor {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The descriptor file is empty.
    #[error("Request descriptor is empty")]
    Empty,

    /// The command line could not be split into words.
    #[error("Cannot tokenize request descriptor (unbalanced quotes?)")]
    Tokenize,

    /// An option that takes a value was last on the line.
    #[error("Option {0} is missing its value")]
    MissingValue(String),

    /// No URL was found.
    #[error("Request descriptor contains no URL")]
    MissingUrl,

    /// A header name is not a valid HTTP token.
    #[error("Invalid header name {0:?} (unsupported shell quoting?)")]
    InvalidHeader(String),

    /// The URL is not an absolute http(s) URL.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

// ============================================================================
// Process Error
// ============================================================================

/// Error type for process operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Command execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Command timed out.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// Non-zero exit code.
    #[error("Command exited with code {code}: {stderr}")]
    NonZeroExit {
        /// Exit code from the process.
        code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
