//! External request executors.
//!
//! An executor replays a [`RequestDescriptor`] through an external tool and
//! returns what came back. Classification of the response (auth failure,
//! empty body, ...) is left to the [`Fetcher`](crate::Fetcher).
//!
//! - [`curl`] - runs `curl` directly (default)
//! - [`newman`] - runs a generated Postman collection through `newman`

pub mod curl;
pub mod newman;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::descriptor::RequestDescriptor;
use crate::error::FetchError;

pub use curl::CurlExecutor;
pub use newman::NewmanExecutor;

// ============================================================================
// Raw Response
// ============================================================================

/// What an executor got back from the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code, when the tool reported one.
    pub status: Option<u16>,
    /// Response body as text.
    pub body: String,
}

impl RawResponse {
    /// Creates a response.
    pub fn new(status: Option<u16>, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

// ============================================================================
// Request Executor Trait
// ============================================================================

/// A capability that performs the network call for a descriptor.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Short name of the backing tool, for logs and diagnostics.
    fn name(&self) -> &str;

    /// Returns true if the backing tool can be invoked.
    fn is_available(&self) -> bool;

    /// Performs the request.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorMissing` if the tool is not installed, `Timeout` if
    /// it does not finish in time, and `Malformed` if it fails or produces
    /// unreadable output.
    async fn execute(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, FetchError>;
}

// ============================================================================
// Executor Kind
// ============================================================================

/// Which external tool performs requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// `curl`.
    #[default]
    Curl,
    /// Postman's `newman` runner.
    Newman,
}

impl ExecutorKind {
    /// Builds the executor for this kind.
    ///
    /// `work_dir` holds the generated collection and report for `newman`.
    pub fn build(self, timeout: Duration, work_dir: PathBuf) -> Arc<dyn RequestExecutor> {
        match self {
            ExecutorKind::Curl => Arc::new(CurlExecutor::new(timeout)),
            ExecutorKind::Newman => Arc::new(NewmanExecutor::new(timeout, work_dir)),
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::Curl => write!(f, "curl"),
            ExecutorKind::Newman => write!(f, "newman"),
        }
    }
}
