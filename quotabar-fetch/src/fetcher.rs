//! The fetch step: run the descriptor through an executor and classify the
//! outcome.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::descriptor::RequestDescriptor;
use crate::error::FetchError;
use crate::executor::{RawResponse, RequestExecutor};

/// Default bound on one fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Replays the captured request and returns the raw usage body.
#[derive(Clone)]
pub struct Fetcher {
    descriptor: RequestDescriptor,
    executor: Arc<dyn RequestExecutor>,
    timeout: Duration,
}

impl Fetcher {
    /// Creates a fetcher with the default timeout.
    pub fn new(descriptor: RequestDescriptor, executor: Arc<dyn RequestExecutor>) -> Self {
        Self {
            descriptor,
            executor,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Sets the bound on one fetch.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The descriptor being replayed.
    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    /// The executor performing requests.
    pub fn executor(&self) -> &Arc<dyn RequestExecutor> {
        &self.executor
    }

    /// The bound on one fetch.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Performs one fetch and returns the response body.
    ///
    /// # Errors
    ///
    /// `Timeout` if the executor does not answer within the bound,
    /// `AuthExpired` on 401/403, `Malformed` on any other non-2xx status or
    /// an empty body, and whatever the executor itself reports.
    #[instrument(skip(self), fields(executor = %self.executor.name()))]
    pub async fn fetch(&self) -> Result<String, FetchError> {
        debug!(timeout = ?self.timeout, "Fetching usage");

        let response = match tokio::time::timeout(self.timeout, self.executor.execute(&self.descriptor)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout = ?self.timeout, "Fetch timed out");
                return Err(FetchError::Timeout(self.timeout));
            }
        };

        classify(response)
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("descriptor", &self.descriptor)
            .field("executor", &self.executor.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Maps a raw response to a usable body or a classified error.
///
/// # Errors
///
/// See [`Fetcher::fetch`].
pub fn classify(response: RawResponse) -> Result<String, FetchError> {
    match response.status {
        Some(status @ (401 | 403)) => {
            return Err(FetchError::AuthExpired(format!("server answered {status}")));
        }
        Some(status) if !(200..300).contains(&status) => {
            return Err(FetchError::Malformed(format!("unexpected HTTP status {status}")));
        }
        _ => {}
    }

    if response.body.trim().is_empty() {
        return Err(FetchError::Malformed("empty response body".to_string()));
    }

    Ok(response.body)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct FakeExecutor {
        delay: Duration,
        response: Result<RawResponse, FetchError>,
        calls: AtomicUsize,
    }

    impl FakeExecutor {
        fn answering(status: Option<u16>, body: &str) -> Self {
            Self {
                delay: Duration::ZERO,
                response: Ok(RawResponse::new(status, body)),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RequestExecutor for FakeExecutor {
        fn name(&self) -> &str {
            "fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn execute(&self, _descriptor: &RequestDescriptor) -> Result<RawResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.response.clone()
        }
    }

    fn fetcher(executor: FakeExecutor) -> Fetcher {
        let descriptor = RequestDescriptor::new("GET", Url::parse("https://claude.ai/api/usage").unwrap());
        Fetcher::new(descriptor, Arc::new(executor))
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let f = fetcher(FakeExecutor::answering(Some(200), "{\"five_hour\":{}}"));
        assert_eq!(f.fetch().await.unwrap(), "{\"five_hour\":{}}");
    }

    #[tokio::test]
    async fn test_fetch_without_status_is_accepted() {
        let f = fetcher(FakeExecutor::answering(None, "{}"));
        assert_eq!(f.fetch().await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_fetch_auth_expired() {
        for status in [401, 403] {
            let f = fetcher(FakeExecutor::answering(Some(status), "{\"error\":\"nope\"}"));
            assert!(matches!(f.fetch().await, Err(FetchError::AuthExpired(_))));
        }
    }

    #[tokio::test]
    async fn test_fetch_bad_status_and_empty_body() {
        let f = fetcher(FakeExecutor::answering(Some(500), "oops"));
        assert!(matches!(f.fetch().await, Err(FetchError::Malformed(_))));

        let f = fetcher(FakeExecutor::answering(Some(200), "  \n"));
        assert!(matches!(f.fetch().await, Err(FetchError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_fetch_executor_missing_passes_through() {
        let f = fetcher(FakeExecutor {
            delay: Duration::ZERO,
            response: Err(FetchError::ExecutorMissing("curl".to_string())),
            calls: AtomicUsize::new(0),
        });
        assert_eq!(f.fetch().await, Err(FetchError::ExecutorMissing("curl".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout() {
        let f = fetcher(FakeExecutor {
            delay: Duration::from_secs(120),
            response: Ok(RawResponse::new(Some(200), "{}")),
            calls: AtomicUsize::new(0),
        })
        .with_timeout(Duration::from_secs(5));

        assert_eq!(f.fetch().await, Err(FetchError::Timeout(Duration::from_secs(5))));
    }

    #[test]
    fn test_debug_does_not_leak_headers() {
        let descriptor = RequestDescriptor::new("GET", Url::parse("https://claude.ai/api/usage").unwrap())
            .with_header("Cookie", "sessionKey=secret");
        let f = Fetcher::new(descriptor, Arc::new(FakeExecutor::answering(Some(200), "{}")));
        let debug = format!("{f:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("fake"));
    }
}
