//! Integration tests: captured request → executor → classified body → snapshot.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};

use quotabar_fetch::{
    FetchError, Fetcher, ParseError, RawResponse, RequestDescriptor, RequestExecutor, parse_usage,
};

const CAPTURE: &str = r#"curl 'https://claude.ai/api/organizations/org-1/usage' \
  -H 'accept: */*' \
  -H 'anthropic-client-platform: web_claude_ai' \
  -b 'sessionKey=sk-ant-sid01-abc; lastActiveOrg=org-1' \
  --compressed"#;

/// Records the descriptor it was handed and answers with a fixed response.
struct RecordingExecutor {
    response: RawResponse,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl RequestExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn execute(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, FetchError> {
        self.seen.lock().unwrap().push(format!(
            "{} {} cookie={}",
            descriptor.method(),
            descriptor.url(),
            descriptor.header("cookie").unwrap_or_default()
        ));
        Ok(self.response.clone())
    }
}

fn executor(status: u16, body: &str) -> Arc<RecordingExecutor> {
    Arc::new(RecordingExecutor {
        response: RawResponse::new(Some(status), body),
        seen: Mutex::new(Vec::new()),
    })
}

#[tokio::test]
async fn test_capture_to_snapshot() {
    let descriptor = RequestDescriptor::parse(CAPTURE).unwrap();
    let exec = executor(
        200,
        r#"{"five_hour":{"utilization":37.4,"resets_at":"2025-03-01T15:00:00Z"},
            "seven_day":{"utilization":81,"resets_at":"2025-03-04T00:00:00Z"},
            "seven_day_oauth_apps":null}"#,
    );
    let fetcher = Fetcher::new(descriptor, exec.clone());

    let body = fetcher.fetch().await.unwrap();
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let snapshot = parse_usage(&body, now).unwrap();

    assert!((snapshot.session_percent() - 37.4).abs() < f64::EPSILON);
    assert!((snapshot.weekly_percent() - 81.0).abs() < f64::EPSILON);

    let seen = exec.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0],
        "GET https://claude.ai/api/organizations/org-1/usage cookie=sessionKey=sk-ant-sid01-abc; lastActiveOrg=org-1"
    );
}

#[tokio::test]
async fn test_expired_session_is_auth_error() {
    let descriptor = RequestDescriptor::parse(CAPTURE).unwrap();
    let fetcher = Fetcher::new(
        descriptor,
        executor(401, r#"{"type":"error","error":{"type":"authentication_error"}}"#),
    );

    assert!(matches!(fetcher.fetch().await, Err(FetchError::AuthExpired(_))));
}

#[tokio::test]
async fn test_html_login_page_is_parse_error() {
    let descriptor = RequestDescriptor::parse(CAPTURE).unwrap();
    let fetcher = Fetcher::new(descriptor, executor(200, "<!DOCTYPE html><html></html>"));

    let body = fetcher.fetch().await.unwrap();
    assert!(matches!(parse_usage(&body, Utc::now()), Err(ParseError::InvalidJson(_))));
}
