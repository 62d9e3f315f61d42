//! `curl` executor.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{RawResponse, RequestExecutor};
use crate::descriptor::RequestDescriptor;
use crate::error::FetchError;
use crate::process::ProcessRunner;

/// Binary name.
pub const CURL: &str = "curl";

/// curl's own exit code for "operation timed out".
const CURL_TIMEOUT_EXIT: i32 = 28;

/// Appended after the body so the status can be split off the last line.
const STATUS_WRITE_OUT: &str = "\n%{http_code}";

/// Replays descriptors with `curl`.
#[derive(Debug, Clone)]
pub struct CurlExecutor {
    runner: ProcessRunner,
    timeout: Duration,
}

impl CurlExecutor {
    /// Creates an executor whose requests are capped at `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            runner: ProcessRunner::new(),
            timeout,
        }
    }

    /// Builds the curl argument list.
    ///
    /// Only non-secret options go here. Headers, body and URL are passed on
    /// stdin by [`build_config`].
    pub fn build_args(&self, descriptor: &RequestDescriptor) -> Vec<String> {
        vec![
            "-sS".to_string(),
            "--compressed".to_string(),
            "--max-time".to_string(),
            self.timeout.as_secs().max(1).to_string(),
            "-X".to_string(),
            descriptor.method().to_string(),
            "-w".to_string(),
            STATUS_WRITE_OUT.to_string(),
            "-K".to_string(),
            "-".to_string(),
        ]
    }
}

/// Renders the secret part of a request as a curl config file (`-K -`).
pub fn build_config(descriptor: &RequestDescriptor) -> String {
    let mut config = String::new();
    for (name, value) in descriptor.headers() {
        config.push_str(&format!("header = {}\n", config_quote(&format!("{name}: {value}"))));
    }
    if let Some(body) = descriptor.body() {
        config.push_str(&format!("data-raw = {}\n", config_quote(body)));
    }
    config.push_str(&format!("url = {}\n", config_quote(descriptor.url().as_str())));
    config
}

/// Quotes a value for a curl config file.
fn config_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{0b}' => quoted.push_str("\\v"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[async_trait]
impl RequestExecutor for CurlExecutor {
    fn name(&self) -> &str {
        CURL
    }

    fn is_available(&self) -> bool {
        self.runner.command_exists(CURL)
    }

    #[instrument(skip(self, descriptor), fields(url = %descriptor.url()))]
    async fn execute(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, FetchError> {
        let args = self.build_args(descriptor);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let config = build_config(descriptor);

        // Give curl's own --max-time a chance to fire first.
        let output = self
            .runner
            .run_with_input(
                CURL,
                &arg_refs,
                Some(config.as_bytes()),
                self.timeout + Duration::from_secs(2),
            )
            .await?;

        if output.exit_code == CURL_TIMEOUT_EXIT {
            return Err(FetchError::Timeout(self.timeout));
        }
        output.stdout_if_success().map_err(FetchError::from)?;

        let response = split_status(&output.stdout);
        debug!(status = ?response.status, body_len = response.body.len(), "curl finished");
        Ok(response)
    }
}

/// Splits the `-w "\n%{http_code}"` trailer off curl's stdout.
pub fn split_status(stdout: &str) -> RawResponse {
    match stdout.rsplit_once('\n') {
        Some((body, code)) => match code.trim().parse::<u16>() {
            // curl prints 000 when no response was received.
            Ok(0) => RawResponse::new(None, body),
            Ok(status) => RawResponse::new(Some(status), body),
            Err(_) => RawResponse::new(None, stdout),
        },
        None => match stdout.trim().parse::<u16>() {
            Ok(status) if status > 0 => RawResponse::new(Some(status), ""),
            _ => RawResponse::new(None, stdout),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::new("get", Url::parse("https://claude.ai/api/usage").unwrap())
            .with_header("Cookie", "sessionKey=abc")
            .with_header("Accept", "*/*")
    }

    #[test]
    fn test_build_args_keep_secrets_off_the_command_line() {
        let executor = CurlExecutor::new(Duration::from_secs(20));
        let args = executor.build_args(&descriptor().with_body("{\"token\":\"t0k\"}"));

        assert_eq!(&args[..6], &["-sS", "--compressed", "--max-time", "20", "-X", "GET"]);
        assert_eq!(&args[args.len() - 2..], &["-K", "-"]);
        let joined = args.join(" ");
        assert!(!joined.contains("sessionKey"));
        assert!(!joined.contains("t0k"));
        assert!(!joined.contains("claude.ai"));
    }

    #[test]
    fn test_max_time_is_at_least_one_second() {
        let executor = CurlExecutor::new(Duration::from_millis(500));
        let args = executor.build_args(&descriptor());
        assert_eq!(args[3], "1");
    }

    #[test]
    fn test_build_config() {
        let config = build_config(&descriptor());

        assert_eq!(
            config,
            "header = \"Cookie: sessionKey=abc\"\n\
             header = \"Accept: */*\"\n\
             url = \"https://claude.ai/api/usage\"\n"
        );
    }

    #[test]
    fn test_build_config_escapes_body() {
        let config = build_config(&descriptor().with_body("{\"a\":\"x\\y\"}\n"));
        assert!(config.contains(r#"data-raw = "{\"a\":\"x\\y\"}\n""#));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_config_is_fed_through_stdin() {
        // `cat` stands in for curl: it echoes what curl would read with `-K -`.
        let runner = ProcessRunner::new();
        let config = build_config(&descriptor());

        let output = runner
            .run_with_input("cat", &[], Some(config.as_bytes()), Duration::from_secs(10))
            .await
            .unwrap();

        assert!(output.stdout.contains("Cookie: sessionKey=abc"));
    }

    #[test]
    fn test_split_status() {
        let response = split_status("{\"five_hour\":{}}\n200");
        assert_eq!(response.status, Some(200));
        assert_eq!(response.body, "{\"five_hour\":{}}");

        let response = split_status("{\"error\":\"unauthorized\"}\n401");
        assert_eq!(response.status, Some(401));

        let response = split_status("\n000");
        assert_eq!(response.status, None);
        assert_eq!(response.body, "");

        let response = split_status("no trailer at all");
        assert_eq!(response.status, None);
        assert_eq!(response.body, "no trailer at all");
    }

    #[test]
    fn test_split_status_body_with_newlines() {
        let response = split_status("line one\nline two\n503");
        assert_eq!(response.status, Some(503));
        assert_eq!(response.body, "line one\nline two");
    }
}
