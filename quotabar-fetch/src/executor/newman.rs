//! `newman` executor.
//!
//! Generates a single-request Postman v2.1 collection from the descriptor,
//! runs it with the JSON reporter, and reads the response back out of the
//! exported report (`run.executions[0].response`).

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use super::{RawResponse, RequestExecutor};
use crate::descriptor::RequestDescriptor;
use crate::error::FetchError;
use crate::process::ProcessRunner;

/// Binary name for this platform.
#[cfg(windows)]
pub const NEWMAN: &str = "newman.cmd";
/// Binary name for this platform.
#[cfg(not(windows))]
pub const NEWMAN: &str = "newman";

const COLLECTION_FILE: &str = "quotabar.postman_collection.json";
const REPORT_FILE: &str = "newman_output.json";

/// Replays descriptors through a generated Postman collection.
#[derive(Debug, Clone)]
pub struct NewmanExecutor {
    runner: ProcessRunner,
    timeout: Duration,
    work_dir: PathBuf,
}

impl NewmanExecutor {
    /// Creates an executor that keeps its collection and report in `work_dir`.
    pub fn new(timeout: Duration, work_dir: PathBuf) -> Self {
        Self {
            runner: ProcessRunner::new(),
            timeout,
            work_dir,
        }
    }

    fn collection_path(&self) -> PathBuf {
        self.work_dir.join(COLLECTION_FILE)
    }

    fn report_path(&self) -> PathBuf {
        self.work_dir.join(REPORT_FILE)
    }

    async fn write_collection(&self, descriptor: &RequestDescriptor) -> Result<PathBuf, FetchError> {
        let path = self.collection_path();
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| FetchError::Malformed(format!("cannot create {}: {e}", self.work_dir.display())))?;

        let collection = build_collection(descriptor);
        let text = serde_json::to_string_pretty(&collection)
            .map_err(|e| FetchError::Malformed(format!("cannot encode collection: {e}")))?;
        write_private(&path, text.as_bytes())
            .await
            .map_err(|e| FetchError::Malformed(format!("cannot write {}: {e}", path.display())))?;

        debug!(path = %path.display(), "Wrote Postman collection");
        Ok(path)
    }
}

/// Writes a file only the current user can read; the collection holds the
/// session cookie.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;

    // `mode` only applies to new files.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    }

    file.write_all(contents).await?;
    file.flush().await
}

#[async_trait]
impl RequestExecutor for NewmanExecutor {
    fn name(&self) -> &str {
        NEWMAN
    }

    fn is_available(&self) -> bool {
        self.runner.command_exists(NEWMAN)
    }

    #[instrument(skip(self, descriptor), fields(url = %descriptor.url()))]
    async fn execute(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, FetchError> {
        let collection = self.write_collection(descriptor).await?;
        let report = self.report_path();

        // A stale report from an earlier run must never be read back.
        if let Err(e) = tokio::fs::remove_file(&report).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %report.display(), error = %e, "Cannot remove stale newman report");
            }
        }

        let collection_arg = collection.display().to_string();
        let report_arg = report.display().to_string();
        let timeout_ms = self.timeout.as_millis().to_string();
        let args = [
            "run",
            collection_arg.as_str(),
            "-r",
            "json",
            "--reporter-json-export",
            report_arg.as_str(),
            "--timeout-request",
            timeout_ms.as_str(),
        ];

        let output = self
            .runner
            .run_with_timeout(NEWMAN, &args, self.timeout + Duration::from_secs(5))
            .await?;
        output.stdout_if_success().map_err(FetchError::from)?;

        read_report(&report).await
    }
}

/// Builds the Postman v2.1 collection for a descriptor.
pub fn build_collection(descriptor: &RequestDescriptor) -> Value {
    let url = descriptor.url();
    let headers: Vec<Value> = descriptor
        .headers()
        .iter()
        .map(|(key, value)| json!({ "key": key, "value": value }))
        .collect();
    let host: Vec<&str> = url.host_str().unwrap_or_default().split('.').collect();
    let path: Vec<&str> = url.path().trim_matches('/').split('/').collect();

    let mut request = json!({
        "method": descriptor.method(),
        "header": headers,
        "url": {
            "raw": url.as_str(),
            "protocol": url.scheme(),
            "host": host,
            "path": path,
        },
    });

    if let Some(body) = descriptor.body() {
        request["body"] = json!({ "mode": "raw", "raw": body });
    }

    json!({
        "info": {
            "name": "QuotaBar",
            "schema": "https://schema.getpostman.com/json/collection/v2.1.0/collection.json",
        },
        "item": [{
            "name": url.as_str(),
            "request": request,
        }],
    })
}

async fn read_report(path: &Path) -> Result<RawResponse, FetchError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FetchError::Malformed(format!("newman report missing: {e}")))?;
    let report: Value = serde_json::from_str(&text)
        .map_err(|e| FetchError::Malformed(format!("newman report is not JSON: {e}")))?;
    extract_response(&report)
}

/// Pulls status and body out of a newman JSON report.
///
/// # Errors
///
/// Returns `Malformed` if the report has no execution or no response stream.
pub fn extract_response(report: &Value) -> Result<RawResponse, FetchError> {
    let response = report
        .pointer("/run/executions/0/response")
        .ok_or_else(|| FetchError::Malformed("newman report has no executions".to_string()))?;

    let status = response
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok());

    let stream = response
        .get("stream")
        .ok_or_else(|| FetchError::Malformed("newman report has no response stream".to_string()))?;

    // The stream is serialized as a Node Buffer: either the bare byte array
    // or `{"type": "Buffer", "data": [...]}`.
    let bytes = match stream {
        Value::String(s) => return Ok(RawResponse::new(status, s.clone())),
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Malformed("newman stream has no data".to_string()))?,
        _ => return Err(FetchError::Malformed("unrecognized newman stream".to_string())),
    };

    let bytes: Vec<u8> = bytes
        .iter()
        .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect::<Option<_>>()
        .ok_or_else(|| FetchError::Malformed("newman stream contains non-byte values".to_string()))?;

    let body = String::from_utf8(bytes)
        .map_err(|e| FetchError::Malformed(format!("response is not UTF-8: {e}")))?;
    Ok(RawResponse::new(status, body))
}

// ============================================================================
// Tests
// ============================================================================
