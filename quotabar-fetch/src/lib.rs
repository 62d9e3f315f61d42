// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `QuotaBar` Fetch
//!
//! Replays the captured usage request and turns the answer into a
//! [`UsageSnapshot`](quotabar_core::UsageSnapshot).
//!
//! ## Pipeline
//!
//! - [`descriptor::RequestDescriptor`] - the request, parsed from a browser
//!   "Copy as cURL" capture
//! - [`executor::RequestExecutor`] - runs the request through `curl` or
//!   `newman`
//! - [`fetcher::Fetcher`] - bounds the call with a timeout and classifies
//!   the response
//! - [`parser`] - reads the two quota windows out of the body
//!
//! ## Example
//!
//! ```ignore
//! use quotabar_fetch::{ExecutorKind, Fetcher, RequestDescriptor, parse_usage};
//!
//! let descriptor = RequestDescriptor::load(&path)?;
//! let executor = ExecutorKind::Curl.build(timeout, cache_dir);
//! let fetcher = Fetcher::new(descriptor, executor).with_timeout(timeout);
//!
//! let body = fetcher.fetch().await?;
//! let snapshot = parse_usage(&body, chrono::Utc::now())?;
//! ```

pub mod descriptor;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod parser;
pub mod process;

// Errors
pub use error::{DescriptorError, FetchError, ParseError, ProcessError};

// Request pipeline
pub use descriptor::RequestDescriptor;
pub use executor::{CurlExecutor, ExecutorKind, NewmanExecutor, RawResponse, RequestExecutor};
pub use fetcher::{DEFAULT_FETCH_TIMEOUT, Fetcher, classify};
pub use parser::{PartialUsage, parse_partial, parse_usage};

// Host APIs
pub use process::{ProcessOutput, ProcessRunner};
