//! CLI command implementations.

pub mod check;
pub mod config;
pub mod notify;
pub mod once;
pub mod run;
pub mod state;

use anyhow::{Context, Result};
use quotabar_fetch::{FetchError, Fetcher, RequestDescriptor};
use quotabar_store::Config;
use tracing::debug;

use crate::Cli;

/// Loads the config file and applies command-line overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config =
        Config::load_from(&path).with_context(|| format!("Cannot load config {}", path.display()))?;

    if let Some(descriptor) = &cli.descriptor {
        config.descriptor_path.clone_from(descriptor);
    }
    if let Some(interval) = cli.interval {
        config.refresh_interval_secs = interval;
    }
    if cli.verbose {
        config.verbose = true;
    }

    config.validate().context("Invalid configuration")?;
    debug!(?config, "Effective configuration");
    Ok(config)
}

/// Loads the captured request and builds a fetcher for it.
///
/// Fails if the descriptor is unusable or the executor is not installed.
pub fn build_fetcher(config: &Config) -> Result<Fetcher> {
    let descriptor = RequestDescriptor::load(&config.descriptor_path).with_context(|| {
        format!(
            "Cannot use captured request {} (paste a \"Copy as cURL\" command there)",
            config.descriptor_path.display()
        )
    })?;

    let executor = config
        .executor
        .build(config.fetch_timeout(), config.work_dir());
    if !executor.is_available() {
        return Err(FetchError::ExecutorMissing(executor.name().to_string()))
            .with_context(|| format!("'{}' is not installed or not on PATH", executor.name()));
    }

    Ok(Fetcher::new(descriptor, executor).with_timeout(config.fetch_timeout()))
}
