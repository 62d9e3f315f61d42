//! Check command - verify the setup without fetching.

use anyhow::{Result, bail};
use quotabar_fetch::{ProcessRunner, RequestDescriptor};
use quotabar_store::Config;

use super::load_config;
use crate::Cli;
use crate::output::TextFormatter;

/// Runs the check command.
///
/// Prints one row per item and fails if any of them is unusable.
pub fn run(cli: &Cli) -> Result<()> {
    let formatter = TextFormatter::new(!cli.no_color);
    let mut failures = 0;

    let config = match load_config(cli) {
        Ok(config) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            println!("{}", formatter.format_check("config", true, &path.display().to_string()));
            config
        }
        Err(e) => {
            println!("{}", formatter.format_check("config", false, &format!("{e:#}")));
            failures += 1;
            Config::default()
        }
    };

    match RequestDescriptor::load(&config.descriptor_path) {
        Ok(descriptor) => {
            let detail = format!("{} {}", descriptor.method(), descriptor.url());
            println!("{}", formatter.format_check("descriptor", true, &detail));
        }
        Err(e) => {
            let detail = format!("{} ({e})", config.descriptor_path.display());
            println!("{}", formatter.format_check("descriptor", false, &detail));
            failures += 1;
        }
    }

    let executor = config.executor.build(config.fetch_timeout(), config.work_dir());
    match ProcessRunner::new().which(executor.name()) {
        Some(path) => println!("{}", formatter.format_check(executor.name(), true, &path.display().to_string())),
        None => {
            println!("{}", formatter.format_check(executor.name(), false, "not found on PATH"));
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    Ok(())
}
