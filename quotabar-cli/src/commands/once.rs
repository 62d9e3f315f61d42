//! Once command - fetch usage a single time and print it.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use quotabar_fetch::parse_usage;
use tracing::info;

use super::{build_fetcher, load_config};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the once command.
#[derive(Args, Default)]
pub struct OnceArgs {
    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text")]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long)]
    pub pretty: bool,
}

/// Runs the once command.
pub async fn run(args: &OnceArgs, cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let fetcher = build_fetcher(&config)?;

    info!(executor = fetcher.executor().name(), "Fetching usage");
    let body = fetcher.fetch().await?;
    let now = Utc::now();
    let snapshot = parse_usage(&body, now).context("Unexpected usage response")?;

    let output = match args.format {
        OutputFormat::Text => TextFormatter::new(!cli.no_color).format_snapshot(&snapshot, now),
        OutputFormat::Json => JsonFormatter::new(args.pretty).format_snapshot(&snapshot, now)?,
    };
    println!("{output}");

    Ok(())
}
