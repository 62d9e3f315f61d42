// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! QuotaBar CLI - Claude usage quota monitoring from the terminal.
//!
//! # Examples
//!
//! ```bash
//! # Start the monitor (default command)
//! quotabar
//!
//! # Refresh every minute using a specific captured request
//! quotabar run --interval 60 --descriptor ~/claude-curl.txt
//!
//! # One-shot JSON snapshot
//! quotabar once --format json --pretty
//!
//! # Verify the captured request and executor
//! quotabar check
//!
//! # Forget which thresholds already fired
//! quotabar state clear
//!
//! # Check that desktop notifications arrive
//! quotabar notify-test
//! ```

mod commands;
mod output;
mod presenter;

use clap::{Parser, Subcommand, ValueEnum};
use quotabar_fetch::{DescriptorError, FetchError};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{check, config, notify, once, run, state};

// ============================================================================
// CLI Definition
// ============================================================================

/// QuotaBar - Claude usage quota monitor.
#[derive(Parser)]
#[command(name = "quotabar")]
#[command(about = "Claude usage quota monitor")]
#[command(long_about = r#"
QuotaBar polls Claude's usage endpoint with a request captured from the
browser ("Copy as cURL") and shows the 5-hour session and 7-day weekly
quotas. A desktop notification fires the first time usage crosses each
configured threshold in a reset cycle.

Examples:
  quotabar                       # Start monitoring
  quotabar once                  # Print current usage and exit
  quotabar once --format json    # JSON output
  quotabar check                 # Verify setup
  quotabar config init           # Write the default config file
  quotabar notify-test           # Send a test notification
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'run' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Captured request file (overrides the config).
    #[arg(long, short, global = true)]
    pub descriptor: Option<PathBuf>,

    /// Refresh interval in seconds (overrides the config).
    #[arg(long, short, global = true)]
    pub interval: Option<u64>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode (errors only).
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Monitor usage until interrupted (default if no command specified).
    #[command(visible_alias = "r")]
    Run,

    /// Fetch usage once and print it.
    #[command(visible_alias = "o")]
    Once(once::OnceArgs),

    /// Check the captured request and the executor.
    Check,

    /// Manage configuration.
    Config(config::ConfigArgs),

    /// Inspect or clear notification state.
    State(state::StateArgs),

    /// Send a test desktop notification.
    NotifyTest,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Captured request missing or invalid.
    DescriptorError = 2,
    /// Request executor not installed.
    ExecutorMissing = 3,
}

impl ExitCode {
    /// Picks the exit code for a failed command.
    fn for_error(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<DescriptorError>().is_some() {
            return ExitCode::DescriptorError;
        }
        match err.downcast_ref::<FetchError>() {
            Some(FetchError::ExecutorMissing(_)) => ExitCode::ExecutorMissing,
            _ => ExitCode::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    let default = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The config file can turn on debug logging too; peek at it before the
    // subscriber is installed.
    let verbose = cli.verbose || commands::load_config(&cli).is_ok_and(|c| c.verbose);
    setup_logging(verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Run) | None => run::run(&cli).await,
        Some(Commands::Once(args)) => once::run(args, &cli).await,
        Some(Commands::Check) => check::run(&cli),
        Some(Commands::Config(args)) => config::run(args, &cli),
        Some(Commands::State(args)) => state::run(args, &cli).await,
        Some(Commands::NotifyTest) => notify::run(),
    };

    let code = match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::for_error(&e)
        }
    };
    std::process::exit(code as i32);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::parse_from(["quotabar"]);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["quotabar", "--interval", "60", "run"]);
        assert!(matches!(cli.command, Some(Commands::Run)));
        assert_eq!(cli.interval, Some(60));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["quotabar", "once", "--format", "json", "-v", "--descriptor", "/tmp/c.txt"]);
        assert!(cli.verbose);
        assert_eq!(cli.descriptor, Some(PathBuf::from("/tmp/c.txt")));
        match cli.command {
            Some(Commands::Once(args)) => assert_eq!(args.format, OutputFormat::Json),
            _ => panic!("expected once"),
        }
    }

    #[test]
    fn test_notify_test_command() {
        let cli = Cli::parse_from(["quotabar", "notify-test"]);
        assert!(matches!(cli.command, Some(Commands::NotifyTest)));
    }

    #[test]
    fn test_exit_codes() {
        let err = Err::<(), _>(DescriptorError::MissingUrl)
            .context("loading")
            .unwrap_err();
        assert_eq!(ExitCode::for_error(&err), ExitCode::DescriptorError);

        let err = Err::<(), _>(FetchError::ExecutorMissing("curl".into()))
            .context("checking")
            .unwrap_err();
        assert_eq!(ExitCode::for_error(&err), ExitCode::ExecutorMissing);

        let err = anyhow::Error::new(FetchError::AuthExpired("401".into()));
        assert_eq!(ExitCode::for_error(&err), ExitCode::Error);

        assert_eq!(ExitCode::Success as i32, 0);
    }
}
