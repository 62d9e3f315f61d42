//! Run command - the monitoring loop.

use anyhow::Result;
use quotabar_core::{SystemClock, ThresholdTracker};
use quotabar_store::{Monitor, RefreshHandle, Scheduler, TriggerOutcome, load_tracker_state};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, info};

use super::{build_fetcher, load_config};
use crate::Cli;
use crate::presenter::TerminalPresenter;

/// What a line typed on stdin asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Refresh,
    Quit,
    Unknown,
}

fn parse_command(line: &str) -> Command {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "r" | "refresh" => Command::Refresh,
        "q" | "quit" | "exit" => Command::Quit,
        _ => Command::Unknown,
    }
}

/// Runs the monitor until Ctrl+C or `q`.
pub async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let fetcher = build_fetcher(&config)?;

    let state_path = config.state_path();
    let state = load_tracker_state(state_path.as_deref()).await;
    let tracker = ThresholdTracker::with_state(config.thresholds()?, config.crossing_policy, state);

    let interval = config.refresh_interval();
    info!(
        interval_secs = interval.as_secs(),
        thresholds = %tracker.thresholds(),
        executor = %config.executor,
        "Starting monitor"
    );

    let presenter = Arc::new(
        TerminalPresenter::new(!cli.no_color, config.notifications_enabled)
            .with_refresh_interval(interval),
    );
    let mut monitor = Monitor::new(fetcher, tracker, Arc::new(SystemClock), presenter)
        .with_state_path(state_path)
        .with_notifications(config.notifications_enabled);

    let (scheduler, handle) = Scheduler::new(interval);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    if !cli.quiet {
        println!("Press Enter to refresh now, q + Enter to quit.");
    }

    let ctrl_c = {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, shutting down");
                shutdown_tx.send_replace(true);
            }
        })
    };
    let stdin = tokio::spawn(read_stdin(handle, shutdown_tx.clone()));

    scheduler.run(&mut monitor, shutdown_rx).await;

    ctrl_c.abort();
    stdin.abort();
    Ok(())
}

/// Turns stdin lines into refresh and quit requests.
async fn read_stdin(handle: RefreshHandle, shutdown: Arc<watch::Sender<bool>>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        match parse_command(&line) {
            Command::Refresh => match handle.trigger() {
                TriggerOutcome::Accepted => debug!("Manual refresh requested"),
                TriggerOutcome::Busy => println!("Refresh already in progress"),
                TriggerOutcome::Stopped => break,
            },
            Command::Quit => {
                shutdown.send_replace(true);
                break;
            }
            Command::Unknown => println!("Unknown command {:?} (Enter = refresh, q = quit)", line.trim()),
        }
    }

    // Without a terminal the monitor keeps running until interrupted.
    debug!("Stopped reading stdin");
}

// ============================================================================
// Tests
// ============================================================================
