//! State command - inspect or clear persisted notification state.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use quotabar_core::TrackerState;
use quotabar_store::{default_state_path, load_json_or_default, remove_file};

use crate::Cli;
use crate::output::TextFormatter;

/// Arguments for the state command.
#[derive(Args)]
pub struct StateArgs {
    #[command(subcommand)]
    pub action: StateAction,
}

/// State subcommands.
#[derive(Subcommand)]
pub enum StateAction {
    /// Show which thresholds already fired this cycle.
    Show,

    /// Forget fired thresholds so they notify again.
    Clear,
}

/// Runs the state command.
pub async fn run(args: &StateArgs, cli: &Cli) -> Result<()> {
    let path = default_state_path();

    match args.action {
        StateAction::Show => {
            let state: TrackerState = load_json_or_default(&path).await;
            println!("{}", TextFormatter::new(!cli.no_color).format_state(&state));
        }
        StateAction::Clear => {
            let removed = remove_file(&path)
                .await
                .with_context(|| format!("Cannot remove {}", path.display()))?;
            if removed {
                println!("Cleared {}", path.display());
            } else {
                println!("No saved state");
            }
        }
    }

    Ok(())
}
