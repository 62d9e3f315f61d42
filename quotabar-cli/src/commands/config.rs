//! Config command - manage configuration.

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use quotabar_store::{Config, default_config_dir, default_state_path};
use tracing::info;

use super::load_config;
use crate::Cli;
use crate::output::JsonFormatter;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration as JSON.
    Show,

    /// Show configuration paths.
    Path,

    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => show_paths(cli),
        ConfigAction::Init { force } => init_config(cli, *force),
    }
}

fn config_path(cli: &Cli) -> std::path::PathBuf {
    cli.config.clone().unwrap_or_else(Config::default_path)
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    println!("{}", JsonFormatter::new(true).format(&config)?);
    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config = load_config(cli).unwrap_or_default();

    println!("Configuration Paths");
    println!("{}", "─".repeat(40));
    println!();
    println!("Config dir:   {}", default_config_dir().display());
    println!("Config file:  {}", config_path(cli).display());
    println!("Descriptor:   {}", config.descriptor_path.display());
    println!("State file:   {}", default_state_path().display());

    Ok(())
}

fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = config_path(cli);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default()
        .save_to(&path)
        .with_context(|| format!("Cannot write {}", path.display()))?;

    info!(path = %path.display(), "Wrote default config");
    println!("Wrote {}", path.display());
    println!("Paste a \"Copy as cURL\" capture into {}", Config::default().descriptor_path.display());
    Ok(())
}
