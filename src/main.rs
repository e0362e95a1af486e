//! Patchwire CLI
//!
//! Command-line interface for the Patchwire patch editor.

use anyhow::Context;
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use patchwire::cli::commands;
use patchwire::cli::{Cli, Commands};
use patchwire::EditorConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; log records from the command layer are bridged too
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Patchwire v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Some(cmd) => handle_command(cmd, config),
        None => {
            println!("Patchwire v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: EditorConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::New { path, force } => commands::new_patch(&path, force)
            .with_context(|| format!("creating {}", path.display())),
        Commands::Apply {
            path,
            script,
            output,
        } => commands::apply_script(&path, &script, output.as_deref(), config)
            .with_context(|| format!("applying {}", script.display())),
        Commands::Layout { path } => commands::layout(&path, config)
            .with_context(|| format!("laying out {}", path.display())),
        Commands::Inspect { path, json } => commands::inspect(&path, json, config)
            .with_context(|| format!("inspecting {}", path.display())),
    }
}
