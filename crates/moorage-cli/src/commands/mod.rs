//! CLI command definitions and dispatch.

pub mod compose;
pub mod config;
pub mod plan;
pub mod services;

use clap::{Parser, Subcommand};

/// Moorage — service composition and startup planning.
#[derive(Parser, Debug)]
#[command(name = moorage_common::constants::BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the env profile file.
    #[arg(long, global = true, default_value = moorage_common::constants::DEFAULT_PROFILE)]
    pub profile: String,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge the matched fragments and print the orchestrator command.
    Compose(compose::ComposeArgs),
    /// List the services defined by the matched fragments.
    Services(services::ServicesArgs),
    /// Show the startup wave plan for the matched services.
    Plan(plan::PlanArgs),
    /// Read and write env profile values.
    Config(config::ConfigArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Compose(args) => compose::execute(args, &cli.profile),
        Command::Services(args) => services::execute(args, &cli.profile),
        Command::Plan(args) => plan::execute(args, &cli.profile),
        Command::Config(args) => config::execute(args, &cli.profile),
    }
}
