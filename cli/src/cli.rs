//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::output::OutputContext;

/// Provision a cloud knowledge-base pipeline
#[derive(Parser)]
#[command(
    name = "ragstack",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Verify the environment and scaffold a config
    Bootstrap(commands::ConfigArgs),

    /// Create or resume the knowledge-base pipeline
    Deploy(commands::ApplyArgs),

    /// Tear down the pipeline in reverse order
    Destroy(commands::ApplyArgs),

    /// Show the ordered resource plan (offline)
    Plan(commands::ConfigArgs),

    /// Show deployment state and live resource status
    Status,

    /// Print the recorded stack outputs
    Outputs,

    /// Diagnose engine, credential, and config issues
    Doctor(commands::ConfigArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Self { json, quiet, no_color, command } = self;
        let ctx = OutputContext::new(no_color, quiet);
        match command {
            Command::Version => {
                commands::version::run(json);
                Ok(())
            }
            Command::Bootstrap(args) => commands::bootstrap::run(&ctx, &args).await,
            Command::Deploy(args) => commands::deploy::run(&ctx, &args).await,
            Command::Destroy(args) => commands::destroy::run(&ctx, &args).await,
            Command::Plan(args) => commands::plan::run(&ctx, &args, json),
            Command::Status => commands::status::run(&ctx, json).await,
            Command::Outputs => commands::outputs::run(&ctx, json),
            Command::Doctor(args) => commands::doctor::run(&ctx, &args.config, json).await,
        }
    }
}
