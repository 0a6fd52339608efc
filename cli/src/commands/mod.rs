//! Command implementations

pub mod bootstrap;
pub mod deploy;
pub mod destroy;
pub mod doctor;
pub mod outputs;
pub mod plan;
pub mod status;
pub mod version;

use std::path::PathBuf;

use clap::Args;

use crate::config::DEFAULT_CONFIG_FILE;

/// Arguments shared by commands that read the project config.
#[derive(Args)]
pub struct ConfigArgs {
    /// Path to the project config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

/// Arguments for commands that change cloud state.
#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}
