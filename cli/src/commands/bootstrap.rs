//! `ragstack bootstrap` — environment preflight and config scaffolding.
//!
//! Verifies the engine binary and credentials before anything is deployed,
//! and writes a starter `ragstack.yaml` when none exists.

use std::path::Path;

use anyhow::{Context, Result};

use crate::commands::ConfigArgs;
use crate::config::{self, Config};
use crate::engine::{self, Aws, AwsCli};
use crate::output::OutputContext;

/// Run `ragstack bootstrap`.
///
/// # Errors
///
/// Returns an error if the engine is missing, credentials are invalid, or
/// an existing config fails validation.
pub async fn run(ctx: &OutputContext, args: &ConfigArgs) -> Result<()> {
    // region is irrelevant to the preflight calls; any valid value works
    let aws = AwsCli::new("us-east-1");
    execute(ctx, &aws, &args.config).await
}

/// Bootstrap against an injected engine (tests use a double).
///
/// # Errors
///
/// See [`run`].
pub async fn execute(ctx: &OutputContext, aws: &impl Aws, config_path: &Path) -> Result<()> {
    let version = aws.cli_version().await.context(
        "aws CLI not found.\n\nInstall it first: https://aws.amazon.com/cli/",
    )?;
    engine::require_success(&version, "aws --version")?;
    ctx.success(&format!(
        "Engine found: {}",
        String::from_utf8_lossy(&version.stdout).trim()
    ));

    let identity_output = aws.caller_identity().await?;
    engine::require_success(&identity_output, "credential check")
        .context("Credentials are missing or expired. Run: aws configure")?;
    let identity = engine::parse_caller_identity(&identity_output)?;
    ctx.success(&format!(
        "Credentials valid for account {} ({})",
        identity.account, identity.arn
    ));

    if config_path.exists() {
        let config = Config::load(config_path)?;
        ctx.success(&format!(
            "Config valid: project '{}' in {}",
            config.project, config.region
        ));
    } else {
        std::fs::write(config_path, config::SCAFFOLD)
            .with_context(|| format!("writing {}", config_path.display()))?;
        ctx.success(&format!("Wrote starter config {}", config_path.display()));
        ctx.info("Edit it, then run: ragstack deploy");
    }

    Ok(())
}
