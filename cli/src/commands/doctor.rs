//! `ragstack doctor` — engine, credential, config, and state diagnostics.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::engine::{self, Aws, AwsCli};
use crate::output::OutputContext;
use crate::state::StateManager;

/// All checks returned by the doctor command.
#[derive(Debug, Serialize)]
pub struct DoctorChecks {
    /// Whether the `aws` binary responds.
    pub engine_found: bool,
    /// Engine version line when available.
    pub engine_version: Option<String>,
    /// Whether the credentials resolve to an identity.
    pub credentials_ok: bool,
    /// Caller ARN when credentials are valid.
    pub identity: Option<String>,
    /// Whether a config file exists at the given path.
    pub config_found: bool,
    /// Whether the config parses and validates.
    pub config_valid: bool,
    /// Project name from a valid config.
    pub project: Option<String>,
    /// Whether a deploy checkpoint is recorded.
    pub state_present: bool,
    /// Recorded checkpoint description, if any.
    pub checkpoint: Option<String>,
}

/// Run `ragstack doctor`.
///
/// # Errors
///
/// Returns an error when a critical check (engine, credentials) fails, so
/// the exit code is useful in scripts.
pub async fn run(ctx: &OutputContext, config_path: &Path, json: bool) -> Result<()> {
    let aws = AwsCli::new("us-east-1");
    let state_mgr = StateManager::new()?;
    let checks = gather(&aws, config_path, &state_mgr).await;
    render(ctx, &checks, json)?;
    anyhow::ensure!(
        checks.engine_found && checks.credentials_ok,
        "doctor found problems"
    );
    Ok(())
}

/// Collect every check without failing early.
pub async fn gather(aws: &impl Aws, config_path: &Path, state_mgr: &StateManager) -> DoctorChecks {
    let (engine_found, engine_version) = match aws.cli_version().await {
        Ok(output) if output.status.success() => (
            true,
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string()),
        ),
        _ => (false, None),
    };

    let (credentials_ok, identity) = match aws.caller_identity().await {
        Ok(output) if output.status.success() => match engine::parse_caller_identity(&output) {
            Ok(identity) => (true, Some(identity.arn)),
            Err(_) => (false, None),
        },
        _ => (false, None),
    };

    let config_found = config_path.exists();
    let (config_valid, project) = if config_found {
        match Config::load(config_path) {
            Ok(config) => (true, Some(config.project)),
            Err(_) => (false, None),
        }
    } else {
        (false, None)
    };

    let (state_present, checkpoint) = match state_mgr.load() {
        Ok(Some(state)) => (true, Some(state.stage.description().to_string())),
        _ => (false, None),
    };

    DoctorChecks {
        engine_found,
        engine_version,
        credentials_ok,
        identity,
        config_found,
        config_valid,
        project,
        state_present,
        checkpoint,
    }
}

fn render(ctx: &OutputContext, checks: &DoctorChecks, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(checks)?);
        return Ok(());
    }

    ctx.header("Engine");
    if checks.engine_found {
        ctx.success(checks.engine_version.as_deref().unwrap_or("aws CLI found"));
    } else {
        ctx.error("aws CLI not found — install it: https://aws.amazon.com/cli/");
    }

    ctx.header("Credentials");
    if checks.credentials_ok {
        ctx.success(checks.identity.as_deref().unwrap_or("valid"));
    } else {
        ctx.error("credentials missing or expired — run: aws configure");
    }

    ctx.header("Config");
    match (checks.config_found, checks.config_valid) {
        (true, true) => ctx.success(&format!(
            "project '{}'",
            checks.project.as_deref().unwrap_or("?")
        )),
        (true, false) => ctx.error("config present but invalid"),
        _ => ctx.warn("no config file — run: ragstack bootstrap"),
    }

    ctx.header("State");
    if checks.state_present {
        ctx.success(checks.checkpoint.as_deref().unwrap_or("recorded"));
    } else {
        ctx.info("no deployment recorded");
    }

    Ok(())
}
