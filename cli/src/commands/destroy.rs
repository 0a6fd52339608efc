//! `ragstack destroy` — tear down the pipeline in reverse dependency
//! order.
//!
//! Resources that are already gone are skipped. The vector index is never
//! deleted directly; it disappears with the domain. A non-empty document
//! bucket aborts with a hint instead of force-emptying it.

use anyhow::{Context, Result};
use ragstack_common::DeployState;

use crate::commands::ApplyArgs;
use crate::config::Config;
use crate::engine::{self, Aws, AwsCli};
use crate::output::{OutputContext, ProgressReporter, TerminalReporter};
use crate::stack;
use crate::state::StateManager;

/// Run `ragstack destroy`.
///
/// # Errors
///
/// Returns an error if teardown of any resource fails.
pub async fn run(ctx: &OutputContext, args: &ApplyArgs) -> Result<()> {
    let config = Config::load(&args.config.config)?;
    let aws = AwsCli::new(config.region.clone());
    let state_mgr = StateManager::new()?;
    execute(ctx, &aws, &state_mgr, &config, args.yes).await
}

/// Destroy against an injected engine (tests use a double).
///
/// # Errors
///
/// See [`run`].
pub async fn execute(
    ctx: &OutputContext,
    aws: &impl Aws,
    state_mgr: &StateManager,
    config: &Config,
    yes: bool,
) -> Result<()> {
    let Some(state) = state_mgr.load()? else {
        ctx.info("Nothing deployed.");
        return Ok(());
    };
    anyhow::ensure!(
        state.project == config.project && state.region == config.region,
        "Recorded stack is '{}' in {} — destroy it with its own config",
        state.project,
        state.region
    );

    if !ctx.quiet {
        println!();
        println!("This will remove the '{}' pipeline:", state.project);
        println!("  • data source and knowledge base");
        println!("  • search domain (including the vector index)");
        println!("  • service role and policies");
        println!("  • document bucket (must be empty)");
        println!();
    }

    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Continue?")
            .default(false)
            .interact()
            .context("destroy confirmation")?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let reporter = TerminalReporter::new(ctx);
    teardown(aws, config, &state, &reporter).await?;
    state_mgr.clear()?;
    ctx.success("Stack destroyed");
    Ok(())
}

/// Reverse-plan teardown. Each step tolerates an already-missing resource.
async fn teardown(
    aws: &impl Aws,
    config: &Config,
    state: &DeployState,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    if let (Some(kb_id), Some(ds_id)) = (
        state.outputs.knowledge_base_id.as_deref(),
        state.outputs.data_source_id.as_deref(),
    ) {
        reporter.step("Removing data source");
        tolerate_missing(
            &aws.delete_data_source(kb_id, ds_id).await?,
            "delete data source",
            reporter,
        )?;
    }

    if let Some(kb_id) = state.outputs.knowledge_base_id.as_deref() {
        reporter.step("Removing knowledge base");
        tolerate_missing(
            &aws.delete_knowledge_base(kb_id).await?,
            "delete knowledge base",
            reporter,
        )?;
    }

    reporter.step("Removing search domain");
    tolerate_missing(
        &aws.delete_domain(config.domain_name()).await?,
        "delete domain",
        reporter,
    )?;

    reporter.step("Removing service role");
    let role = config.kb_role_name();
    for policy_name in [
        stack::POLICY_MODEL_INVOKE,
        stack::POLICY_DOMAIN_HTTP,
        stack::POLICY_BUCKET_READ,
    ] {
        tolerate_missing(
            &aws.delete_role_policy(&role, policy_name).await?,
            "delete role policy",
            reporter,
        )?;
    }
    tolerate_missing(&aws.delete_role(&role).await?, "delete role", reporter)?;

    if let Some(bucket) = state.outputs.bucket_name.as_deref() {
        reporter.step("Removing document bucket");
        let output = aws.delete_bucket(bucket).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("BucketNotEmpty") {
                anyhow::bail!(
                    "bucket {bucket} is not empty.\n\n\
                     Empty it first: aws s3 rm --recursive s3://{bucket}"
                );
            }
            tolerate_missing(&output, "delete bucket", reporter)?;
        }
    }

    Ok(())
}

/// Require success, but treat an already-missing resource as done.
fn tolerate_missing(
    output: &std::process::Output,
    what: &str,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    if !output.status.success() && engine::not_found(output) {
        reporter.warn(&format!("{what}: already gone"));
        return Ok(());
    }
    engine::require_success(output, what)
}
