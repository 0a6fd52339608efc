//! `ragstack plan` — print the ordered resource plan without touching the
//! engine.
//!
//! Runs fully offline: physical identifiers are not known yet, so the plan
//! uses placeholder account values. The ordering and reference validation
//! are exactly what deploy will execute.

use anyhow::Result;

use crate::commands::ConfigArgs;
use crate::config::Config;
use crate::output::OutputContext;
use crate::stack;

/// Account placeholder used when planning offline.
const PLACEHOLDER_ACCOUNT: &str = "000000000000";

/// Run `ragstack plan`.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the declaration
/// fails validation.
pub fn run(ctx: &OutputContext, args: &ConfigArgs, json: bool) -> Result<()> {
    let config = Config::load(&args.config)?;
    let admin = format!("arn:aws:iam::{PLACEHOLDER_ACCOUNT}:user/operator");
    let stack = stack::build(&config, PLACEHOLDER_ACCOUNT, &admin);
    let order = stack.plan()?;

    if json {
        let entries: Vec<serde_json::Value> = order
            .iter()
            .map(|r| serde_json::json!({ "id": r.id, "kind": r.spec.kind() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    ctx.header(&format!("Plan for project '{}'", config.project));
    for (i, resource) in order.iter().enumerate() {
        ctx.kv(
            &format!("{:>2}.", i + 1),
            &format!("{}  ({})", resource.id, resource.spec.kind()),
        );
    }
    ctx.info(&format!(
        "{} resources; deploy with: ragstack deploy",
        order.len()
    ));
    Ok(())
}
