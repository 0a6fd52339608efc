//! `ragstack outputs` — print the identifiers downstream workflows need.

use anyhow::Result;
use ragstack_common::StackOutputs;

use crate::output::OutputContext;
use crate::state::StateManager;

/// Run `ragstack outputs`.
///
/// # Errors
///
/// Returns an error if no deployment is recorded.
pub fn run(ctx: &OutputContext, json: bool) -> Result<()> {
    let state_mgr = StateManager::new()?;
    let Some(state) = state_mgr.load()? else {
        anyhow::bail!("No deployment found. Run: ragstack deploy");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state.outputs)?);
        return Ok(());
    }

    ctx.header(&format!("Outputs for '{}'", state.project));
    print_human(ctx, &state.outputs);
    Ok(())
}

/// Key/value rendering shared with the deploy summary.
pub fn print_human(ctx: &OutputContext, outputs: &StackOutputs) {
    let rows: [(&str, &Option<String>); 8] = [
        ("bucket", &outputs.bucket_name),
        ("kb role arn", &outputs.kb_role_arn),
        ("admin arn", &outputs.admin_arn),
        ("domain arn", &outputs.domain_arn),
        ("domain endpoint", &outputs.domain_endpoint),
        ("index", &outputs.index_name),
        ("knowledge base id", &outputs.knowledge_base_id),
        ("data source id", &outputs.data_source_id),
    ];
    for (key, value) in rows {
        ctx.kv(&format!("{key:<18}"), value.as_deref().unwrap_or("-"));
    }
}
