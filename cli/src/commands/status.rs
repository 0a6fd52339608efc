//! `ragstack status` — recorded stage plus live resource status.

use anyhow::Result;
use ragstack_common::DeployState;

use crate::engine::{self, Aws, AwsCli};
use crate::output::OutputContext;
use crate::state::StateManager;

/// Run `ragstack status`.
///
/// # Errors
///
/// Returns an error if the state file is unreadable.
pub async fn run(ctx: &OutputContext, json: bool) -> Result<()> {
    let state_mgr = StateManager::new()?;
    let Some(state) = state_mgr.load()? else {
        if json {
            println!(r#"{{"deployed":false}}"#);
        } else {
            ctx.info("No deployment. Run: ragstack deploy");
        }
        return Ok(());
    };
    let aws = AwsCli::new(state.region.clone());
    execute(ctx, &aws, &state, json).await
}

/// Status against an injected engine (tests use a double).
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub async fn execute(
    ctx: &OutputContext,
    aws: &impl Aws,
    state: &DeployState,
    json: bool,
) -> Result<()> {
    let domain_status = live_domain_status(aws, &state.project).await;
    let kb_status = live_kb_status(aws, state.outputs.knowledge_base_id.as_deref()).await;

    if json {
        let value = serde_json::json!({
            "deployed": true,
            "project": state.project,
            "region": state.region,
            "stage": state.stage,
            "domain_status": domain_status,
            "knowledge_base_status": kb_status,
            "outputs": state.outputs,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    ctx.header(&format!("'{}' in {}", state.project, state.region));
    ctx.kv("checkpoint      ", state.stage.description());
    ctx.kv("domain          ", domain_status.as_deref().unwrap_or("unknown"));
    ctx.kv(
        "knowledge base  ",
        kb_status.as_deref().unwrap_or("not created"),
    );
    ctx.info("Full identifiers: ragstack outputs");
    Ok(())
}

/// Live domain state, or `None` when it cannot be determined.
async fn live_domain_status(aws: &impl Aws, domain_name: &str) -> Option<String> {
    let output = aws.describe_domain(domain_name).await.ok()?;
    if !output.status.success() {
        return None;
    }
    let status = engine::parse_domain_status(&output).ok()?;
    Some(if status.processing {
        "processing".to_string()
    } else {
        "active".to_string()
    })
}

/// Live knowledge-base status, or `None` when it cannot be determined.
async fn live_kb_status(aws: &impl Aws, kb_id: Option<&str>) -> Option<String> {
    let output = aws.get_knowledge_base(kb_id?).await.ok()?;
    if !output.status.success() {
        return None;
    }
    let (_, status) = engine::parse_knowledge_base(&output).ok()?;
    Some(status)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::test_support::{MockAws, err_output};
    use chrono::Utc;
    use ragstack_common::{DeployStage, StackOutputs};

    fn state() -> DeployState {
        DeployState {
            stage: DeployStage::DataSourceAttached,
            project: "support-kb".to_string(),
            region: "us-east-1".to_string(),
            started_at: Utc::now(),
            outputs: StackOutputs {
                knowledge_base_id: Some("KB12345".to_string()),
                ..StackOutputs::default()
            },
        }
    }

    fn ctx() -> OutputContext {
        OutputContext::new(true, true)
    }

    #[tokio::test]
    async fn status_reports_live_domain_and_kb() {
        let aws = MockAws::happy();
        execute(&ctx(), &aws, &state(), false).await.unwrap();
        let calls = aws.calls();
        assert!(calls.iter().any(|c| c == "describe_domain support-kb"));
        assert!(calls.iter().any(|c| c == "get_knowledge_base KB12345"));
    }

    #[tokio::test]
    async fn status_tolerates_unreachable_domain() {
        let mut aws = MockAws::happy();
        aws.describe_domain = std::cell::RefCell::new(std::collections::VecDeque::from([
            err_output(b"ResourceNotFoundException"),
        ]));
        assert!(execute(&ctx(), &aws, &state(), false).await.is_ok());
    }

    #[tokio::test]
    async fn status_skips_kb_lookup_when_not_created() {
        let aws = MockAws::happy();
        let mut s = state();
        s.outputs.knowledge_base_id = None;
        execute(&ctx(), &aws, &s, false).await.unwrap();
        assert!(!aws.calls().iter().any(|c| c.starts_with("get_knowledge_base")));
    }
}
