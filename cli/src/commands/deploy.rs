//! `ragstack deploy` — execute the plan stage by stage with checkpointing.
//!
//! Each stage records the identifiers it produced and advances the state
//! file, so an interrupted deploy resumes after the last completed stage.
//! The knowledge-base stage resolves the domain endpoint and role ARN from
//! the recorded outputs; a missing identifier fails resolution instead of
//! creating a dangling resource.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use ragstack_common::{DeployStage, DeployState, StackOutputs};

use crate::commands::ApplyArgs;
use crate::config::Config;
use crate::domain::index::{self, IndexSettings};
use crate::domain::policy;
use crate::domain::resource::{DomainSpec, ResourceSpec};
use crate::engine::{self, Aws, AwsCli, CallerIdentity, Credentials};
use crate::output::{OutputContext, ProgressReporter, TerminalReporter};
use crate::search::bootstrap;
use crate::search::{SearchHttp, SignedClient};
use crate::stack::{self, Stack};
use crate::state::StateManager;

/// Polling cadence for the engine-side waiters.
pub struct DeployWaits {
    pub domain_interval: Duration,
    pub domain_attempts: u32,
    pub kb_interval: Duration,
    pub kb_attempts: u32,
    pub index: bootstrap::Waits,
}

impl Default for DeployWaits {
    fn default() -> Self {
        Self {
            // domain creation routinely takes 15-30 minutes
            domain_interval: Duration::from_secs(20),
            domain_attempts: 90,
            kb_interval: Duration::from_secs(10),
            kb_attempts: 30,
            index: bootstrap::Waits::default(),
        }
    }
}

/// Run `ragstack deploy`.
///
/// # Errors
///
/// Returns an error if validation, confirmation, or any stage fails.
pub async fn run(ctx: &OutputContext, args: &ApplyArgs) -> Result<()> {
    let config = Config::load(&args.config.config)?;
    let aws = AwsCli::new(config.region.clone());
    let state_mgr = StateManager::new()?;
    let region = config.region.clone();
    execute(
        ctx,
        &aws,
        &state_mgr,
        &config,
        args.yes,
        &DeployWaits::default(),
        &|endpoint: &str, credentials: Credentials| {
            SignedClient::new(endpoint, region.clone(), credentials)
        },
    )
    .await
}

/// Deploy against injected collaborators (tests use doubles).
///
/// # Errors
///
/// See [`run`].
pub async fn execute<A: Aws, S: SearchHttp>(
    ctx: &OutputContext,
    aws: &A,
    state_mgr: &StateManager,
    config: &Config,
    yes: bool,
    waits: &DeployWaits,
    es_factory: &impl Fn(&str, Credentials) -> S,
) -> Result<()> {
    let identity_output = aws.caller_identity().await?;
    engine::require_success(&identity_output, "credential check")
        .context("Credentials are missing or expired. Run: aws configure")?;
    let identity = engine::parse_caller_identity(&identity_output)?;

    let stack = stack::build(config, &identity.account, &identity.arn);
    let order = stack.plan()?;

    ctx.header(&format!(
        "Deploying '{}' to {} (account {})",
        config.project, config.region, identity.account
    ));
    for (i, resource) in order.iter().enumerate() {
        ctx.kv(
            &format!("{:>2}.", i + 1),
            &format!("{}  ({})", resource.id, resource.spec.kind()),
        );
    }

    if !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Deploy {} resources to {}?",
                order.len(),
                config.region
            ))
            .default(true)
            .interact()
            .context("deploy confirmation")?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let existing = match state_mgr.load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Warning: state file unreadable ({e}), starting fresh");
            None
        }
    };

    let reporter = TerminalReporter::new(ctx);
    // fresh deploys start at the first stage; resumed ones continue after
    // the recorded checkpoint
    let (mut state, first) = match existing {
        Some(state) if state.project == config.project && state.region == config.region => {
            if state.stage == DeployStage::DataSourceAttached {
                ctx.success("Stack already deployed. See: ragstack outputs");
                return Ok(());
            }
            ctx.info(&format!("Resuming after: {}", state.stage.description()));
            let first = state.stage.next();
            (state, first)
        }
        Some(state) => anyhow::bail!(
            "A different stack ('{}' in {}) is recorded. Destroy it first: ragstack destroy",
            state.project,
            state.region
        ),
        None => (
            DeployState {
                stage: DeployStage::BucketCreated,
                project: config.project.clone(),
                region: config.region.clone(),
                started_at: Utc::now(),
                outputs: StackOutputs {
                    admin_arn: Some(identity.arn.clone()),
                    ..StackOutputs::default()
                },
            },
            Some(DeployStage::BucketCreated),
        ),
    };

    let mut next = first;
    while let Some(stage) = next {
        let pb = ctx
            .show_progress()
            .then(|| crate::output::progress::spinner(stage.description()));
        let result =
            execute_stage(aws, &stack, &identity, &mut state, stage, waits, es_factory, &reporter)
                .await;
        match (pb, &result) {
            (Some(pb), Ok(())) => crate::output::progress::finish_ok(&pb, stage.description()),
            (Some(pb), Err(_)) => pb.finish_and_clear(),
            (None, Ok(())) => reporter.success(stage.description()),
            (None, Err(_)) => {}
        }
        result?;
        state_mgr.advance(&mut state, stage)?;
        next = stage.next();
    }

    ctx.success("Deploy complete");
    super::outputs::print_human(ctx, &state.outputs);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn execute_stage<A: Aws, S: SearchHttp>(
    aws: &A,
    stack: &Stack,
    identity: &CallerIdentity,
    state: &mut DeployState,
    stage: DeployStage,
    waits: &DeployWaits,
    es_factory: &impl Fn(&str, Credentials) -> S,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    match stage {
        DeployStage::BucketCreated => ensure_bucket(aws, stack, state, reporter).await,
        DeployStage::RolesCreated => ensure_roles(aws, stack, state, reporter).await,
        DeployStage::DomainActive => {
            ensure_domain(aws, stack, identity, state, waits, reporter).await
        }
        DeployStage::IndexInitialized => {
            init_index(aws, stack, state, waits, es_factory, reporter).await
        }
        DeployStage::KnowledgeBaseActive => {
            ensure_knowledge_base(aws, stack, state, waits, reporter).await
        }
        DeployStage::DataSourceAttached => attach_data_source(aws, stack, state, reporter).await,
    }
}

// ── Stages ────────────────────────────────────────────────────────────────────

async fn ensure_bucket(
    aws: &impl Aws,
    stack: &Stack,
    state: &mut DeployState,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let Some(resource) = stack.get(stack::DOCUMENT_BUCKET) else {
        anyhow::bail!("declaration missing document bucket");
    };
    let ResourceSpec::Bucket(spec) = &resource.spec else {
        anyhow::bail!("'{}' is not a bucket", resource.id);
    };

    let head = aws.head_bucket(&spec.name).await?;
    if head.status.success() {
        reporter.step(&format!("Bucket {} already exists, reusing", spec.name));
    } else {
        reporter.step(&format!("Creating bucket {}", spec.name));
        let created = aws.create_bucket(&spec.name).await?;
        if !created.status.success() && !engine::already_exists(&created) {
            engine::require_success(&created, "create bucket")?;
        }
        engine::require_success(
            &aws.put_public_access_block(&spec.name).await?,
            "block public access",
        )?;
        engine::require_success(
            &aws.put_bucket_encryption(&spec.name).await?,
            "enable bucket encryption",
        )?;
    }

    state.outputs.bucket_name = Some(spec.name.clone());
    Ok(())
}

async fn ensure_roles(
    aws: &impl Aws,
    stack: &Stack,
    state: &mut DeployState,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let Some(resource) = stack.get(stack::KB_ROLE) else {
        anyhow::bail!("declaration missing knowledge-base role");
    };
    let ResourceSpec::Role(spec) = &resource.spec else {
        anyhow::bail!("'{}' is not a role", resource.id);
    };

    reporter.step(&format!("Creating role {}", spec.name));
    let trust = serde_json::to_string(&spec.trust).context("serializing trust policy")?;
    let created = aws.create_role(&spec.name, &trust).await?;
    if !created.status.success() && !engine::already_exists(&created) {
        engine::require_success(&created, "create role")?;
    }
    let output = if created.status.success() {
        created
    } else {
        reporter.step(&format!("Role {} already exists, reusing", spec.name));
        let existing = aws.get_role(&spec.name).await?;
        engine::require_success(&existing, "get role")?;
        existing
    };
    let role_arn = engine::parse_role_arn(&output)?;

    for (policy_name, document) in &spec.inline_policies {
        let json = serde_json::to_string(document)
            .with_context(|| format!("serializing policy {policy_name}"))?;
        engine::require_success(
            &aws.put_role_policy(&spec.name, policy_name, &json).await?,
            &format!("attach policy {policy_name}"),
        )?;
    }

    state.outputs.kb_role_arn = Some(role_arn);
    Ok(())
}

async fn ensure_domain(
    aws: &impl Aws,
    stack: &Stack,
    identity: &CallerIdentity,
    state: &mut DeployState,
    waits: &DeployWaits,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let Some(resource) = stack.get(stack::SEARCH_DOMAIN) else {
        anyhow::bail!("declaration missing search domain");
    };
    let ResourceSpec::Domain(spec) = &resource.spec else {
        anyhow::bail!("'{}' is not a domain", resource.id);
    };

    let kb_role_arn = stack::resolve(&spec.access_role, &state.outputs)?;
    let domain_arn = stack::domain_arn(&state.region, &identity.account, &spec.name);
    let access_policy = policy::domain_access(
        &[kb_role_arn, spec.master_user_arn.clone()],
        &domain_arn,
    );
    let input = domain_input(spec, &access_policy)?;

    reporter.step(&format!("Creating search domain {}", spec.name));
    let created = aws.create_domain(&input).await?;
    if !created.status.success() && !engine::already_exists(&created) {
        engine::require_success(&created, "create domain")?;
    }

    reporter.step("Waiting for domain to become active (this can take 15+ minutes)");
    let status = wait_domain_active(aws, &spec.name, waits, reporter).await?;
    state.outputs.domain_arn = Some(status.arn);
    state.outputs.domain_endpoint = status.endpoint;
    Ok(())
}

/// `create-domain` request payload. The access policy is embedded as a
/// JSON string, the way the API expects it.
fn domain_input(spec: &DomainSpec, access_policy: &policy::PolicyDocument) -> Result<String> {
    let value = serde_json::json!({
        "DomainName": spec.name,
        "EngineVersion": spec.engine_version,
        "ClusterConfig": {
            "InstanceType": spec.instance_type,
            "InstanceCount": spec.instance_count,
        },
        "EBSOptions": {
            "EBSEnabled": true,
            "VolumeType": "gp3",
            "VolumeSize": spec.volume_gib,
        },
        "EncryptionAtRestOptions": { "Enabled": true },
        "NodeToNodeEncryptionOptions": { "Enabled": true },
        "DomainEndpointOptions": { "EnforceHTTPS": true },
        "AdvancedSecurityOptions": {
            "Enabled": true,
            "InternalUserDatabaseEnabled": false,
            "MasterUserOptions": { "MasterUserARN": spec.master_user_arn },
        },
        "AccessPolicies": serde_json::to_string(access_policy)
            .context("serializing domain access policy")?,
    });
    serde_json::to_string(&value).context("serializing create-domain input")
}

async fn wait_domain_active(
    aws: &impl Aws,
    name: &str,
    waits: &DeployWaits,
    reporter: &impl ProgressReporter,
) -> Result<engine::DomainStatus> {
    for attempt in 1..=waits.domain_attempts {
        let output = aws.describe_domain(name).await?;
        engine::require_success(&output, "describe domain")?;
        let status = engine::parse_domain_status(&output)?;
        if !status.processing && status.endpoint.is_some() {
            return Ok(status);
        }
        if attempt % 6 == 0 {
            reporter.step(&format!(
                "Domain still provisioning (check {attempt}/{})",
                waits.domain_attempts
            ));
        }
        if attempt < waits.domain_attempts {
            tokio::time::sleep(waits.domain_interval).await;
        }
    }
    anyhow::bail!(
        "domain {name} did not become active after {} checks",
        waits.domain_attempts
    )
}

async fn init_index<S: SearchHttp>(
    aws: &impl Aws,
    stack: &Stack,
    state: &mut DeployState,
    waits: &DeployWaits,
    es_factory: &impl Fn(&str, Credentials) -> S,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let Some(resource) = stack.get(stack::INDEX_INIT) else {
        anyhow::bail!("declaration missing index initializer");
    };
    let ResourceSpec::IndexInit(spec) = &resource.spec else {
        anyhow::bail!("'{}' is not an index initializer", resource.id);
    };

    let endpoint = stack::resolve(&spec.endpoint, &state.outputs)?;
    let kb_role_arn = stack::resolve(&spec.kb_role_arn, &state.outputs)?;

    let credentials_output = aws.export_credentials().await?;
    engine::require_success(&credentials_output, "export credentials")?;
    let credentials = engine::parse_credentials(&credentials_output)?;

    let es = es_factory(&endpoint, credentials);
    let settings = IndexSettings::new(spec.index_name.clone(), spec.dimension);
    bootstrap::run(
        &es,
        &bootstrap::BootstrapParams {
            index: &settings,
            kb_role_arn: &kb_role_arn,
            admin_arn: &spec.admin_arn,
        },
        &waits.index,
        reporter,
    )
    .await?;

    state.outputs.index_name = Some(spec.index_name.clone());
    Ok(())
}

async fn ensure_knowledge_base(
    aws: &impl Aws,
    stack: &Stack,
    state: &mut DeployState,
    waits: &DeployWaits,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let Some(resource) = stack.get(stack::KNOWLEDGE_BASE) else {
        anyhow::bail!("declaration missing knowledge base");
    };
    let ResourceSpec::KnowledgeBase(spec) = &resource.spec else {
        anyhow::bail!("'{}' is not a knowledge base", resource.id);
    };

    let role_arn = stack::resolve(&spec.role_arn, &state.outputs)?;
    let domain_arn = stack::resolve(&spec.domain_arn, &state.outputs)?;
    let endpoint = stack::resolve(&spec.domain_endpoint, &state.outputs)?;

    let input = serde_json::to_string(&serde_json::json!({
        "name": spec.name,
        "roleArn": role_arn,
        "knowledgeBaseConfiguration": {
            "type": "VECTOR",
            "vectorKnowledgeBaseConfiguration": {
                "embeddingModelArn": spec.embedding_model_arn,
            },
        },
        "storageConfiguration": {
            "type": "OPENSEARCH_MANAGED_CLUSTER",
            "opensearchManagedClusterConfiguration": {
                "domainArn": domain_arn,
                "domainEndpoint": format!("https://{endpoint}"),
                "vectorIndexName": spec.index_name,
                "fieldMapping": {
                    "vectorField": index::VECTOR_FIELD,
                    "textField": index::TEXT_FIELD,
                    "metadataField": index::METADATA_FIELD,
                },
            },
        },
    }))
    .context("serializing create-knowledge-base input")?;

    reporter.step(&format!("Creating knowledge base {}", spec.name));
    let created = aws.create_knowledge_base(&input).await?;
    engine::require_success(&created, "create knowledge base")?;
    let (id, mut status) = engine::parse_knowledge_base(&created)?;

    let mut attempt = 0;
    while status != "ACTIVE" {
        anyhow::ensure!(
            status != "FAILED",
            "knowledge base {id} entered FAILED state"
        );
        attempt += 1;
        anyhow::ensure!(
            attempt <= waits.kb_attempts,
            "knowledge base {id} not active after {} checks",
            waits.kb_attempts
        );
        tokio::time::sleep(waits.kb_interval).await;
        let output = aws.get_knowledge_base(&id).await?;
        engine::require_success(&output, "get knowledge base")?;
        (_, status) = engine::parse_knowledge_base(&output)?;
    }

    state.outputs.knowledge_base_id = Some(id);
    Ok(())
}

async fn attach_data_source(
    aws: &impl Aws,
    stack: &Stack,
    state: &mut DeployState,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let Some(resource) = stack.get(stack::DATA_SOURCE) else {
        anyhow::bail!("declaration missing data source");
    };
    let ResourceSpec::DataSource(spec) = &resource.spec else {
        anyhow::bail!("'{}' is not a data source", resource.id);
    };

    let kb_id = stack::resolve(&spec.knowledge_base_id, &state.outputs)?;
    let bucket_arn = stack::resolve(&spec.bucket_arn, &state.outputs)?;

    let input = serde_json::to_string(&serde_json::json!({
        "knowledgeBaseId": kb_id,
        "name": spec.name,
        "dataSourceConfiguration": {
            "type": "S3",
            "s3Configuration": { "bucketArn": bucket_arn },
        },
    }))
    .context("serializing create-data-source input")?;

    reporter.step(&format!("Attaching data source {}", spec.name));
    let created = aws.create_data_source(&input).await?;
    engine::require_success(&created, "create data source")?;
    state.outputs.data_source_id = Some(engine::parse_data_source_id(&created)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::engine::test_support::{MockAws, err_output, ok_output};
    use crate::search::client::test_support::{MockSearch, ok};
    use tempfile::TempDir;

    fn test_config() -> Config {
        let config: Config =
            serde_yaml::from_str("project: support-kb\nregion: us-east-1\n").unwrap();
        config.validate().unwrap();
        config
    }

    fn fast_waits() -> DeployWaits {
        DeployWaits {
            domain_interval: Duration::ZERO,
            domain_attempts: 5,
            kb_interval: Duration::ZERO,
            kb_attempts: 5,
            index: bootstrap::Waits {
                health_interval: Duration::ZERO,
                health_attempts: 3,
                propagation: Duration::ZERO,
            },
        }
    }

    fn es_factory(_endpoint: &str, _credentials: Credentials) -> MockSearch {
        MockSearch::new(vec![ok(r#"{"status":"green"}"#)])
    }

    fn ctx() -> OutputContext {
        OutputContext::new(true, true)
    }

    async fn deploy(aws: &MockAws, dir: &TempDir) -> Result<()> {
        let state_mgr = StateManager::with_path(dir.path().join("state.json"));
        execute(
            &ctx(),
            aws,
            &state_mgr,
            &test_config(),
            true,
            &fast_waits(),
            &es_factory,
        )
        .await
    }

    #[tokio::test]
    async fn fresh_deploy_completes_all_stages_and_records_outputs() {
        let dir = TempDir::new().unwrap();
        let aws = MockAws::happy();
        deploy(&aws, &dir).await.unwrap();

        let state = StateManager::with_path(dir.path().join("state.json"))
            .load()
            .unwrap()
            .expect("state written");
        assert_eq!(state.stage, DeployStage::DataSourceAttached);
        assert_eq!(
            state.outputs.bucket_name.as_deref(),
            Some("support-kb-docs-123456789012")
        );
        assert_eq!(
            state.outputs.kb_role_arn.as_deref(),
            Some("arn:aws:iam::123456789012:role/support-kb-kb-role")
        );
        assert_eq!(
            state.outputs.domain_endpoint.as_deref(),
            Some("search-support-kb.us-east-1.es.amazonaws.com")
        );
        assert_eq!(state.outputs.index_name.as_deref(), Some("support-kb-index"));
        assert_eq!(state.outputs.knowledge_base_id.as_deref(), Some("KB12345"));
        assert_eq!(state.outputs.data_source_id.as_deref(), Some("DS67890"));
        assert_eq!(
            state.outputs.admin_arn.as_deref(),
            Some("arn:aws:iam::123456789012:user/operator")
        );
    }

    #[tokio::test]
    async fn fresh_deploy_calls_engine_in_pipeline_order() {
        let dir = TempDir::new().unwrap();
        let aws = MockAws::happy();
        deploy(&aws, &dir).await.unwrap();

        let calls = aws.calls();
        let index_of = |needle: &str| {
            calls
                .iter()
                .position(|c| c.starts_with(needle))
                .unwrap_or_else(|| panic!("{needle} not called; calls: {calls:?}"))
        };
        assert!(index_of("create_bucket") < index_of("create_role"));
        assert!(index_of("create_role") < index_of("create_domain"));
        assert!(index_of("create_domain") < index_of("export_credentials"));
        assert!(index_of("export_credentials") < index_of("create_knowledge_base"));
        assert!(index_of("create_knowledge_base") < index_of("create_data_source"));
    }

    #[tokio::test]
    async fn resume_skips_completed_stages() {
        let dir = TempDir::new().unwrap();
        let state_mgr = StateManager::with_path(dir.path().join("state.json"));
        state_mgr
            .save(&DeployState {
                stage: DeployStage::DomainActive,
                project: "support-kb".to_string(),
                region: "us-east-1".to_string(),
                started_at: Utc::now(),
                outputs: StackOutputs {
                    bucket_name: Some("support-kb-docs-123456789012".to_string()),
                    kb_role_arn: Some(
                        "arn:aws:iam::123456789012:role/support-kb-kb-role".to_string(),
                    ),
                    admin_arn: Some("arn:aws:iam::123456789012:user/operator".to_string()),
                    domain_arn: Some(
                        "arn:aws:es:us-east-1:123456789012:domain/support-kb".to_string(),
                    ),
                    domain_endpoint: Some(
                        "search-support-kb.us-east-1.es.amazonaws.com".to_string(),
                    ),
                    ..StackOutputs::default()
                },
            })
            .unwrap();

        let aws = MockAws::happy();
        execute(
            &ctx(),
            &aws,
            &state_mgr,
            &test_config(),
            true,
            &fast_waits(),
            &es_factory,
        )
        .await
        .unwrap();

        let calls = aws.calls();
        assert!(!calls.iter().any(|c| c.starts_with("create_bucket")));
        assert!(!calls.iter().any(|c| c.starts_with("create_role")));
        assert!(!calls.iter().any(|c| c.starts_with("create_domain")));
        assert!(calls.iter().any(|c| c.starts_with("create_knowledge_base")));
        assert!(calls.iter().any(|c| c.starts_with("create_data_source")));

        let state = state_mgr.load().unwrap().expect("state present");
        assert_eq!(state.stage, DeployStage::DataSourceAttached);
    }

    #[tokio::test]
    async fn completed_deploy_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let state_mgr = StateManager::with_path(dir.path().join("state.json"));
        state_mgr
            .save(&DeployState {
                stage: DeployStage::DataSourceAttached,
                project: "support-kb".to_string(),
                region: "us-east-1".to_string(),
                started_at: Utc::now(),
                outputs: StackOutputs::default(),
            })
            .unwrap();

        let aws = MockAws::happy();
        execute(
            &ctx(),
            &aws,
            &state_mgr,
            &test_config(),
            true,
            &fast_waits(),
            &es_factory,
        )
        .await
        .unwrap();
        assert!(!aws.calls().iter().any(|c| c.starts_with("create_")));
    }

    #[tokio::test]
    async fn different_recorded_stack_is_rejected() {
        let dir = TempDir::new().unwrap();
        let state_mgr = StateManager::with_path(dir.path().join("state.json"));
        state_mgr
            .save(&DeployState {
                stage: DeployStage::BucketCreated,
                project: "other-project".to_string(),
                region: "eu-west-1".to_string(),
                started_at: Utc::now(),
                outputs: StackOutputs::default(),
            })
            .unwrap();

        let aws = MockAws::happy();
        let err = execute(
            &ctx(),
            &aws,
            &state_mgr,
            &test_config(),
            true,
            &fast_waits(),
            &es_factory,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("different stack"), "got: {err}");
    }

    #[tokio::test]
    async fn existing_bucket_is_reused_without_create() {
        let dir = TempDir::new().unwrap();
        let mut aws = MockAws::happy();
        aws.head_bucket = ok_output(b"");
        deploy(&aws, &dir).await.unwrap();
        assert!(!aws.calls().iter().any(|c| c.starts_with("create_bucket")));
    }

    #[tokio::test]
    async fn existing_role_is_looked_up_for_its_arn() {
        let dir = TempDir::new().unwrap();
        let mut aws = MockAws::happy();
        aws.create_role = err_output(b"An error occurred (EntityAlreadyExists)");
        deploy(&aws, &dir).await.unwrap();
        assert!(aws.calls().iter().any(|c| c.starts_with("get_role")));

        let state = StateManager::with_path(dir.path().join("state.json"))
            .load()
            .unwrap()
            .expect("state present");
        assert_eq!(
            state.outputs.kb_role_arn.as_deref(),
            Some("arn:aws:iam::123456789012:role/support-kb-kb-role")
        );
    }

    #[tokio::test]
    async fn domain_waiter_polls_until_endpoint_is_published() {
        let dir = TempDir::new().unwrap();
        let aws = MockAws::happy();
        aws.describe_domain.borrow_mut().push_front(ok_output(
            br#"{"DomainStatus":{"ARN":"arn:aws:es:us-east-1:123456789012:domain/support-kb","Processing":true}}"#,
        ));
        aws.describe_domain.borrow_mut().push_front(ok_output(
            br#"{"DomainStatus":{"ARN":"arn:aws:es:us-east-1:123456789012:domain/support-kb","Processing":true}}"#,
        ));
        deploy(&aws, &dir).await.unwrap();

        let polls = aws
            .calls()
            .iter()
            .filter(|c| c.starts_with("describe_domain"))
            .count();
        assert_eq!(polls, 3);
    }

    #[tokio::test]
    async fn failed_knowledge_base_aborts_the_deploy() {
        let dir = TempDir::new().unwrap();
        let mut aws = MockAws::happy();
        aws.create_knowledge_base = ok_output(
            br#"{"knowledgeBase":{"knowledgeBaseId":"KB12345","status":"CREATING"}}"#,
        );
        aws.get_knowledge_base = std::cell::RefCell::new(std::collections::VecDeque::from([
            ok_output(br#"{"knowledgeBase":{"knowledgeBaseId":"KB12345","status":"FAILED"}}"#),
        ]));
        let err = deploy(&aws, &dir).await.unwrap_err();
        assert!(err.to_string().contains("FAILED"), "got: {err}");
    }

    #[test]
    fn domain_input_embeds_access_policy_as_string() {
        let spec = DomainSpec {
            name: "support-kb".to_string(),
            engine_version: "OpenSearch_2.19".to_string(),
            instance_type: "r7g.large.search".to_string(),
            instance_count: 1,
            volume_gib: 100,
            master_user_arn: "arn:aws:iam::123456789012:user/operator".to_string(),
            access_role: crate::domain::resource::Reference::new(
                stack::KB_ROLE,
                crate::domain::resource::Attr::Arn,
            ),
        };
        let access_policy = policy::domain_access(
            &["arn:aws:iam::123456789012:role/kb-role".to_string()],
            "arn:aws:es:us-east-1:123456789012:domain/support-kb",
        );
        let input = domain_input(&spec, &access_policy).unwrap();
        let value: serde_json::Value = serde_json::from_str(&input).unwrap();
        assert_eq!(value["DomainName"], "support-kb");
        assert_eq!(value["ClusterConfig"]["InstanceCount"], 1);
        assert_eq!(
            value["AdvancedSecurityOptions"]["MasterUserOptions"]["MasterUserARN"],
            "arn:aws:iam::123456789012:user/operator"
        );
        // nested policy arrives as a string the API can parse
        let embedded: serde_json::Value =
            serde_json::from_str(value["AccessPolicies"].as_str().unwrap()).unwrap();
        assert_eq!(embedded["Statement"][0]["Action"], serde_json::json!(["es:ESHttp*"]));
    }
}
