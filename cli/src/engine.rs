//! Engine abstraction — every control-plane call goes through the `aws`
//! CLI, behind a trait so tests can inject canned responses.
//!
//! Methods return raw [`Output`]; callers parse with the helpers at the
//! bottom of this module. Complex create calls take a prebuilt
//! `--cli-input-json` payload so the declaration owns the request shape.

use std::process::Output;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::command_runner::{CommandRunner, DEFAULT_CMD_TIMEOUT, TokioCommandRunner};

/// Abstraction over the aws CLI, enabling test doubles.
#[allow(async_fn_in_trait)]
pub trait Aws {
    /// Run `aws sts get-caller-identity`.
    async fn caller_identity(&self) -> Result<Output>;

    /// Run `aws configure export-credentials --format process`.
    async fn export_credentials(&self) -> Result<Output>;

    /// Run `aws --version`.
    async fn cli_version(&self) -> Result<Output>;

    // ── Document bucket ──────────────────────────────────────────────────────

    async fn create_bucket(&self, name: &str) -> Result<Output>;
    async fn head_bucket(&self, name: &str) -> Result<Output>;
    async fn put_public_access_block(&self, name: &str) -> Result<Output>;
    async fn put_bucket_encryption(&self, name: &str) -> Result<Output>;
    async fn delete_bucket(&self, name: &str) -> Result<Output>;

    // ── Roles and policies ───────────────────────────────────────────────────

    async fn create_role(&self, name: &str, trust_json: &str) -> Result<Output>;
    async fn get_role(&self, name: &str) -> Result<Output>;
    async fn put_role_policy(
        &self,
        role: &str,
        policy_name: &str,
        policy_json: &str,
    ) -> Result<Output>;
    async fn delete_role_policy(&self, role: &str, policy_name: &str) -> Result<Output>;
    async fn delete_role(&self, name: &str) -> Result<Output>;

    // ── Search domain ────────────────────────────────────────────────────────

    async fn create_domain(&self, input_json: &str) -> Result<Output>;
    async fn describe_domain(&self, name: &str) -> Result<Output>;
    async fn delete_domain(&self, name: &str) -> Result<Output>;

    // ── Knowledge base and data source ───────────────────────────────────────

    async fn create_knowledge_base(&self, input_json: &str) -> Result<Output>;
    async fn get_knowledge_base(&self, id: &str) -> Result<Output>;
    async fn delete_knowledge_base(&self, id: &str) -> Result<Output>;
    async fn create_data_source(&self, input_json: &str) -> Result<Output>;
    async fn delete_data_source(&self, kb_id: &str, ds_id: &str) -> Result<Output>;
}

/// Production implementation — shells out to the `aws` binary.
pub struct AwsCli<R: CommandRunner = TokioCommandRunner> {
    region: String,
    runner: R,
}

impl AwsCli<TokioCommandRunner> {
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            runner: TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT),
        }
    }
}

impl<R: CommandRunner> AwsCli<R> {
    /// Constructor with an explicit runner (used in tests).
    pub fn with_runner(region: impl Into<String>, runner: R) -> Self {
        Self {
            region: region.into(),
            runner,
        }
    }

    async fn aws(&self, args: &[&str]) -> Result<Output> {
        let mut full_args = vec!["--region", self.region.as_str(), "--output", "json"];
        full_args.extend_from_slice(args);
        self.runner
            .run("aws", &full_args)
            .await
            .with_context(|| format!("failed to run aws {}", args.join(" ")))
    }
}

impl<R: CommandRunner> Aws for AwsCli<R> {
    async fn caller_identity(&self) -> Result<Output> {
        self.aws(&["sts", "get-caller-identity"]).await
    }

    async fn export_credentials(&self) -> Result<Output> {
        // no --output: export-credentials owns its format flag
        self.runner
            .run("aws", &["configure", "export-credentials", "--format", "process"])
            .await
            .context("failed to run aws configure export-credentials")
    }

    async fn cli_version(&self) -> Result<Output> {
        self.runner
            .run("aws", &["--version"])
            .await
            .context("failed to run aws --version")
    }

    async fn create_bucket(&self, name: &str) -> Result<Output> {
        // us-east-1 rejects an explicit LocationConstraint
        if self.region == "us-east-1" {
            self.aws(&["s3api", "create-bucket", "--bucket", name]).await
        } else {
            let constraint = format!("LocationConstraint={}", self.region);
            self.aws(&[
                "s3api",
                "create-bucket",
                "--bucket",
                name,
                "--create-bucket-configuration",
                &constraint,
            ])
            .await
        }
    }

    async fn head_bucket(&self, name: &str) -> Result<Output> {
        self.aws(&["s3api", "head-bucket", "--bucket", name]).await
    }

    async fn put_public_access_block(&self, name: &str) -> Result<Output> {
        self.aws(&[
            "s3api",
            "put-public-access-block",
            "--bucket",
            name,
            "--public-access-block-configuration",
            "BlockPublicAcls=true,IgnorePublicAcls=true,BlockPublicPolicy=true,RestrictPublicBuckets=true",
        ])
        .await
    }

    async fn put_bucket_encryption(&self, name: &str) -> Result<Output> {
        self.aws(&[
            "s3api",
            "put-bucket-encryption",
            "--bucket",
            name,
            "--server-side-encryption-configuration",
            r#"{"Rules":[{"ApplyServerSideEncryptionByDefault":{"SSEAlgorithm":"AES256"}}]}"#,
        ])
        .await
    }

    async fn delete_bucket(&self, name: &str) -> Result<Output> {
        self.aws(&["s3api", "delete-bucket", "--bucket", name]).await
    }

    async fn create_role(&self, name: &str, trust_json: &str) -> Result<Output> {
        self.aws(&[
            "iam",
            "create-role",
            "--role-name",
            name,
            "--assume-role-policy-document",
            trust_json,
        ])
        .await
    }

    async fn get_role(&self, name: &str) -> Result<Output> {
        self.aws(&["iam", "get-role", "--role-name", name]).await
    }

    async fn put_role_policy(
        &self,
        role: &str,
        policy_name: &str,
        policy_json: &str,
    ) -> Result<Output> {
        self.aws(&[
            "iam",
            "put-role-policy",
            "--role-name",
            role,
            "--policy-name",
            policy_name,
            "--policy-document",
            policy_json,
        ])
        .await
    }

    async fn delete_role_policy(&self, role: &str, policy_name: &str) -> Result<Output> {
        self.aws(&[
            "iam",
            "delete-role-policy",
            "--role-name",
            role,
            "--policy-name",
            policy_name,
        ])
        .await
    }

    async fn delete_role(&self, name: &str) -> Result<Output> {
        self.aws(&["iam", "delete-role", "--role-name", name]).await
    }

    async fn create_domain(&self, input_json: &str) -> Result<Output> {
        self.aws(&["opensearch", "create-domain", "--cli-input-json", input_json])
            .await
    }

    async fn describe_domain(&self, name: &str) -> Result<Output> {
        self.aws(&["opensearch", "describe-domain", "--domain-name", name])
            .await
    }

    async fn delete_domain(&self, name: &str) -> Result<Output> {
        self.aws(&["opensearch", "delete-domain", "--domain-name", name])
            .await
    }

    async fn create_knowledge_base(&self, input_json: &str) -> Result<Output> {
        self.aws(&[
            "bedrock-agent",
            "create-knowledge-base",
            "--cli-input-json",
            input_json,
        ])
        .await
    }

    async fn get_knowledge_base(&self, id: &str) -> Result<Output> {
        self.aws(&["bedrock-agent", "get-knowledge-base", "--knowledge-base-id", id])
            .await
    }

    async fn delete_knowledge_base(&self, id: &str) -> Result<Output> {
        self.aws(&[
            "bedrock-agent",
            "delete-knowledge-base",
            "--knowledge-base-id",
            id,
        ])
        .await
    }

    async fn create_data_source(&self, input_json: &str) -> Result<Output> {
        self.aws(&[
            "bedrock-agent",
            "create-data-source",
            "--cli-input-json",
            input_json,
        ])
        .await
    }

    async fn delete_data_source(&self, kb_id: &str, ds_id: &str) -> Result<Output> {
        self.aws(&[
            "bedrock-agent",
            "delete-data-source",
            "--knowledge-base-id",
            kb_id,
            "--data-source-id",
            ds_id,
        ])
        .await
    }
}

// ── Response parsing ──────────────────────────────────────────────────────────

/// Bail with the engine's stderr when a call failed.
///
/// # Errors
///
/// Returns an error naming `what` plus the captured stderr.
pub fn require_success(output: &Output, what: &str) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("{what} failed: {}", stderr.trim())
}

/// True when the failure stderr marks an already-existing resource.
///
/// Deploy is resumable, so "already exists" is recorded, not fatal.
#[must_use]
pub fn already_exists(output: &Output) -> bool {
    let stderr = String::from_utf8_lossy(&output.stderr);
    ["EntityAlreadyExists", "BucketAlreadyOwnedByYou", "ResourceAlreadyExistsException"]
        .iter()
        .any(|marker| stderr.contains(marker))
}

/// True when the failure stderr marks a resource that no longer exists.
///
/// Teardown treats missing resources as already gone.
#[must_use]
pub fn not_found(output: &Output) -> bool {
    let stderr = String::from_utf8_lossy(&output.stderr);
    ["NoSuchEntity", "NoSuchBucket", "ResourceNotFoundException", "Not Found", "(404)"]
        .iter()
        .any(|marker| stderr.contains(marker))
}

/// Caller identity from `sts get-caller-identity`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallerIdentity {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Arn")]
    pub arn: String,
}

/// Signing credentials from `configure export-credentials`.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,
    #[serde(rename = "SessionToken", default)]
    pub session_token: Option<String>,
}

/// Search domain status relevant to the deploy waiter.
#[derive(Debug, Clone)]
pub struct DomainStatus {
    pub arn: String,
    pub endpoint: Option<String>,
    pub processing: bool,
}

fn parse_json(output: &Output, what: &str) -> Result<serde_json::Value> {
    serde_json::from_slice(&output.stdout).with_context(|| format!("parsing {what} response"))
}

/// # Errors
///
/// Returns an error if the output is not the expected identity JSON.
pub fn parse_caller_identity(output: &Output) -> Result<CallerIdentity> {
    serde_json::from_slice(&output.stdout).context("parsing sts get-caller-identity response")
}

/// # Errors
///
/// Returns an error if the output is not the expected credentials JSON.
pub fn parse_credentials(output: &Output) -> Result<Credentials> {
    serde_json::from_slice(&output.stdout).context("parsing export-credentials response")
}

/// # Errors
///
/// Returns an error if the output lacks a `DomainStatus` object.
pub fn parse_domain_status(output: &Output) -> Result<DomainStatus> {
    let value = parse_json(output, "describe-domain")?;
    let status = value
        .get("DomainStatus")
        .context("describe-domain response missing DomainStatus")?;
    Ok(DomainStatus {
        arn: status
            .get("ARN")
            .and_then(|v| v.as_str())
            .context("DomainStatus missing ARN")?
            .to_string(),
        endpoint: status
            .get("Endpoint")
            .and_then(|v| v.as_str())
            .map(ToString::to_string),
        processing: status
            .get("Processing")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true),
    })
}

/// `(id, status)` of a knowledge base from a create/get response.
///
/// # Errors
///
/// Returns an error if the output lacks a `knowledgeBase` object.
pub fn parse_knowledge_base(output: &Output) -> Result<(String, String)> {
    let value = parse_json(output, "knowledge-base")?;
    let kb = value
        .get("knowledgeBase")
        .context("response missing knowledgeBase")?;
    let id = kb
        .get("knowledgeBaseId")
        .and_then(|v| v.as_str())
        .context("knowledgeBase missing knowledgeBaseId")?
        .to_string();
    let status = kb
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("UNKNOWN")
        .to_string();
    Ok((id, status))
}

/// Data source id from a create response.
///
/// # Errors
///
/// Returns an error if the output lacks a `dataSource` object.
pub fn parse_data_source_id(output: &Output) -> Result<String> {
    let value = parse_json(output, "create-data-source")?;
    Ok(value
        .get("dataSource")
        .and_then(|ds| ds.get("dataSourceId"))
        .and_then(|v| v.as_str())
        .context("response missing dataSource.dataSourceId")?
        .to_string())
}

/// Role ARN from a create-role/get-role response.
///
/// # Errors
///
/// Returns an error if the output lacks a `Role.Arn` field.
pub fn parse_role_arn(output: &Output) -> Result<String> {
    let value = parse_json(output, "role")?;
    Ok(value
        .get("Role")
        .and_then(|r| r.get("Arn"))
        .and_then(|v| v.as_str())
        .context("response missing Role.Arn")?
        .to_string())
}
