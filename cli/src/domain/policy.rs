//! IAM policy documents — the trust/permission graph in typed form.
//!
//! Serialization matches the provider wire shape exactly (`Version`
//! `2012-10-17`, PascalCase keys), so documents can be passed verbatim to
//! the engine. Builders produce the least-privilege set the pipeline
//! needs; nothing here grants beyond the resources it names.

use serde::Serialize;

/// Wire-format policy language version.
const POLICY_VERSION: &str = "2012-10-17";

/// A complete policy document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    version: &'static str,
    #[serde(rename = "Statement")]
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    #[must_use]
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statements,
        }
    }
}

/// A single policy statement.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

impl Statement {
    /// Allow statement with no principal, no sid, no condition.
    #[must_use]
    pub fn allow(actions: &[&str], resources: &[String]) -> Self {
        Self {
            sid: None,
            effect: Effect::Allow,
            principal: None,
            action: actions.iter().map(ToString::to_string).collect(),
            resource: resources.to_vec(),
            condition: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

/// Statement principal — a service or a set of account identities.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum Principal {
    #[serde(rename = "Service")]
    Service(String),
    #[serde(rename = "AWS")]
    Aws(Vec<String>),
}

// ── Builders ──────────────────────────────────────────────────────────────────

/// Trust policy letting `service` assume the role, pinned to the owning
/// account so another account's resource cannot ride the service principal.
#[must_use]
pub fn service_trust(service: &str, source_account: &str) -> PolicyDocument {
    PolicyDocument::new(vec![Statement {
        sid: None,
        effect: Effect::Allow,
        principal: Some(Principal::Service(service.to_string())),
        action: vec!["sts:AssumeRole".to_string()],
        resource: Vec::new(),
        condition: Some(serde_json::json!({
            "StringEquals": { "aws:SourceAccount": source_account }
        })),
    }])
}

/// Permission to invoke the embedding model, and nothing else.
#[must_use]
pub fn model_invoke(model_arn: &str) -> PolicyDocument {
    PolicyDocument::new(vec![Statement::allow(
        &["bedrock:InvokeModel"],
        &[model_arn.to_string()],
    )])
}

/// HTTP verbs the knowledge base needs against the search domain.
#[must_use]
pub fn domain_http(domain_arn: &str) -> PolicyDocument {
    PolicyDocument::new(vec![Statement::allow(
        &[
            "es:ESHttpGet",
            "es:ESHttpHead",
            "es:ESHttpPost",
            "es:ESHttpPut",
            "es:ESHttpDelete",
        ],
        &[domain_arn.to_string(), format!("{domain_arn}/*")],
    )])
}

/// Read-only access to the document bucket.
#[must_use]
pub fn bucket_read(bucket_arn: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        Statement::allow(&["s3:GetObject"], &[format!("{bucket_arn}/*")]),
        Statement::allow(&["s3:ListBucket"], &[bucket_arn.to_string()]),
    ])
}

/// Resource-based domain access policy granting HTTP access to the named
/// principals only.
#[must_use]
pub fn domain_access(principal_arns: &[String], domain_arn: &str) -> PolicyDocument {
    PolicyDocument::new(vec![Statement {
        sid: None,
        effect: Effect::Allow,
        principal: Some(Principal::Aws(principal_arns.to_vec())),
        action: vec!["es:ESHttp*".to_string()],
        resource: vec![format!("{domain_arn}/*")],
        condition: None,
    }])
}
