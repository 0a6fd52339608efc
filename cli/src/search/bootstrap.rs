//! Index bootstrap — everything the cluster needs before the knowledge
//! base may reference it.
//!
//! Sequence: wait for cluster health, create the scoped security role,
//! map the IAM roles onto cluster roles, wait for mapping propagation,
//! then create the kNN index. Runs entirely over the signed HTTP API.

use std::time::Duration;

use anyhow::Result;
use serde_json::{Value, json};

use crate::domain::index::IndexSettings;
use crate::output::ProgressReporter;
use crate::search::client::SearchHttp;

/// Cluster-internal role scoped to what the knowledge base needs.
pub const SECURITY_ROLE: &str = "bedrock_kb_role";

/// Built-in cluster role granting full management access.
const ALL_ACCESS_ROLE: &str = "all_access";

/// Polling and propagation delays. Tests shrink these to zero.
pub struct Waits {
    pub health_interval: Duration,
    pub health_attempts: u32,
    /// Role mappings take a moment to apply across the cluster.
    pub propagation: Duration,
}

impl Default for Waits {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(10),
            health_attempts: 30,
            propagation: Duration::from_secs(30),
        }
    }
}

/// Identities and index the bootstrap installs.
pub struct BootstrapParams<'a> {
    pub index: &'a IndexSettings,
    /// Mapped to both `all_access` and the scoped role.
    pub kb_role_arn: &'a str,
    /// Operator identity; mapped to `all_access` only.
    pub admin_arn: &'a str,
}

/// Run the full bootstrap sequence.
///
/// # Errors
///
/// Returns an error if the cluster never reaches green/yellow health, or
/// if any security-API or index-creation call is rejected.
pub async fn run(
    es: &impl SearchHttp,
    params: &BootstrapParams<'_>,
    waits: &Waits,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step("Waiting for cluster health");
    wait_for_cluster(es, waits).await?;

    reporter.step("Creating cluster security role");
    put_security_role(es).await?;

    reporter.step("Mapping service and operator identities");
    put_role_mappings(es, params.kb_role_arn, params.admin_arn).await?;

    // mappings apply asynchronously across cluster nodes
    tokio::time::sleep(waits.propagation).await;

    reporter.step("Creating vector index");
    create_index(es, params.index, reporter).await?;

    reporter.success("Vector index initialized");
    Ok(())
}

/// Poll `_cluster/health` until the status is green or yellow.
async fn wait_for_cluster(es: &impl SearchHttp, waits: &Waits) -> Result<()> {
    for attempt in 1..=waits.health_attempts {
        if let Ok(response) = es.send("GET", "/_cluster/health", None).await
            && response.is_success()
            && let Ok(health) = serde_json::from_str::<Value>(&response.body)
        {
            let status = health.get("status").and_then(|s| s.as_str()).unwrap_or("");
            if status == "green" || status == "yellow" {
                return Ok(());
            }
        }
        if attempt < waits.health_attempts {
            tokio::time::sleep(waits.health_interval).await;
        }
    }
    anyhow::bail!(
        "cluster did not reach green/yellow health after {} attempts",
        waits.health_attempts
    )
}

/// Minimum permissions the knowledge base needs inside the cluster.
#[must_use]
pub fn security_role_body() -> Value {
    json!({
        "cluster_permissions": [
            "indices:data/read/msearch",
            "indices:data/write/bulk*",
            "indices:data/read/mget*",
        ],
        "index_permissions": [{
            "index_patterns": ["*"],
            "allowed_actions": [
                "indices:admin/get",
                "indices:admin/mapping/put",
                "indices:data/read/msearch",
                "indices:data/read/search",
                "indices:data/read/mget*",
                "indices:data/write/index",
                "indices:data/write/update",
                "indices:data/write/delete",
                "indices:data/write/delete/byquery",
                "indices:data/write/bulk*",
            ]
        }]
    })
}

async fn put_security_role(es: &impl SearchHttp) -> Result<()> {
    let path = format!("/_plugins/_security/api/roles/{SECURITY_ROLE}");
    let response = es.send("PUT", &path, Some(&security_role_body())).await?;
    if !response.is_success() {
        anyhow::bail!("creating security role failed ({}): {}", response.status, response.body);
    }
    Ok(())
}

fn mapping_body(backend_roles: &[&str]) -> Value {
    json!({
        "backend_roles": backend_roles,
        "hosts": [],
        "users": [],
    })
}

/// Bridge the IAM identities onto cluster roles.
///
/// The knowledge-base role ends up with both mappings (`all_access` plus
/// the scoped role); the operator gets `all_access` only.
async fn put_role_mappings(es: &impl SearchHttp, kb_role_arn: &str, admin_arn: &str) -> Result<()> {
    let mut admins = vec![kb_role_arn];
    if admin_arn != kb_role_arn {
        admins.push(admin_arn);
    }

    let path = format!("/_plugins/_security/api/rolesmapping/{ALL_ACCESS_ROLE}");
    let response = es.send("PUT", &path, Some(&mapping_body(&admins))).await?;
    if !response.is_success() {
        anyhow::bail!("mapping {ALL_ACCESS_ROLE} failed ({}): {}", response.status, response.body);
    }

    let path = format!("/_plugins/_security/api/rolesmapping/{SECURITY_ROLE}");
    let response = es
        .send("PUT", &path, Some(&mapping_body(&[kb_role_arn])))
        .await?;
    if !response.is_success() {
        anyhow::bail!("mapping {SECURITY_ROLE} failed ({}): {}", response.status, response.body);
    }
    Ok(())
}

/// Create the kNN index; an index that already exists is accepted so a
/// resumed deploy does not fail here.
async fn create_index(
    es: &impl SearchHttp,
    index: &IndexSettings,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    let path = format!("/{}", index.name);
    let response = es.send("PUT", &path, Some(&index.body())).await?;
    if response.is_success() {
        return Ok(());
    }
    if response.body.contains("resource_already_exists_exception") {
        reporter.warn(&format!("index {} already exists, keeping it", index.name));
        return Ok(());
    }
    anyhow::bail!("creating index {} failed ({}): {}", index.name, response.status, response.body)
}
