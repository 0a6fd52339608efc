//! Resource descriptors — the units of the declaration.
//!
//! Each resource carries a declaration-local logical id plus a typed spec.
//! Cross-resource wiring is expressed with [`Reference`] values (an
//! attribute of another resource, resolved at deploy time) and explicit
//! `depends_on` edges for ordering that no attribute captures.

use crate::domain::policy::PolicyDocument;

/// Runtime attribute of a resource that another resource can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    Arn,
    Endpoint,
    Id,
    Name,
}

/// A typed pointer to another resource's runtime attribute.
///
/// The `target` must name a declared resource; validation rejects the
/// declaration otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub target: String,
    pub attr: Attr,
}

impl Reference {
    #[must_use]
    pub fn new(target: impl Into<String>, attr: Attr) -> Self {
        Self {
            target: target.into(),
            attr,
        }
    }
}

// ── Resource specs ────────────────────────────────────────────────────────────

/// Document storage bucket. Public access is always blocked and default
/// encryption enabled at creation.
#[derive(Debug, Clone)]
pub struct BucketSpec {
    pub name: String,
}

/// IAM role with a trust policy and inline least-privilege policies.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub name: String,
    pub trust: PolicyDocument,
    /// `(policy name, document)` pairs attached inline.
    pub inline_policies: Vec<(String, PolicyDocument)>,
}

/// Managed search domain backing the vector store.
#[derive(Debug, Clone)]
pub struct DomainSpec {
    pub name: String,
    pub engine_version: String,
    pub instance_type: String,
    pub instance_count: u32,
    pub volume_gib: u32,
    /// Operator identity installed as the fine-grained-access-control
    /// master user. A literal ARN — the operator is not a stack resource.
    pub master_user_arn: String,
    /// Service role granted HTTP access by the domain access policy.
    pub access_role: Reference,
}

/// The glue step that prepares the cluster before the knowledge base may
/// reference it: security role, role mappings, and the kNN index.
#[derive(Debug, Clone)]
pub struct IndexInitSpec {
    pub index_name: String,
    pub dimension: u32,
    pub endpoint: Reference,
    /// Role mapped to both `all_access` and the scoped security role.
    pub kb_role_arn: Reference,
    /// Operator identity mapped to `all_access` only. A literal ARN.
    pub admin_arn: String,
}

/// Knowledge base referencing the cluster-backed vector store.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseSpec {
    pub name: String,
    pub embedding_model_arn: String,
    pub role_arn: Reference,
    pub domain_arn: Reference,
    pub domain_endpoint: Reference,
    pub index_name: String,
}

/// S3 data source attached to the knowledge base.
#[derive(Debug, Clone)]
pub struct DataSourceSpec {
    pub name: String,
    pub knowledge_base_id: Reference,
    pub bucket_arn: Reference,
}

// ── Resource ──────────────────────────────────────────────────────────────────

/// Typed payload of a declared resource.
#[derive(Debug, Clone)]
pub enum ResourceSpec {
    Bucket(BucketSpec),
    Role(RoleSpec),
    Domain(DomainSpec),
    IndexInit(IndexInitSpec),
    KnowledgeBase(KnowledgeBaseSpec),
    DataSource(DataSourceSpec),
}

impl ResourceSpec {
    /// Short kind label used in plan output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bucket(_) => "document-bucket",
            Self::Role(_) => "service-role",
            Self::Domain(_) => "search-domain",
            Self::IndexInit(_) => "index-initializer",
            Self::KnowledgeBase(_) => "knowledge-base",
            Self::DataSource(_) => "data-source",
        }
    }
}

/// A declared resource: logical id, spec, and explicit ordering edges.
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: String,
    pub spec: ResourceSpec,
    /// Ordering edges not implied by any attribute reference.
    pub depends_on: Vec<String>,
}

impl Resource {
    #[must_use]
    pub fn new(id: impl Into<String>, spec: ResourceSpec) -> Self {
        Self {
            id: id.into(),
            spec,
            depends_on: Vec::new(),
        }
    }

    #[must_use]
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Every attribute reference this resource's spec carries.
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        match &self.spec {
            ResourceSpec::Bucket(_) | ResourceSpec::Role(_) => Vec::new(),
            ResourceSpec::Domain(spec) => vec![&spec.access_role],
            ResourceSpec::IndexInit(spec) => {
                vec![&spec.endpoint, &spec.kb_role_arn]
            }
            ResourceSpec::KnowledgeBase(spec) => {
                vec![&spec.role_arn, &spec.domain_arn, &spec.domain_endpoint]
            }
            ResourceSpec::DataSource(spec) => {
                vec![&spec.knowledge_base_id, &spec.bucket_arn]
            }
        }
    }
}
