//! The declaration — one function enumerates every resource in the
//! pipeline and wires their identifiers together.
//!
//! The wiring encodes the ordering the pipeline depends on: the index
//! initializer references the domain endpoint, and the knowledge base
//! carries an explicit edge on the initializer so it can never be created
//! against an unprepared cluster.

use ragstack_common::StackOutputs;

use crate::config::Config;
use crate::domain::error::StackError;
use crate::domain::graph;
use crate::domain::policy;
use crate::domain::resource::{
    Attr, BucketSpec, DataSourceSpec, DomainSpec, IndexInitSpec, KnowledgeBaseSpec, Reference,
    Resource, ResourceSpec, RoleSpec,
};

// Logical ids of the declared resources.
pub const DOCUMENT_BUCKET: &str = "document-bucket";
pub const KB_ROLE: &str = "knowledge-base-role";
pub const SEARCH_DOMAIN: &str = "search-domain";
pub const INDEX_INIT: &str = "index-initializer";
pub const KNOWLEDGE_BASE: &str = "knowledge-base";
pub const DATA_SOURCE: &str = "data-source";

// Inline policy names on the knowledge-base role.
pub const POLICY_MODEL_INVOKE: &str = "invoke-embedding-model";
pub const POLICY_DOMAIN_HTTP: &str = "search-domain-http";
pub const POLICY_BUCKET_READ: &str = "document-bucket-read";

/// The assembled declaration.
pub struct Stack {
    pub resources: Vec<Resource>,
}

impl Stack {
    /// Deterministic execution order for the declaration.
    ///
    /// # Errors
    ///
    /// Returns a [`StackError`] when a reference does not resolve or the
    /// declaration contains a cycle.
    pub fn plan(&self) -> Result<Vec<&Resource>, StackError> {
        graph::plan(&self.resources)
    }

    /// Find a declared resource by logical id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }
}

/// ARN of the search domain, computable before the domain exists.
#[must_use]
pub fn domain_arn(region: &str, account: &str, name: &str) -> String {
    format!("arn:aws:es:{region}:{account}:domain/{name}")
}

/// ARN of the document bucket.
#[must_use]
pub fn bucket_arn(name: &str) -> String {
    format!("arn:aws:s3:::{name}")
}

/// Assemble the full declaration for `config`, owned by `account` and
/// operated by the identity `admin_arn`.
#[must_use]
pub fn build(config: &Config, account: &str, admin_arn: &str) -> Stack {
    let bucket_name = config.bucket_name(account);
    let domain_arn = domain_arn(&config.region, account, config.domain_name());
    let index_name = config.index_name();

    let bucket = Resource::new(
        DOCUMENT_BUCKET,
        ResourceSpec::Bucket(BucketSpec {
            name: bucket_name.clone(),
        }),
    );

    let kb_role = Resource::new(
        KB_ROLE,
        ResourceSpec::Role(RoleSpec {
            name: config.kb_role_name(),
            trust: policy::service_trust("bedrock.amazonaws.com", account),
            inline_policies: vec![
                (
                    POLICY_MODEL_INVOKE.to_string(),
                    policy::model_invoke(&config.embedding_model_arn()),
                ),
                (
                    POLICY_DOMAIN_HTTP.to_string(),
                    policy::domain_http(&domain_arn),
                ),
                (
                    POLICY_BUCKET_READ.to_string(),
                    policy::bucket_read(&bucket_arn(&bucket_name)),
                ),
            ],
        }),
    );

    let domain = Resource::new(
        SEARCH_DOMAIN,
        ResourceSpec::Domain(DomainSpec {
            name: config.domain_name().to_string(),
            engine_version: config.search.engine_version.clone(),
            instance_type: config.search.instance_type.clone(),
            instance_count: config.search.instance_count,
            volume_gib: config.search.volume_gib,
            master_user_arn: admin_arn.to_string(),
            access_role: Reference::new(KB_ROLE, Attr::Arn),
        }),
    );

    let index_init = Resource::new(
        INDEX_INIT,
        ResourceSpec::IndexInit(IndexInitSpec {
            index_name: index_name.clone(),
            dimension: config.index_dimension(),
            endpoint: Reference::new(SEARCH_DOMAIN, Attr::Endpoint),
            kb_role_arn: Reference::new(KB_ROLE, Attr::Arn),
            admin_arn: admin_arn.to_string(),
        }),
    );

    // the knowledge base may only reference an initialized index
    let knowledge_base = Resource::new(
        KNOWLEDGE_BASE,
        ResourceSpec::KnowledgeBase(KnowledgeBaseSpec {
            name: config.knowledge_base_name(),
            embedding_model_arn: config.embedding_model_arn(),
            role_arn: Reference::new(KB_ROLE, Attr::Arn),
            domain_arn: Reference::new(SEARCH_DOMAIN, Attr::Arn),
            domain_endpoint: Reference::new(SEARCH_DOMAIN, Attr::Endpoint),
            index_name,
        }),
    )
    .depends_on(INDEX_INIT);

    let data_source = Resource::new(
        DATA_SOURCE,
        ResourceSpec::DataSource(DataSourceSpec {
            name: config.data_source_name(),
            knowledge_base_id: Reference::new(KNOWLEDGE_BASE, Attr::Id),
            bucket_arn: Reference::new(DOCUMENT_BUCKET, Attr::Arn),
        }),
    );

    Stack {
        resources: vec![bucket, kb_role, domain, index_init, knowledge_base, data_source],
    }
}

/// Resolve a reference against the identifiers recorded so far.
///
/// # Errors
///
/// Returns an error when the referenced identifier has not been recorded
/// yet — the dependent resource must not be created in that case.
pub fn resolve(reference: &Reference, outputs: &StackOutputs) -> anyhow::Result<String> {
    let value = match (reference.target.as_ref(), reference.attr) {
        (DOCUMENT_BUCKET, Attr::Arn) => outputs.bucket_name.as_deref().map(bucket_arn),
        (DOCUMENT_BUCKET, Attr::Name) => outputs.bucket_name.clone(),
        (KB_ROLE, Attr::Arn) => outputs.kb_role_arn.clone(),
        (SEARCH_DOMAIN, Attr::Arn) => outputs.domain_arn.clone(),
        (SEARCH_DOMAIN, Attr::Endpoint) => outputs.domain_endpoint.clone(),
        (KNOWLEDGE_BASE, Attr::Id) => outputs.knowledge_base_id.clone(),
        (INDEX_INIT, Attr::Name) => outputs.index_name.clone(),
        _ => None,
    };
    value.ok_or_else(|| {
        anyhow::anyhow!(
            "{:?} of '{}' is not available yet",
            reference.attr,
            reference.target
        )
    })
}
