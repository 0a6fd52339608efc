use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Checkpoint stages of a pipeline deploy, in execution order.
///
/// Each stage is recorded after its resources exist, so an interrupted
/// deploy resumes at `stage.next()` instead of repeating completed work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    BucketCreated,
    RolesCreated,
    DomainActive,
    IndexInitialized,
    KnowledgeBaseActive,
    DataSourceAttached,
}

impl DeployStage {
    /// The stage that follows this one, or `None` after the final stage.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::BucketCreated => Some(Self::RolesCreated),
            Self::RolesCreated => Some(Self::DomainActive),
            Self::DomainActive => Some(Self::IndexInitialized),
            Self::IndexInitialized => Some(Self::KnowledgeBaseActive),
            Self::KnowledgeBaseActive => Some(Self::DataSourceAttached),
            Self::DataSourceAttached => None,
        }
    }

    /// Human-readable progress line for this stage.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::BucketCreated => "Document bucket created",
            Self::RolesCreated => "Service roles and policies created",
            Self::DomainActive => "Search domain active",
            Self::IndexInitialized => "Vector index initialized",
            Self::KnowledgeBaseActive => "Knowledge base active",
            Self::DataSourceAttached => "Data source attached",
        }
    }

    /// All stages in execution order.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::BucketCreated,
            Self::RolesCreated,
            Self::DomainActive,
            Self::IndexInitialized,
            Self::KnowledgeBaseActive,
            Self::DataSourceAttached,
        ]
    }
}

/// Physical identifiers produced by a deploy.
///
/// Fields fill in as stages complete; downstream document-upload and
/// ingestion workflows consume the completed set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kb_role_arn: Option<String>,
    /// ARN of the operator identity mapped to cluster admin access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
}

/// Persisted record of a pipeline run, written after every completed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployState {
    /// Last stage whose resources are known to exist.
    pub stage: DeployStage,
    /// Project name the stack was assembled from.
    pub project: String,
    /// Region the stack lives in.
    pub region: String,
    /// When this deploy first started.
    pub started_at: DateTime<Utc>,
    /// Identifiers recorded so far.
    #[serde(default)]
    pub outputs: StackOutputs,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deploy_stage_serde_round_trip() {
        let variants = [
            (DeployStage::BucketCreated, "\"bucket_created\""),
            (DeployStage::RolesCreated, "\"roles_created\""),
            (DeployStage::DomainActive, "\"domain_active\""),
            (DeployStage::IndexInitialized, "\"index_initialized\""),
            (DeployStage::KnowledgeBaseActive, "\"knowledge_base_active\""),
            (DeployStage::DataSourceAttached, "\"data_source_attached\""),
        ];
        for (variant, expected_json) in &variants {
            let json = serde_json::to_string(variant).unwrap();
            assert_eq!(&json, expected_json);
            let deserialized: DeployStage = serde_json::from_str(&json).unwrap();
            assert_eq!(&deserialized, variant);
        }
    }

    #[test]
    fn deploy_stage_next_chain_visits_every_stage_once() {
        let mut seen = vec![DeployStage::BucketCreated];
        let mut stage = DeployStage::BucketCreated;
        while let Some(next) = stage.next() {
            assert!(!seen.contains(&next), "stage {next:?} repeated");
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen, DeployStage::all());
    }

    #[test]
    fn deploy_stage_final_has_no_next() {
        assert_eq!(DeployStage::DataSourceAttached.next(), None);
    }

    #[test]
    fn stack_outputs_default_serializes_to_empty_object() {
        let json = serde_json::to_string(&StackOutputs::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn deploy_state_serde_round_trip() {
        let state = DeployState {
            stage: DeployStage::IndexInitialized,
            project: "support-kb".to_string(),
            region: "us-east-1".to_string(),
            started_at: Utc::now(),
            outputs: StackOutputs {
                bucket_name: Some("support-kb-docs-123456789012".to_string()),
                domain_endpoint: Some(
                    "search-support-kb.us-east-1.es.amazonaws.com".to_string(),
                ),
                ..StackOutputs::default()
            },
        };
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: DeployState = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.stage, state.stage);
        assert_eq!(deserialized.project, state.project);
        assert_eq!(deserialized.region, state.region);
        assert_eq!(deserialized.started_at, state.started_at);
        assert_eq!(deserialized.outputs, state.outputs);
    }

    #[test]
    fn deploy_state_backward_compat_missing_outputs() {
        let json = r#"{"stage":"bucket_created","project":"support-kb","region":"us-east-1","started_at":"2026-08-01T00:00:00Z"}"#;
        let state: DeployState = serde_json::from_str(json).unwrap();
        assert_eq!(state.outputs, StackOutputs::default());
    }
}
