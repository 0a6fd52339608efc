//! Project configuration — `ragstack.yaml` loading, validation, and the
//! names derived from it.
//!
//! The project name doubles as the search domain name, so its rules are
//! the domain's: lowercase alphanumerics and hyphens, 28 characters max.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::index;

/// Config file looked up in the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "ragstack.yaml";

static PROJECT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // compile-time constant pattern
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,26}[a-z0-9])?$").expect("valid regex")
});

static REGION: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // compile-time constant pattern
    Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d$").expect("valid regex")
});

fn default_embedding_model() -> String {
    "amazon.titan-embed-text-v2:0".to_string()
}

/// Top-level project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name; prefixes every resource name.
    pub project: String,
    /// Region the stack is deployed into.
    pub region: String,
    /// Embedding model the knowledge base vectorizes with.
    #[serde(default = "default_embedding_model")]
    pub embedding_model_id: String,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

/// Search cluster sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default = "SearchConfig::default_engine_version")]
    pub engine_version: String,
    #[serde(default = "SearchConfig::default_instance_type")]
    pub instance_type: String,
    #[serde(default = "SearchConfig::default_instance_count")]
    pub instance_count: u32,
    #[serde(default = "SearchConfig::default_volume_gib")]
    pub volume_gib: u32,
}

impl SearchConfig {
    fn default_engine_version() -> String {
        "OpenSearch_2.19".to_string()
    }
    fn default_instance_type() -> String {
        "r7g.large.search".to_string()
    }
    const fn default_instance_count() -> u32 {
        1
    }
    const fn default_volume_gib() -> u32 {
        100
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine_version: Self::default_engine_version(),
            instance_type: Self::default_instance_type(),
            instance_count: Self::default_instance_count(),
            volume_gib: Self::default_volume_gib(),
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Index name; defaults to `<project>-index`.
    #[serde(default)]
    pub name: Option<String>,
    /// Embedding width; defaults to the embedding model's.
    #[serde(default)]
    pub dimension: Option<u32>,
}

impl Config {
    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if any
    /// field violates its rules.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field rules; called by `load`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PROJECT_NAME.is_match(&self.project) {
            return Err(ConfigError::InvalidProjectName(self.project.clone()));
        }
        if !REGION.is_match(&self.region) {
            return Err(ConfigError::InvalidRegion(self.region.clone()));
        }
        if self.search.instance_count == 0 {
            return Err(ConfigError::ZeroInstanceCount);
        }
        index::validate_index_name(&self.index_name())?;
        Ok(())
    }

    // ── Derived names ────────────────────────────────────────────────────────

    /// Search domain name (the project name itself).
    #[must_use]
    pub fn domain_name(&self) -> &str {
        &self.project
    }

    /// Document bucket name, account-qualified for global uniqueness.
    #[must_use]
    pub fn bucket_name(&self, account: &str) -> String {
        format!("{}-docs-{account}", self.project)
    }

    /// Service role the knowledge base assumes.
    #[must_use]
    pub fn kb_role_name(&self) -> String {
        format!("{}-kb-role", self.project)
    }

    #[must_use]
    pub fn knowledge_base_name(&self) -> String {
        format!("{}-kb", self.project)
    }

    #[must_use]
    pub fn data_source_name(&self) -> String {
        format!("{}-docs", self.project)
    }

    /// Configured index name, or the `<project>-index` default.
    #[must_use]
    pub fn index_name(&self) -> String {
        self.index
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-index", self.project))
    }

    #[must_use]
    pub fn index_dimension(&self) -> u32 {
        self.index.dimension.unwrap_or(index::DEFAULT_DIMENSION)
    }

    /// Foundation-model ARN for the configured embedding model.
    #[must_use]
    pub fn embedding_model_arn(&self) -> String {
        format!(
            "arn:aws:bedrock:{}::foundation-model/{}",
            self.region, self.embedding_model_id
        )
    }
}

/// Starter config written by `ragstack bootstrap` when none exists.
pub const SCAFFOLD: &str = "\
# ragstack project configuration
project: my-knowledge-base
region: us-east-1
embedding_model_id: amazon.titan-embed-text-v2:0
search:
  engine_version: OpenSearch_2.19
  instance_type: r7g.large.search
  instance_count: 1
  volume_gib: 100
index:
  # defaults to <project>-index
  # name: my-knowledge-base-index
  # dimension: 1024
";

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn minimal() -> Config {
        Config {
            project: "support-kb".to_string(),
            region: "us-east-1".to_string(),
            embedding_model_id: default_embedding_model(),
            search: SearchConfig::default(),
            index: IndexConfig::default(),
        }
    }

    #[test]
    fn load_minimal_yaml_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ragstack.yaml");
        std::fs::write(&path, "project: support-kb\nregion: eu-west-1\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.project, "support-kb");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.embedding_model_id, "amazon.titan-embed-text-v2:0");
        assert_eq!(config.search.instance_count, 1);
        assert_eq!(config.search.engine_version, "OpenSearch_2.19");
        assert_eq!(config.index_name(), "support-kb-index");
        assert_eq!(config.index_dimension(), 1024);
    }

    #[test]
    fn load_rejects_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ragstack.yaml");
        std::fs::write(&path, "project: kb\nregion: us-east-1\ntypo_field: 1\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn load_scaffold_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ragstack.yaml");
        std::fs::write(&path, SCAFFOLD).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.project, "my-knowledge-base");
    }

    #[test]
    fn validate_rejects_bad_project_names() {
        for bad in ["", "UPPER", "-lead", "trail-", "has_underscore", "a.b",
                    "this-name-is-way-too-long-for-a-domain"] {
            let mut config = minimal();
            config.project = bad.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidProjectName(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn validate_accepts_28_char_project_name() {
        let mut config = minimal();
        config.project = "a".repeat(28);
        assert!(config.validate().is_ok());
        config.project = "a".repeat(29);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_regions() {
        for bad in ["useast1", "us-east", "US-EAST-1", "us-east-12x"] {
            let mut config = minimal();
            config.region = bad.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidRegion(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn validate_accepts_multi_part_regions() {
        for good in ["us-east-1", "ap-southeast-2", "eu-central-1"] {
            let mut config = minimal();
            config.region = good.to_string();
            assert!(config.validate().is_ok(), "{good} should be accepted");
        }
    }

    #[test]
    fn validate_rejects_zero_instances() {
        let mut config = minimal();
        config.search.instance_count = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroInstanceCount));
    }

    #[test]
    fn validate_checks_custom_index_name() {
        let mut config = minimal();
        config.index.name = Some("Bad Name".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidIndexName { .. })
        ));
    }

    #[test]
    fn derived_names_follow_project() {
        let config = minimal();
        assert_eq!(config.domain_name(), "support-kb");
        assert_eq!(config.bucket_name("123456789012"), "support-kb-docs-123456789012");
        assert_eq!(config.kb_role_name(), "support-kb-kb-role");
        assert_eq!(config.knowledge_base_name(), "support-kb-kb");
        assert_eq!(config.data_source_name(), "support-kb-docs");
        assert_eq!(
            config.embedding_model_arn(),
            "arn:aws:bedrock:us-east-1::foundation-model/amazon.titan-embed-text-v2:0"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Names from the project alphabet within length bounds validate.
        #[test]
        fn prop_project_names_within_rules_accepted(
            name in "[a-z0-9]([a-z0-9-]{0,26}[a-z0-9])?",
        ) {
            let mut config = Config {
                project: name,
                region: "us-east-1".to_string(),
                embedding_model_id: default_embedding_model(),
                search: SearchConfig::default(),
                index: IndexConfig::default(),
            };
            // index name derives from the project, so it stays valid too
            prop_assert!(config.validate().is_ok(), "rejected: {}", config.project);
            config.project.push('-');
            prop_assert!(config.validate().is_err());
        }
    }
}
