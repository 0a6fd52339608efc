//! Vector index schema and index-name rules.
//!
//! The mapping is what the knowledge base expects to find on the cluster:
//! a kNN vector field plus the managed metadata and text-chunk fields.

use serde_json::{Value, json};

use crate::domain::error::ConfigError;

/// Field holding the embedding vectors.
pub const VECTOR_FIELD: &str = "embeddings";
/// Managed metadata field; stored but never indexed.
pub const METADATA_FIELD: &str = "AMAZON_BEDROCK_METADATA";
/// Managed text-chunk field; indexed for retrieval.
pub const TEXT_FIELD: &str = "AMAZON_BEDROCK_TEXT_CHUNK";

/// Embedding width of amazon.titan-embed-text-v2:0.
pub const DEFAULT_DIMENSION: u32 = 1024;

const EF_CONSTRUCTION: u32 = 128;
const HNSW_M: u32 = 24;

/// Settings for the kNN index created by the bootstrap step.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub name: String,
    pub dimension: u32,
}

impl IndexSettings {
    #[must_use]
    pub fn new(name: impl Into<String>, dimension: u32) -> Self {
        Self {
            name: name.into(),
            dimension,
        }
    }

    /// Index creation body: kNN enabled, HNSW on faiss with L2 distance.
    #[must_use]
    pub fn body(&self) -> Value {
        json!({
            "settings": {
                "index": { "knn": true }
            },
            "mappings": {
                "properties": {
                    VECTOR_FIELD: {
                        "type": "knn_vector",
                        "dimension": self.dimension,
                        "space_type": "l2",
                        "method": {
                            "name": "hnsw",
                            "engine": "faiss",
                            "parameters": {
                                "ef_construction": EF_CONSTRUCTION,
                                "m": HNSW_M
                            }
                        }
                    },
                    METADATA_FIELD: { "type": "text", "index": false },
                    TEXT_FIELD: { "type": "text", "index": true }
                }
            }
        })
    }
}

/// Characters the search engine rejects in index names.
const FORBIDDEN: &[char] = &[
    ' ', '"', '*', '\\', '/', '<', '>', '|', ',', '#', ':', '?',
];

/// Validate `name` against the search engine's index-name rules.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidIndexName`] with the violated rule.
pub fn validate_index_name(name: &str) -> Result<(), ConfigError> {
    let fail = |reason: &str| {
        Err(ConfigError::InvalidIndexName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return fail("must not be empty");
    }
    if name.len() > 255 {
        return fail("must be at most 255 bytes");
    }
    if name == "." || name == ".." {
        return fail("must not be '.' or '..'");
    }
    if name.starts_with(['_', '-', '+']) {
        return fail("must not start with '_', '-', or '+'");
    }
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return fail("must be lowercase");
    }
    if name.chars().any(|c| FORBIDDEN.contains(&c)) {
        return fail("contains a forbidden character");
    }
    Ok(())
}
