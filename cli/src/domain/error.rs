//! Typed domain error enums.
//!
//! This module has zero imports from `crate::engine`, `crate::commands`,
//! `tokio`, `std::fs`, or `std::process`. All error types implement
//! `thiserror::Error` and convert to `anyhow::Error` via the `?` operator.

use thiserror::Error;

// ── Declaration errors ────────────────────────────────────────────────────────

/// Errors raised while validating and ordering the resource declaration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("resource '{from}' references undeclared resource '{to}'")]
    UnknownReference { from: String, to: String },

    #[error("resource '{0}' is declared more than once")]
    DuplicateResource(String),

    #[error("dependency cycle involving: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to project configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "Invalid project name '{0}': must match ^[a-z0-9]([a-z0-9-]{{0,26}}[a-z0-9])?$ \
         (search domain names cap at 28 characters)"
    )]
    InvalidProjectName(String),

    #[error("Invalid index name '{name}': {reason}")]
    InvalidIndexName { name: String, reason: String },

    #[error("Invalid region '{0}': expected a value like us-east-1")]
    InvalidRegion(String),

    #[error("search.instance_count must be at least 1")]
    ZeroInstanceCount,
}
