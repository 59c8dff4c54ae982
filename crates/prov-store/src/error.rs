//! Error types for the provenance store
//!
//! None of these are retried internally: they describe caller misuse or a
//! genuine absence. Revision-source failures are surfaced unchanged.

use crate::id::EntityKind;
use crate::persistence::PersistenceError;
use crate::revision::RevisionError;
use prov_graph::GraphError;

/// Result alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Main store error type
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Lookup by id or path found nothing
    #[error("{kind} {key} does not exist")]
    NotFound { kind: EntityKind, key: String },

    /// Explicit create collided with a unique key
    #[error("{kind} already exists: {key}")]
    DuplicateEntity { kind: EntityKind, key: String },

    /// Strict edge removal on an absent edge
    #[error("no {kind} edge {predecessor} -> {successor}")]
    EdgeNotFound {
        kind: EntityKind,
        predecessor: String,
        successor: String,
    },

    /// Stage list violates the pipeline shape rules
    #[error("invalid pipeline shape: {0}")]
    InvalidPipelineShape(String),

    /// Required input was absent or empty
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// Path cannot be expressed relative to the project root
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Tracked file has no resolvable revision
    #[error("no revision found for {0}")]
    NoRevision(String),

    /// Directed graph error
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Persistence engine error
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Revision source error
    #[error("revision source error: {0}")]
    Revision(#[from] RevisionError),

    /// Row (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create not-found error
    #[inline]
    pub fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Create invalid path error
    #[inline]
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is a missing entity
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if the failure may be transient
    ///
    /// Only revision-source commands qualify; the store itself never retries.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Revision(e) if e.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message() {
        let err = StoreError::not_found(EntityKind::File, "data/train.csv");
        assert_eq!(err.to_string(), "file data/train.csv does not exist");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn revision_command_failure_is_retryable() {
        let err = StoreError::from(RevisionError::Command {
            command: "git commit".to_string(),
            message: "index.lock exists".to_string(),
        });
        assert!(err.is_retryable());
    }
}
