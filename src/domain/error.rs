//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::NodeId;

/// Domain errors represent structural or input violations detected by the
/// tree algorithms. All of them are fatal to the call that raised them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("malformed tree at node {node}: {reason}")]
    MalformedTree { node: NodeId, reason: String },

    #[error("unknown {kind}: {value}")]
    InvalidMode { kind: &'static str, value: String },

    #[error("empty result: {0}")]
    EmptyResult(String),

    #[error("missing annotation: {0}")]
    MissingAnnotation(String),

    #[error("ambiguous input: {0}")]
    AmbiguousInput(String),

    #[error("node not found: {0}")]
    UnknownNode(NodeId),
}

impl DomainError {
    pub fn malformed(node: NodeId, reason: impl Into<String>) -> Self {
        DomainError::MalformedTree {
            node,
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
