//! Error taxonomy and non-fatal diagnostics

use crate::types::{NodeId, NodeStatus};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Identity reuse with an incompatible immutable field. The offending
    /// event is rejected; prior state is untouched.
    #[error("duplicate conflict on {id}: merge would change immutable field `{field}`")]
    DuplicateConflict { id: NodeId, field: &'static str },

    #[error("session terminated: no further ingestion accepted")]
    Terminated,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("authentication failed: {reason}")]
    AuthFailed { reason: String },

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("engine loop closed: {0}")]
    ChannelClosed(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::AuthFailed {
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    pub fn duplicate(id: NodeId, field: &'static str) -> Self {
        Self::DuplicateConflict { id, field }
    }
}

/// Non-fatal conditions observed during ingestion or fan-out. Every one of
/// these degrades to a best-effort visual placeholder instead of halting
/// the stream, and is carried in the snapshot for the footer/diagnostics
/// panel to render.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A node referenced a parent that has not been observed. The node is
    /// deferred (or, if the parent never arrives, rendered in the overflow
    /// column).
    DanglingReference { id: NodeId, parent: NodeId },

    /// Payload did not match the declared shape for its kind; stored and
    /// rendered as an opaque key-value bag.
    MalformedPayload { id: NodeId },

    /// An update frame tried to move status backward; ignored.
    StaleStatus {
        id: NodeId,
        current: NodeStatus,
        attempted: NodeStatus,
    },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::DanglingReference { id, parent } => {
                write!(f, "node {id} references unseen parent {parent}")
            }
            Diagnostic::MalformedPayload { id } => {
                write!(f, "node {id} carried a malformed payload")
            }
            Diagnostic::StaleStatus {
                id,
                current,
                attempted,
            } => write!(
                f,
                "node {id} status update ignored ({attempted:?} after {current:?})"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_conflict_display() {
        let err = Error::duplicate(NodeId::new("n-1"), "kind");
        assert_eq!(
            err.to_string(),
            "duplicate conflict on n-1: merge would change immutable field `kind`"
        );
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic::DanglingReference {
            id: NodeId::new("child"),
            parent: NodeId::new("ghost"),
        };
        assert_eq!(
            diag.to_string(),
            "node child references unseen parent ghost"
        );
    }
}
