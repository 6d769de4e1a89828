//! Error taxonomy shared by the model and the layout engine.
//!
//! Structural invariant violations are rejected before any mutation is
//! applied: a failed operation leaves the model, the view registry, and
//! the layout shadow untouched.

use crate::id::{RelationshipId, TopicId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Attempted structural violation: deleting or disconnecting the
    /// central topic, a cycle-forming connect, or an operation whose
    /// target precondition does not hold.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Reference to an unknown topic or relationship ID.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u32 },

    /// The layout engine was asked to track an ID it already tracks.
    #[error("node {0} already has a layout shadow entry")]
    DuplicateNode(TopicId),
}

impl CoreError {
    pub fn topic_not_found(id: TopicId) -> Self {
        CoreError::NotFound {
            kind: "topic",
            id: id.0,
        }
    }

    pub fn relationship_not_found(id: RelationshipId) -> Self {
        CoreError::NotFound {
            kind: "relationship",
            id: id.0,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        CoreError::InvalidOperation(msg.into())
    }
}
