//! Error types for assignment operations.

use handoff_store::{HandoffStatus, StoreError};
use thiserror::Error;

/// Errors that can occur during assignment operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested move is not legal from the handoff's current state.
    /// Not retryable.
    #[error("invalid transition: cannot {action} a {status} handoff")]
    InvalidTransition {
        action: &'static str,
        status: HandoffStatus,
    },

    /// Lost a write race on the same handoff. Safe to retry after
    /// re-reading current state.
    #[error("conflicting assignment on handoff {handoff_id}")]
    ConflictingAssignment { handoff_id: String },

    /// Target agent is offline and the caller lacks the supervisor
    /// override. Not retryable.
    #[error("agent {agent_id} is offline")]
    AgentUnavailable { agent_id: String },

    /// Unknown handoff or agent id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Conversation lookup through the messaging collaborator failed.
    #[error("conversation lookup failed: {0}")]
    Conversation(String),

    /// Transient persistence failure; the caller may retry with backoff.
    #[error("store unavailable: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            StoreError::Conflict { id } => EngineError::ConflictingAssignment { handoff_id: id },
            other => EngineError::Store(other),
        }
    }
}

/// Result type for assignment operations.
pub type Result<T> = std::result::Result<T, EngineError>;
