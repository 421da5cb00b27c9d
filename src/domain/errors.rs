//! Domain errors for the codewave execution core.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the execution core.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("Wave {wave_index} not found for execution {execution_id}")]
    WaveNotFound { execution_id: Uuid, wave_index: usize },

    #[error("Atom {atom_id} not found for execution {execution_id}")]
    AtomNotFound { execution_id: Uuid, atom_id: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
