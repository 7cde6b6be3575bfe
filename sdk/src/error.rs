//! Error types for the Cairn SDK

pub use cairn_core::{CoreError, DeterminismViolationError};

#[cfg(test)]
use cairn_core::EventType;

/// Main error type for the Cairn SDK
#[derive(Debug, thiserror::Error)]
pub enum CairnError {
    /// Workflow is blocked until new history arrives (task, timer, signal, update)
    #[error("Workflow suspended: {reason}")]
    Suspended { reason: String },

    /// Task was cancelled
    #[error("Task cancelled")]
    TaskCancelled,

    /// Task execution failed
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// Workflow was cancelled
    #[error("Workflow cancelled: {0}")]
    WorkflowCancelled(String),

    /// Workflow execution failed
    #[error("Workflow failed: {0}")]
    WorkflowFailed(String),

    /// Determinism violation detected during replay
    #[error("Determinism violation: {0}")]
    DeterminismViolation(DeterminismViolationError),

    /// Non-retryable error (permanent failure)
    #[error("Non-retryable error: {0}")]
    NonRetryable(String),

    /// The workflow's validator refused the update
    #[error("Update '{name}' ({update_id}) rejected: {reason}")]
    UpdateRejected {
        update_id: String,
        name: String,
        reason: String,
    },

    /// The update was accepted but its handler failed
    #[error("Update '{name}' ({update_id}) failed: {error}")]
    UpdateFailed {
        update_id: String,
        name: String,
        error: String,
    },

    /// No handler is registered for the update name
    #[error("Unknown update: {0}")]
    UnknownUpdate(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Workflow kind or execution not found
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// A running execution already uses this workflow ID
    #[error("Workflow already started: {0}")]
    WorkflowAlreadyStarted(String),

    /// The execution has already reached a terminal state
    #[error("Workflow closed: {0}")]
    WorkflowClosed(String),

    /// Task definition not found
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// History storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Cairn SDK operations
pub type Result<T> = std::result::Result<T, CairnError>;

impl CairnError {
    /// True when an update did not produce a result, whether it was refused
    /// at validation or its handler failed.
    pub fn is_update_failure(&self) -> bool {
        matches!(
            self,
            Self::UpdateRejected { .. } | Self::UpdateFailed { .. } | Self::UnknownUpdate(_)
        )
    }

    /// True for the internal suspension signal
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }
}

impl From<CoreError> for CairnError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Serialization(e) => CairnError::Serialization(e),
            CoreError::Storage(msg) => CairnError::Storage(msg),
            CoreError::InvalidConfiguration(msg) => CairnError::InvalidConfiguration(msg),
            CoreError::Timeout(msg) => CairnError::Timeout(msg),
            CoreError::Other(msg) => CairnError::Other(msg),
        }
    }
}

impl From<DeterminismViolationError> for CairnError {
    fn from(err: DeterminismViolationError) -> Self {
        CairnError::DeterminismViolation(err)
    }
}
