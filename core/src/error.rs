//! Errors shared by the replay core and the SDK built on it

use crate::workflow::EventType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A history store refused or failed an operation
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Replay diverged from recorded history.
///
/// `sequence` is the per-type sequence number of the offending command, so
/// the third task scheduled by a workflow reports `sequence: 2` regardless of
/// how many timers or operations ran in between.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeterminismViolationError {
    #[error("Type mismatch at sequence {sequence}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        sequence: i32,
        expected: EventType,
        actual: EventType,
    },

    #[error("Operation name mismatch at sequence {sequence}: expected '{expected}', got '{actual}'")]
    OperationNameMismatch {
        sequence: i32,
        expected: String,
        actual: String,
    },

    #[error("Task type mismatch at sequence {sequence}: expected '{expected}', got '{actual}'")]
    TaskTypeMismatch {
        sequence: i32,
        expected: String,
        actual: String,
    },

    #[error("Timer ID mismatch at sequence {sequence}: expected '{expected}', got '{actual}'")]
    TimerIdMismatch {
        sequence: i32,
        expected: String,
        actual: String,
    },

    #[error("State key mismatch at sequence {sequence}: expected '{expected}', got '{actual}'")]
    StateKeyMismatch {
        sequence: i32,
        expected: String,
        actual: String,
    },

    /// The update accepted at this yield point has a different name
    #[error("Update name mismatch at sequence {sequence}: expected '{expected}', got '{actual}'")]
    UpdateNameMismatch {
        sequence: i32,
        expected: String,
        actual: String,
    },

    #[error("Update ID mismatch at sequence {sequence}: expected '{expected}', got '{actual}'")]
    UpdateIdMismatch {
        sequence: i32,
        expected: String,
        actual: String,
    },

    /// History holds an accepted update the current code cannot handle
    #[error("No handler registered for historic update '{name}' ({update_id})")]
    UpdateHandlerMissing { update_id: String, name: String },

    /// Re-running a historic update produced a different outcome kind
    #[error("Update outcome mismatch for {update_id}: expected {expected}, got {actual}")]
    UpdateOutcomeMismatch {
        update_id: String,
        expected: String,
        actual: String,
    },
}
