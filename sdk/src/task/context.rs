//! TaskContext trait definition

use crate::error::Result;
use async_trait::async_trait;

/// Log level for task logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Context handed to a running task attempt.
#[async_trait]
pub trait TaskContext: Send + Sync {
    /// Stable ID of the task execution (same for every attempt)
    fn task_execution_id(&self) -> &str;

    /// ID of the workflow that scheduled the task
    fn workflow_id(&self) -> &str;

    /// Current attempt number (1-indexed)
    fn attempt(&self) -> u32;

    /// Log a message tagged with the task's identifiers
    fn log(&self, level: LogLevel, message: &str);

    /// True once the owning workflow has been cancelled or closed
    fn is_cancelled(&self) -> bool;

    /// Return `TaskCancelled` if the task has been cancelled
    async fn check_cancellation(&self) -> Result<()>;
}
