//! Task execution results and retry math

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Outcome of a single task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskExecutionResult {
    Completed { output: Value },
    Failed {
        error_message: String,
        /// Whether another attempt may succeed
        is_retryable: bool,
    },
    Cancelled,
    /// The attempt outlived its timeout; retryable
    TimedOut,
}

impl TaskExecutionResult {
    pub fn completed(output: Value) -> Self {
        Self::Completed { output }
    }

    pub fn failed(error_message: impl Into<String>, is_retryable: bool) -> Self {
        Self::Failed {
            error_message: error_message.into(),
            is_retryable,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Check if the attempt may be retried
    pub fn can_retry(&self) -> bool {
        match self {
            Self::Failed { is_retryable, .. } => *is_retryable,
            Self::TimedOut => true,
            _ => false,
        }
    }

    /// Error message for non-successful results
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error_message, .. } => Some(error_message.clone()),
            Self::Cancelled => Some("Task cancelled".to_string()),
            Self::TimedOut => Some("Task timed out".to_string()),
        }
    }
}

/// Exponential backoff between task attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Maximum number of attempts, including the first
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 60_000,
        }
    }
}

impl BackoffConfig {
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Backoff before the attempt after `attempt` (1-based), capped at the maximum.
pub fn calculate_backoff(config: &BackoffConfig, attempt: u32) -> Duration {
    let base_ms = config.initial_backoff_ms as f64;
    let multiplier = config
        .backoff_multiplier
        .powi(attempt.saturating_sub(1) as i32);
    let backoff = Duration::from_millis((base_ms * multiplier) as u64);
    std::cmp::min(backoff, config.max_backoff())
}

/// Whether a failed attempt should be retried.
pub fn should_retry(config: &BackoffConfig, attempt: u32, result: &TaskExecutionResult) -> bool {
    result.can_retry() && attempt < config.max_retries
}
