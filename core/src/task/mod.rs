//! Task module - execution results and retry policy

pub mod execution;

pub use execution::{calculate_backoff, should_retry, BackoffConfig, TaskExecutionResult};
