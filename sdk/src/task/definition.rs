//! TaskDefinition trait

use crate::error::Result;
use crate::task::context::TaskContext;
use async_trait::async_trait;
use cairn_core::BackoffConfig;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Retry policy for a task kind
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }
}

impl From<&RetryConfig> for BackoffConfig {
    fn from(config: &RetryConfig) -> Self {
        BackoffConfig {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff.as_millis() as u64,
            backoff_multiplier: config.backoff_multiplier,
            max_backoff_ms: config.max_backoff.as_millis() as u64,
        }
    }
}

/// Definition of a task with typed input and output.
///
/// Tasks run outside the workflow and may have side effects. Their results
/// are recorded in history, so a replaying workflow never runs them twice.
#[async_trait]
pub trait TaskDefinition: Send + Sync {
    type Input: Serialize + DeserializeOwned + Send;
    type Output: Serialize + DeserializeOwned + Send;

    fn kind(&self) -> &str;

    async fn execute(&self, input: Self::Input, ctx: &dyn TaskContext) -> Result<Self::Output>;

    fn name(&self) -> &str {
        self.kind()
    }

    fn description(&self) -> Option<&str> {
        None
    }

    /// Per-attempt timeout. `None` uses the engine default.
    fn timeout_seconds(&self) -> Option<u64> {
        None
    }

    /// `None` uses the engine's task configuration
    fn retry_config(&self) -> Option<RetryConfig> {
        None
    }
}

pub type DynamicTaskInput = Map<String, Value>;
pub type DynamicTaskOutput = Map<String, Value>;

/// Untyped task over JSON objects
#[async_trait]
pub trait DynamicTask: Send + Sync {
    fn kind(&self) -> &str;

    async fn execute(
        &self,
        input: DynamicTaskInput,
        ctx: &dyn TaskContext,
    ) -> Result<DynamicTaskOutput>;

    fn timeout_seconds(&self) -> Option<u64> {
        None
    }

    fn retry_config(&self) -> Option<RetryConfig> {
        None
    }
}

#[async_trait]
impl<T: DynamicTask> TaskDefinition for T {
    type Input = DynamicTaskInput;
    type Output = DynamicTaskOutput;

    fn kind(&self) -> &str {
        DynamicTask::kind(self)
    }

    async fn execute(&self, input: Self::Input, ctx: &dyn TaskContext) -> Result<Self::Output> {
        DynamicTask::execute(self, input, ctx).await
    }

    fn timeout_seconds(&self) -> Option<u64> {
        DynamicTask::timeout_seconds(self)
    }

    fn retry_config(&self) -> Option<RetryConfig> {
        DynamicTask::retry_config(self)
    }
}
