//! WorkflowContext trait definition

use crate::error::{CairnError, Result};
use crate::workflow::update::{UpdateDefinition, UpdateHandler};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

pub use cairn_core::DeterministicRandom;

/// Context for workflow execution providing deterministic APIs and side effect management.
///
/// This trait uses `Value` types for object-safety. For typed APIs, use the extension
/// methods provided by `WorkflowContextExt`.
///
/// The blocking calls (`condition`, `condition_with_timeout`, `sleep`,
/// `wait_signal_raw`, `schedule_raw`, `schedule_all_raw`) are yield points:
/// queued updates are delivered there and nowhere else.
#[async_trait]
pub trait WorkflowContext: Send + Sync {
    // === Identifiers ===

    /// Get the user-facing workflow ID
    fn workflow_id(&self) -> &str;

    /// Get the unique ID of this workflow execution
    fn workflow_execution_id(&self) -> Uuid;

    /// Get the raw workflow input as JSON Value
    fn input_raw(&self) -> &Value;

    // === Deterministic APIs (recorded/replayed) ===

    /// Workflow time in milliseconds. Starts at the workflow's start time and
    /// advances to the time of each timer, task result or signal the workflow
    /// has waited for. Same on every replay.
    fn current_time_millis(&self) -> i64;

    /// Generate a deterministic UUID (same on replay)
    fn random_uuid(&self) -> Uuid;

    /// Get a deterministic random number generator (same sequence on replay)
    fn random(&self) -> &dyn DeterministicRandom;

    // === Side Effects ===

    /// Record a side effect's result. On replay, returns the recorded result.
    async fn run_raw(&self, name: &str, result: Value) -> Result<Value>;

    // === Task Scheduling ===

    /// Schedule a task and wait for its completion
    async fn schedule_raw(&self, kind: &str, input: Value) -> Result<Value>;

    /// Schedule several tasks at once and wait for all of them.
    /// Results come back in the order the tasks were given.
    async fn schedule_all_raw(&self, tasks: Vec<(String, Value)>) -> Result<Vec<Value>>;

    // === State Management ===

    /// Get a value from durable workflow state
    async fn get_raw(&self, key: &str) -> Result<Option<Value>>;

    /// Set a value in durable workflow state
    async fn set_raw(&self, key: &str, value: Value) -> Result<()>;

    /// Clear a specific key from workflow state
    async fn clear(&self, key: &str) -> Result<()>;

    /// Clear all workflow state
    async fn clear_all(&self) -> Result<()>;

    /// Get all keys in workflow state
    async fn state_keys(&self) -> Result<Vec<String>>;

    // === Timers ===

    /// Sleep for the specified duration (durable - survives restarts)
    async fn sleep(&self, duration: Duration) -> Result<()>;

    // === Signals ===

    /// Wait for the next signal with this name and return its payload
    async fn wait_signal_raw(&self, name: &str) -> Result<Value>;

    // === Updates ===

    /// Install (or replace) the handler for an update name
    fn set_update_handler_raw(&self, name: &str, handler: UpdateHandler);

    // === Conditions ===

    /// Block until the predicate holds
    async fn condition(&self, predicate: &(dyn Fn() -> bool + Send + Sync)) -> Result<()>;

    /// Block until the predicate holds or the timeout elapses.
    /// Returns `false` on timeout.
    async fn condition_with_timeout(
        &self,
        predicate: &(dyn Fn() -> bool + Send + Sync),
        timeout: Duration,
    ) -> Result<bool>;

    // === Cancellation ===

    /// Check if cancellation has been requested
    fn is_cancellation_requested(&self) -> bool;

    /// Check for cancellation and return error if cancelled
    async fn check_cancellation(&self) -> Result<()>;
}

/// Extension trait for typed workflow context operations.
/// These methods provide type-safe wrappers around the raw Value methods.
pub trait WorkflowContextExt: WorkflowContext {
    /// Get the workflow input as the specified type
    fn input<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.input_raw().clone()).map_err(CairnError::Serialization)
    }

    /// Get a value from workflow state
    fn get_typed<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<T>>> + Send
    where
        Self: Sync,
    {
        async move {
            match self.get_raw(key).await? {
                Some(v) => serde_json::from_value(v)
                    .map(Some)
                    .map_err(CairnError::Serialization),
                None => Ok(None),
            }
        }
    }

    /// Set a value in workflow state
    fn set_typed<T: Serialize + Send>(
        &self,
        key: &str,
        value: T,
    ) -> impl std::future::Future<Output = Result<()>> + Send
    where
        Self: Sync,
    {
        async move {
            let v = serde_json::to_value(value).map_err(CairnError::Serialization)?;
            self.set_raw(key, v).await
        }
    }

    /// Wait for a signal and deserialize its payload
    fn wait_signal<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<T>> + Send
    where
        Self: Sync,
    {
        async move {
            let value = self.wait_signal_raw(name).await?;
            serde_json::from_value(value).map_err(CairnError::Serialization)
        }
    }

    /// Schedule a task with typed input and output
    fn schedule<I: Serialize + Send, O: DeserializeOwned>(
        &self,
        kind: &str,
        input: I,
    ) -> impl std::future::Future<Output = Result<O>> + Send
    where
        Self: Sync,
    {
        async move {
            let input = serde_json::to_value(input).map_err(CairnError::Serialization)?;
            let output = self.schedule_raw(kind, input).await?;
            serde_json::from_value(output).map_err(CairnError::Serialization)
        }
    }

    /// Install a typed update handler
    fn set_update_handler<I, O, F>(&self, definition: &UpdateDefinition<I, O>, handler: F)
    where
        I: DeserializeOwned + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> Result<O> + Send + Sync + 'static,
    {
        self.set_update_handler_raw(definition.name(), UpdateHandler::typed(handler));
    }

    /// Install a typed update handler with a validator
    fn set_update_handler_with_validator<I, O, F, V>(
        &self,
        definition: &UpdateDefinition<I, O>,
        handler: F,
        validator: V,
    ) where
        I: DeserializeOwned + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> Result<O> + Send + Sync + 'static,
        V: Fn(&I) -> Result<()> + Send + Sync + 'static,
    {
        self.set_update_handler_raw(
            definition.name(),
            UpdateHandler::typed(handler).with_validator(validator),
        );
    }
}

impl<T: WorkflowContext + ?Sized> WorkflowContextExt for T {}
