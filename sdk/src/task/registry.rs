//! TaskRegistry - task kinds known to the engine

use crate::error::{CairnError, Result};
use crate::task::context::TaskContext;
use crate::task::definition::{RetryConfig, TaskDefinition};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TaskMetadata {
    pub kind: String,
    pub name: String,
    pub description: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// `None` falls back to the engine's task configuration
    pub retry: Option<RetryConfig>,
}

impl TaskMetadata {
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            name: kind.clone(),
            kind,
            description: None,
            timeout_seconds: None,
            retry: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }
}

pub type BoxedTaskFn = Box<
    dyn Fn(
            Arc<dyn TaskContext + Send + Sync>,
            Value,
        ) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>>
        + Send
        + Sync,
>;

pub struct RegisteredTask {
    pub metadata: TaskMetadata,
    execute_fn: BoxedTaskFn,
}

impl RegisteredTask {
    pub fn new(metadata: TaskMetadata, execute_fn: BoxedTaskFn) -> Self {
        Self {
            metadata,
            execute_fn,
        }
    }

    /// Run one attempt
    pub async fn execute(
        &self,
        ctx: Arc<dyn TaskContext + Send + Sync>,
        input: Value,
    ) -> Result<Value> {
        (self.execute_fn)(ctx, input).await
    }
}

impl std::fmt::Debug for RegisteredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTask")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Registry of task kinds.
///
/// The engine looks tasks up when it runs them, so kinds may be registered
/// after the engine has started.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<RegisteredTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_raw(&self, task: RegisteredTask) -> Result<()> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.metadata.kind) {
            return Err(CairnError::InvalidConfiguration(format!(
                "Task kind '{}' is already registered",
                task.metadata.kind
            )));
        }
        tasks.insert(task.metadata.kind.clone(), Arc::new(task));
        Ok(())
    }

    /// Register a typed task definition
    pub fn register<T>(&self, task: T) -> Result<()>
    where
        T: TaskDefinition + 'static,
        T::Input: 'static,
        T::Output: 'static,
    {
        let metadata = TaskMetadata {
            kind: task.kind().to_string(),
            name: task.name().to_string(),
            description: task.description().map(str::to_string),
            timeout_seconds: task.timeout_seconds(),
            retry: task.retry_config(),
        };
        let task = Arc::new(task);

        let execute_fn: BoxedTaskFn = Box::new(move |ctx, input| {
            let task = Arc::clone(&task);
            Box::pin(async move {
                let input: T::Input = serde_json::from_value(input)
                    .map_err(|e| CairnError::NonRetryable(format!("Invalid task input: {}", e)))?;
                let output = task.execute(input, ctx.as_ref()).await?;
                Ok(serde_json::to_value(output)?)
            })
        });

        self.register_raw(RegisteredTask::new(metadata, execute_fn))
    }

    /// Register a closure under `kind` with default metadata
    pub fn register_simple<F, Fut>(&self, kind: &str, execute_fn: F) -> Result<()>
    where
        F: Fn(Arc<dyn TaskContext + Send + Sync>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.register_with(TaskMetadata::new(kind), execute_fn)
    }

    /// Register a closure with explicit metadata
    pub fn register_with<F, Fut>(&self, metadata: TaskMetadata, execute_fn: F) -> Result<()>
    where
        F: Fn(Arc<dyn TaskContext + Send + Sync>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let boxed: BoxedTaskFn = Box::new(move |ctx, input| Box::pin(execute_fn(ctx, input)));
        self.register_raw(RegisteredTask::new(metadata, boxed))
    }

    pub fn get(&self, kind: &str) -> Option<Arc<RegisteredTask>> {
        self.tasks.read().get(kind).cloned()
    }

    pub fn has(&self, kind: &str) -> bool {
        self.tasks.read().contains_key(kind)
    }

    pub fn get_registered_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.tasks.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.get_registered_kinds())
            .finish()
    }
}
