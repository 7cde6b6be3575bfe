//! Test environment running the real engine in memory

use crate::client::{StartWorkflowOptions, WorkflowClient};
use crate::config::EngineConfig;
use crate::engine::{InMemoryHistoryStore, WorkflowEngine};
use crate::error::Result;
use crate::task::context::TaskContext;
use crate::task::definition::TaskDefinition;
use crate::task::registry::{TaskMetadata, TaskRegistry};
use crate::testing::TimeController;
use crate::worker::registry::WorkflowRegistry;
use crate::workflow::context::WorkflowContext;
use crate::workflow::definition::WorkflowDefinition;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// In-memory engine with its store and registries.
///
/// Workflows and tasks may be registered before or after starting
/// executions; the engine looks kinds up when it runs them.
///
/// ```ignore
/// let env = TestWorkflowEnvironment::new()?;
/// env.register_workflow(UpdateWorkflow)?;
///
/// let handle = env.client().start_workflow("update-workflow", (), StartWorkflowOptions::new()).await?;
/// let result: String = handle.execute_update(&MY_UPDATE, "update-arg".into()).await?;
/// ```
pub struct TestWorkflowEnvironment {
    store: Arc<InMemoryHistoryStore>,
    workflows: Arc<WorkflowRegistry>,
    tasks: Arc<TaskRegistry>,
    config: EngineConfig,
    engine: RwLock<WorkflowEngine>,
    time: TimeController,
}

impl TestWorkflowEnvironment {
    /// Environment with the default engine configuration.
    /// Must be called inside a tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let store = Arc::new(InMemoryHistoryStore::new());
        let workflows = Arc::new(WorkflowRegistry::new());
        let tasks = Arc::new(TaskRegistry::new());
        let engine = WorkflowEngine::new(
            store.clone(),
            Arc::clone(&workflows),
            Arc::clone(&tasks),
            config.clone(),
        )?;

        Ok(Self {
            store,
            workflows,
            tasks,
            config,
            engine: RwLock::new(engine),
            time: TimeController::new(),
        })
    }

    /// The current engine
    pub fn engine(&self) -> WorkflowEngine {
        self.engine.read().clone()
    }

    /// A client bound to the current engine
    pub fn client(&self) -> WorkflowClient {
        WorkflowClient::new(self.engine())
    }

    pub fn store(&self) -> &Arc<InMemoryHistoryStore> {
        &self.store
    }

    pub fn time_controller(&self) -> &TimeController {
        &self.time
    }

    pub fn register_workflow<W>(&self, workflow: W) -> Result<()>
    where
        W: WorkflowDefinition + 'static,
        W::Input: Serialize + DeserializeOwned + Send + 'static,
        W::Output: Serialize + DeserializeOwned + Send + 'static,
    {
        self.workflows.register(workflow)
    }

    /// Register a workflow closure under `kind`
    pub fn register_workflow_fn<F, Fut>(&self, kind: &str, execute_fn: F) -> Result<()>
    where
        F: Fn(Arc<dyn WorkflowContext + Send + Sync>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.workflows.register_simple(kind, execute_fn)
    }

    pub fn register_task<T>(&self, task: T) -> Result<()>
    where
        T: TaskDefinition + 'static,
        T::Input: 'static,
        T::Output: 'static,
    {
        self.tasks.register(task)
    }

    /// Register a task closure under `kind`
    pub fn register_task_fn<F, Fut>(&self, kind: &str, execute_fn: F) -> Result<()>
    where
        F: Fn(Arc<dyn TaskContext + Send + Sync>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.tasks.register_simple(kind, execute_fn)
    }

    /// Register a task closure with explicit metadata (retry policy, timeout)
    pub fn register_task_with<F, Fut>(&self, metadata: TaskMetadata, execute_fn: F) -> Result<()>
    where
        F: Fn(Arc<dyn TaskContext + Send + Sync>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.tasks.register_with(metadata, execute_fn)
    }

    /// Start a workflow and wait for its output
    pub async fn execute_workflow(&self, kind: &str, input: Value) -> Result<Value> {
        let handle = self
            .client()
            .start_workflow(kind, input, StartWorkflowOptions::new())
            .await?;
        handle.result_raw().await
    }

    /// Stop the engine and start a fresh one over the same store.
    ///
    /// Returns how many open executions the new engine recovered. Pending
    /// update waiters of the old engine are dropped.
    pub async fn restart(&self) -> Result<usize> {
        self.engine().shutdown().await;

        let engine = WorkflowEngine::new(
            self.store.clone(),
            Arc::clone(&self.workflows),
            Arc::clone(&self.tasks),
            self.config.clone(),
        )?;
        *self.engine.write() = engine.clone();

        let recovered = engine.recover().await?;
        debug!(recovered, "Test engine restarted");
        Ok(recovered)
    }

    /// Stop the current engine and wait for its in-flight work
    pub async fn shutdown(&self) {
        self.engine().shutdown().await;
    }
}

impl Drop for TestWorkflowEnvironment {
    fn drop(&mut self) {
        self.engine.get_mut().request_shutdown();
    }
}
