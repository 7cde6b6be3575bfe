//! WorkflowClient - entry point for callers outside workflows

use crate::client::options::StartWorkflowOptions;
use crate::client::workflow_handle::WorkflowHandle;
use crate::engine::WorkflowEngine;
use crate::error::Result;
use serde::Serialize;
use tracing::debug;

/// Starts workflows on an engine and hands out handles to them.
#[derive(Clone)]
pub struct WorkflowClient {
    engine: WorkflowEngine,
}

impl WorkflowClient {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    /// Start a workflow and return a handle to it
    pub async fn start_workflow<I: Serialize>(
        &self,
        kind: &str,
        input: I,
        options: StartWorkflowOptions,
    ) -> Result<WorkflowHandle> {
        let input = serde_json::to_value(input)?;
        let record = self.engine.start_workflow(kind, input, options).await?;
        debug!(workflow_id = %record.workflow_id, kind = %kind, "Client started workflow");
        Ok(self.workflow_handle(record.workflow_id))
    }

    /// Handle to an existing workflow. Does not check that it exists.
    pub fn workflow_handle(&self, workflow_id: impl Into<String>) -> WorkflowHandle {
        WorkflowHandle::new(self.engine.clone(), workflow_id.into())
    }
}

impl std::fmt::Debug for WorkflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowClient").finish_non_exhaustive()
    }
}
