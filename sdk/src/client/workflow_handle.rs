//! WorkflowHandle - operations on one workflow

use crate::client::options::UpdateOptions;
use crate::client::update_handle::UpdateHandle;
use crate::engine::{ExecutionRecord, WorkflowEngine};
use crate::error::Result;
use crate::payload::Payload;
use crate::workflow::event::ReplayEvent;
use crate::workflow::update::UpdateDefinition;
use cairn_core::UpdateRequest;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Handle to a workflow, addressed by workflow ID.
#[derive(Clone)]
pub struct WorkflowHandle {
    engine: WorkflowEngine,
    workflow_id: String,
    update_timeout: Duration,
}

impl WorkflowHandle {
    pub(crate) fn new(engine: WorkflowEngine, workflow_id: String) -> Self {
        let update_timeout = engine.config().update_timeout;
        Self {
            engine,
            workflow_id,
            update_timeout,
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Override how long update results are awaited
    pub fn with_update_timeout(mut self, timeout: Duration) -> Self {
        self.update_timeout = timeout;
        self
    }

    /// Send an update and wait for its result.
    ///
    /// Fails with `UpdateRejected` when the validator refuses the argument,
    /// `UpdateFailed` when the handler errors and `UnknownUpdate` when the
    /// workflow has no handler for the name.
    pub async fn execute_update<I, O>(&self, definition: &UpdateDefinition<I, O>, args: I) -> Result<O>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        self.start_update(definition, args, UpdateOptions::default())
            .await?
            .result()
            .await
    }

    pub async fn execute_update_raw(&self, name: &str, args: Value) -> Result<Value> {
        self.start_update_raw(name, args, UpdateOptions::default())
            .await?
            .result_raw()
            .await
    }

    /// Send an update and return once the engine has admitted it
    pub async fn start_update<I, O>(
        &self,
        definition: &UpdateDefinition<I, O>,
        args: I,
        options: UpdateOptions,
    ) -> Result<UpdateHandle<O>>
    where
        I: Serialize,
    {
        let args = serde_json::to_value(args)?;
        self.admit(definition.name(), args, options).await
    }

    pub async fn start_update_raw(
        &self,
        name: &str,
        args: Value,
        options: UpdateOptions,
    ) -> Result<UpdateHandle<Value>> {
        self.admit(name, args, options).await
    }

    async fn admit<O>(
        &self,
        name: &str,
        args: Value,
        options: UpdateOptions,
    ) -> Result<UpdateHandle<O>> {
        let update_id = options
            .update_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let outcome_rx = self
            .engine
            .request_update(
                &self.workflow_id,
                UpdateRequest::new(update_id.clone(), name, args),
            )
            .await?;
        Ok(UpdateHandle::new(
            update_id,
            name.to_string(),
            self.update_timeout,
            outcome_rx,
        ))
    }

    pub async fn signal<T: Serialize>(&self, name: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.engine
            .signal_workflow(&self.workflow_id, name, value)
            .await
    }

    pub async fn cancel(&self, reason: &str) -> Result<()> {
        self.engine.cancel_workflow(&self.workflow_id, reason).await
    }

    /// Wait for the workflow to close and deserialize its output
    pub async fn result<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.result_raw().await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn result_raw(&self) -> Result<Value> {
        self.engine.await_result(&self.workflow_id).await
    }

    /// Wait for the output as an encoded payload; plain JSON output comes
    /// back as a `json/plain` payload.
    pub async fn result_payload(&self) -> Result<Payload> {
        Payload::from_value(&self.result_raw().await?)
    }

    pub async fn describe(&self) -> Result<ExecutionRecord> {
        self.engine.describe(&self.workflow_id).await
    }

    pub async fn history(&self) -> Result<Vec<ReplayEvent>> {
        self.engine.history(&self.workflow_id).await
    }
}

impl std::fmt::Debug for WorkflowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowHandle")
            .field("workflow_id", &self.workflow_id)
            .finish()
    }
}
