//! WorkflowRegistry - workflow kinds known to the engine

use crate::error::{CairnError, Result};
use crate::workflow::context::WorkflowContext;
use crate::workflow::definition::WorkflowDefinition;
use cairn_core::WorkflowMetadata;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type-erased workflow body
pub type BoxedWorkflowFn = Box<
    dyn Fn(
            Arc<dyn WorkflowContext + Send + Sync>,
            Value,
        ) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>>
        + Send
        + Sync,
>;

/// A workflow kind with its metadata and body
pub struct RegisteredWorkflow {
    pub metadata: WorkflowMetadata,
    execute_fn: BoxedWorkflowFn,
}

impl RegisteredWorkflow {
    pub fn new(metadata: WorkflowMetadata, execute_fn: BoxedWorkflowFn) -> Self {
        Self {
            metadata,
            execute_fn,
        }
    }

    /// Run the workflow body once
    pub async fn execute(
        &self,
        ctx: Arc<dyn WorkflowContext + Send + Sync>,
        input: Value,
    ) -> Result<Value> {
        (self.execute_fn)(ctx, input).await
    }
}

impl std::fmt::Debug for RegisteredWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredWorkflow")
            .field("kind", &self.metadata.kind)
            .finish_non_exhaustive()
    }
}

/// Registry of workflow kinds. Kinds are unique.
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<String, Arc<RegisteredWorkflow>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prepared workflow. Fails if the kind is taken.
    pub fn register_raw(&self, workflow: RegisteredWorkflow) -> Result<()> {
        let mut workflows = self.workflows.write();
        let kind = workflow.metadata.kind.clone();
        if workflows.contains_key(&kind) {
            return Err(CairnError::InvalidConfiguration(format!(
                "Workflow kind '{}' is already registered",
                kind
            )));
        }
        workflows.insert(kind, Arc::new(workflow));
        Ok(())
    }

    /// Register a typed workflow definition.
    ///
    /// ```ignore
    /// registry.register(UpdateWorkflow)?;
    /// ```
    pub fn register<W>(&self, workflow: W) -> Result<()>
    where
        W: WorkflowDefinition + 'static,
        W::Input: Serialize + DeserializeOwned + Send + 'static,
        W::Output: Serialize + DeserializeOwned + Send + 'static,
    {
        let metadata = workflow.metadata();
        let workflow = Arc::new(workflow);

        let execute_fn: BoxedWorkflowFn = Box::new(move |ctx, input| {
            let workflow = Arc::clone(&workflow);
            Box::pin(async move {
                let input: W::Input = serde_json::from_value(input)
                    .map_err(|e| CairnError::InvalidInput(e.to_string()))?;
                let output = workflow.execute(ctx.as_ref(), input).await?;
                Ok(serde_json::to_value(output)?)
            })
        });

        self.register_raw(RegisteredWorkflow::new(metadata, execute_fn))
    }

    /// Register a closure as a workflow of the given kind
    pub fn register_simple<F, Fut>(&self, kind: &str, execute_fn: F) -> Result<()>
    where
        F: Fn(Arc<dyn WorkflowContext + Send + Sync>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let boxed: BoxedWorkflowFn = Box::new(move |ctx, input| Box::pin(execute_fn(ctx, input)));
        self.register_raw(RegisteredWorkflow::new(WorkflowMetadata::new(kind), boxed))
    }

    pub fn get(&self, kind: &str) -> Option<Arc<RegisteredWorkflow>> {
        self.workflows.read().get(kind).cloned()
    }

    pub fn has(&self, kind: &str) -> bool {
        self.workflows.read().contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn get_registered_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.workflows.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn get_all_metadata(&self) -> Vec<WorkflowMetadata> {
        self.workflows
            .read()
            .values()
            .map(|w| w.metadata.clone())
            .collect()
    }
}
