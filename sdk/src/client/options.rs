//! Options for client calls

/// Options for starting a workflow
#[derive(Debug, Clone, Default)]
pub struct StartWorkflowOptions {
    /// Business identifier of the execution. Generated when `None`.
    pub workflow_id: Option<String>,
}

impl StartWorkflowOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the workflow ID
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }
}

/// Options for sending an update
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Identity of the update. Requests that share it resolve to the same
    /// outcome. Generated when `None`.
    pub update_id: Option<String>,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_update_id(mut self, update_id: impl Into<String>) -> Self {
        self.update_id = Some(update_id.into());
        self
    }
}
