//! WorkflowExecutor - runs one workflow task with deterministic replay

use crate::error::{CairnError, Result};
use crate::workflow::command::WorkflowCommand;
use crate::workflow::context::WorkflowContext;
use crate::workflow::context_impl::WorkflowContextImpl;
use crate::workflow::event::{EventType, ReplayEvent};
use crate::workflow::recorder::{CommandCollector, CommandRecorder, ValidatingCommandRecorder};
use cairn_core::{DeterminismValidator, UpdateRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Status of a workflow execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    /// Workflow task is queued or executing
    Running,
    Completed,
    /// Blocked until new history arrives
    Suspended,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Result of a workflow task execution
#[derive(Debug, Clone)]
pub struct WorkflowTaskResult {
    /// Commands generated during execution, terminal command last
    pub commands: Vec<WorkflowCommand>,
    pub status: WorkflowStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub stack_trace: Option<String>,
    pub failure_type: Option<String>,
    /// IDs of updates accepted or rejected during this task
    pub delivered_updates: Vec<String>,
}

impl WorkflowTaskResult {
    fn with_status(commands: Vec<WorkflowCommand>, status: WorkflowStatus) -> Self {
        Self {
            commands,
            status,
            output: None,
            error: None,
            stack_trace: None,
            failure_type: None,
            delivered_updates: Vec::new(),
        }
    }

    pub fn completed(commands: Vec<WorkflowCommand>, output: Value) -> Self {
        Self {
            output: Some(output),
            ..Self::with_status(commands, WorkflowStatus::Completed)
        }
    }

    pub fn suspended(commands: Vec<WorkflowCommand>) -> Self {
        Self::with_status(commands, WorkflowStatus::Suspended)
    }

    pub fn failed(
        commands: Vec<WorkflowCommand>,
        error: String,
        stack_trace: Option<String>,
        failure_type: &str,
    ) -> Self {
        Self {
            error: Some(error),
            stack_trace,
            failure_type: Some(failure_type.to_string()),
            ..Self::with_status(commands, WorkflowStatus::Failed)
        }
    }

    pub fn cancelled(commands: Vec<WorkflowCommand>, reason: String) -> Self {
        Self {
            error: Some(reason),
            ..Self::with_status(commands, WorkflowStatus::Cancelled)
        }
    }
}

/// Per-task execution settings
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Check replayed calls against history
    pub enable_determinism_validation: bool,
    /// Starting value of `current_time_millis`, the WORKFLOW_STARTED
    /// timestamp by default. Replay moves the clock forward from there.
    pub workflow_task_time: Option<i64>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            enable_determinism_validation: true,
            workflow_task_time: None,
        }
    }
}

/// Executes one workflow task: replays history, delivers queued updates and
/// turns the workflow function's result into commands.
pub struct WorkflowExecutor {
    workflow_id: String,
    workflow_execution_id: Uuid,
    input: Value,
    existing_events: Vec<ReplayEvent>,
    pending_updates: Vec<UpdateRequest>,
    options: ExecutionOptions,
}

impl WorkflowExecutor {
    pub fn new(
        workflow_id: impl Into<String>,
        workflow_execution_id: Uuid,
        input: Value,
        existing_events: Vec<ReplayEvent>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            workflow_execution_id,
            input,
            existing_events,
            pending_updates: Vec::new(),
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    /// Updates to deliver at this task's yield points
    pub fn with_pending_updates(mut self, updates: Vec<UpdateRequest>) -> Self {
        self.pending_updates = updates;
        self
    }

    fn has_terminal_event(&self, event_type: EventType) -> bool {
        self.existing_events
            .iter()
            .any(|e| e.event_type() == event_type)
    }

    fn last_event(&self) -> Option<&ReplayEvent> {
        self.existing_events.last()
    }

    fn task_time(&self) -> i64 {
        self.options.workflow_task_time.unwrap_or_else(|| {
            self.existing_events
                .first()
                .map(|e| e.timestamp().timestamp_millis())
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
        })
    }

    /// Execute the workflow function against this task's history.
    ///
    /// The recorder validates replayed calls unless validation is disabled.
    pub async fn execute<F, Fut>(&self, workflow_fn: F) -> WorkflowTaskResult
    where
        F: FnOnce(Arc<dyn WorkflowContext + Send + Sync>, Value) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if self.options.enable_determinism_validation {
            let recorder = ValidatingCommandRecorder::new(DeterminismValidator::new());
            self.run(recorder, workflow_fn).await
        } else {
            self.run(CommandCollector::new(), workflow_fn).await
        }
    }

    async fn run<R, F, Fut>(&self, recorder: R, workflow_fn: F) -> WorkflowTaskResult
    where
        R: CommandRecorder + 'static,
        F: FnOnce(Arc<dyn WorkflowContext + Send + Sync>, Value) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let ctx = Arc::new(
            WorkflowContextImpl::new(
                self.workflow_id.clone(),
                self.workflow_execution_id,
                self.input.clone(),
                recorder,
                self.existing_events.clone(),
                self.task_time(),
            )
            .with_pending_updates(self.pending_updates.clone()),
        );

        let dyn_ctx: Arc<dyn WorkflowContext + Send + Sync> = ctx.clone();
        let result = workflow_fn(dyn_ctx, self.input.clone()).await;

        let mut task_result = self.handle_result(ctx.take_commands(), result);
        task_result.delivered_updates = ctx.delivered_updates();
        task_result
    }

    fn handle_result(
        &self,
        mut commands: Vec<WorkflowCommand>,
        result: Result<Value>,
    ) -> WorkflowTaskResult {
        let next_sequence = (self.existing_events.len() + commands.len()) as i32 + 1;

        match result {
            Ok(output) => {
                if !self.has_terminal_event(EventType::WorkflowCompleted) {
                    commands.push(WorkflowCommand::CompleteWorkflow {
                        sequence_number: next_sequence,
                        output: output.clone(),
                    });
                }
                debug!(workflow_id = %self.workflow_id, "Workflow completed");
                WorkflowTaskResult::completed(commands, output)
            }

            Err(CairnError::Suspended { reason }) => {
                let last_is_suspended = self
                    .last_event()
                    .map(|e| e.event_type() == EventType::WorkflowSuspended)
                    .unwrap_or(false);
                let produced_history = commands.iter().any(|c| c.event_type().is_some());

                if produced_history || !last_is_suspended {
                    commands.push(WorkflowCommand::SuspendWorkflow {
                        sequence_number: next_sequence,
                        reason: reason.clone(),
                    });
                }
                debug!(workflow_id = %self.workflow_id, reason = %reason, "Workflow suspended");
                WorkflowTaskResult::suspended(commands)
            }

            Err(CairnError::WorkflowCancelled(reason)) => {
                commands.push(WorkflowCommand::CancelWorkflow {
                    sequence_number: next_sequence,
                    reason: reason.clone(),
                });
                debug!(workflow_id = %self.workflow_id, reason = %reason, "Workflow cancelled");
                WorkflowTaskResult::cancelled(commands, reason)
            }

            Err(e) => {
                let error_msg = e.to_string();
                let failure_type = classify_error(&e);
                warn!(
                    workflow_id = %self.workflow_id,
                    failure_type = failure_type,
                    error = %error_msg,
                    "Workflow failed"
                );
                commands.push(WorkflowCommand::FailWorkflow {
                    sequence_number: next_sequence,
                    error: error_msg.clone(),
                    stack_trace: String::new(),
                    failure_type: Some(failure_type.to_string()),
                });
                WorkflowTaskResult::failed(commands, error_msg, None, failure_type)
            }
        }
    }
}

/// Classify an error to determine retry behavior
pub fn classify_error(error: &CairnError) -> &'static str {
    match error {
        CairnError::NonRetryable(_)
        | CairnError::InvalidConfiguration(_)
        | CairnError::InvalidInput(_)
        | CairnError::WorkflowNotFound(_)
        | CairnError::TaskNotFound(_) => "NON_RETRYABLE",
        CairnError::DeterminismViolation(_) => "DETERMINISM_VIOLATION",
        CairnError::Storage(_) | CairnError::Timeout(_) | CairnError::Serialization(_) => {
            "TRANSIENT"
        }
        _ => "UNKNOWN",
    }
}
