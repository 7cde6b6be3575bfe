//! Workflow commands produced by a workflow task

use crate::workflow::event::{EventType, ReplayEvent};
use crate::workflow::update::RejectionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A command emitted by workflow code during one workflow task.
///
/// The runtime persists every command except [`WorkflowCommand::RejectUpdate`]
/// as the history event returned by [`WorkflowCommand::event_type`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowCommand {
    /// Record the result of a side effect
    RecordOperation {
        sequence_number: i32,
        operation_name: String,
        result: Value,
    },

    /// Set a durable state key
    SetState {
        sequence_number: i32,
        key: String,
        value: Value,
    },

    /// Clear a durable state key
    ClearState { sequence_number: i32, key: String },

    /// Schedule a task for execution
    ScheduleTask {
        sequence_number: i32,
        task_execution_id: String,
        kind: String,
        input: Value,
    },

    /// Start a durable timer
    StartTimer {
        sequence_number: i32,
        timer_id: String,
        duration_ms: i64,
    },

    /// An update passed validation and was applied at `yield_point`
    AcceptUpdate {
        sequence_number: i32,
        update_id: String,
        update_name: String,
        args: Value,
        yield_point: u32,
    },

    /// An accepted update's handler returned a result
    CompleteUpdate {
        sequence_number: i32,
        update_id: String,
        result: Value,
    },

    /// An accepted update's handler failed
    FailUpdate {
        sequence_number: i32,
        update_id: String,
        error: String,
    },

    /// An update was refused at admission; never written to history
    RejectUpdate {
        sequence_number: i32,
        update_id: String,
        update_name: String,
        kind: RejectionKind,
        reason: String,
    },

    /// The workflow function returned successfully
    CompleteWorkflow { sequence_number: i32, output: Value },

    /// The workflow function failed
    FailWorkflow {
        sequence_number: i32,
        error: String,
        stack_trace: String,
        failure_type: Option<String>,
    },

    /// The workflow is blocked until new history arrives
    SuspendWorkflow { sequence_number: i32, reason: String },

    /// The workflow acknowledged a cancellation request
    CancelWorkflow { sequence_number: i32, reason: String },
}

impl WorkflowCommand {
    /// Sequence number assigned when the command was recorded
    pub fn sequence_number(&self) -> i32 {
        match self {
            Self::RecordOperation {
                sequence_number, ..
            }
            | Self::SetState {
                sequence_number, ..
            }
            | Self::ClearState {
                sequence_number, ..
            }
            | Self::ScheduleTask {
                sequence_number, ..
            }
            | Self::StartTimer {
                sequence_number, ..
            }
            | Self::AcceptUpdate {
                sequence_number, ..
            }
            | Self::CompleteUpdate {
                sequence_number, ..
            }
            | Self::FailUpdate {
                sequence_number, ..
            }
            | Self::RejectUpdate {
                sequence_number, ..
            }
            | Self::CompleteWorkflow {
                sequence_number, ..
            }
            | Self::FailWorkflow {
                sequence_number, ..
            }
            | Self::SuspendWorkflow {
                sequence_number, ..
            }
            | Self::CancelWorkflow {
                sequence_number, ..
            } => *sequence_number,
        }
    }

    /// Command type name, for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RecordOperation { .. } => "RECORD_OPERATION",
            Self::SetState { .. } => "SET_STATE",
            Self::ClearState { .. } => "CLEAR_STATE",
            Self::ScheduleTask { .. } => "SCHEDULE_TASK",
            Self::StartTimer { .. } => "START_TIMER",
            Self::AcceptUpdate { .. } => "ACCEPT_UPDATE",
            Self::CompleteUpdate { .. } => "COMPLETE_UPDATE",
            Self::FailUpdate { .. } => "FAIL_UPDATE",
            Self::RejectUpdate { .. } => "REJECT_UPDATE",
            Self::CompleteWorkflow { .. } => "COMPLETE_WORKFLOW",
            Self::FailWorkflow { .. } => "FAIL_WORKFLOW",
            Self::SuspendWorkflow { .. } => "SUSPEND_WORKFLOW",
            Self::CancelWorkflow { .. } => "CANCEL_WORKFLOW",
        }
    }

    /// The history event this command becomes once persisted
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Self::RecordOperation { .. } => Some(EventType::OperationCompleted),
            Self::SetState { .. } => Some(EventType::StateSet),
            Self::ClearState { .. } => Some(EventType::StateCleared),
            Self::ScheduleTask { .. } => Some(EventType::TaskScheduled),
            Self::StartTimer { .. } => Some(EventType::TimerStarted),
            Self::AcceptUpdate { .. } => Some(EventType::UpdateAccepted),
            Self::CompleteUpdate { .. } => Some(EventType::UpdateCompleted),
            Self::FailUpdate { .. } => Some(EventType::UpdateFailed),
            Self::RejectUpdate { .. } => None,
            Self::CompleteWorkflow { .. } => Some(EventType::WorkflowCompleted),
            Self::FailWorkflow { .. } => Some(EventType::WorkflowExecutionFailed),
            Self::SuspendWorkflow { .. } => Some(EventType::WorkflowSuspended),
            Self::CancelWorkflow { .. } => Some(EventType::WorkflowCancelled),
        }
    }

    /// Whether this command closes the workflow execution
    pub fn is_terminal(&self) -> bool {
        self.event_type()
            .map(|t| t.is_workflow_terminal())
            .unwrap_or(false)
    }

    /// Convert into the history event it represents.
    ///
    /// Returns `None` for commands that are not persisted.
    pub fn to_event(&self, sequence_number: i32, timestamp: DateTime<Utc>) -> Option<ReplayEvent> {
        let event_type = self.event_type()?;
        let data = match self {
            Self::RecordOperation {
                operation_name,
                result,
                ..
            } => json!({"operationName": operation_name, "result": result}),
            Self::SetState { key, value, .. } => json!({"key": key, "value": value}),
            Self::ClearState { key, .. } => json!({"key": key}),
            Self::ScheduleTask {
                task_execution_id,
                kind,
                input,
                ..
            } => json!({"taskExecutionId": task_execution_id, "kind": kind, "input": input}),
            Self::StartTimer {
                timer_id,
                duration_ms,
                ..
            } => json!({"timerId": timer_id, "durationMs": duration_ms}),
            Self::AcceptUpdate {
                update_id,
                update_name,
                args,
                yield_point,
                ..
            } => json!({
                "updateId": update_id,
                "updateName": update_name,
                "args": args,
                "yieldPoint": yield_point
            }),
            Self::CompleteUpdate {
                update_id, result, ..
            } => json!({"updateId": update_id, "result": result}),
            Self::FailUpdate {
                update_id, error, ..
            } => json!({"updateId": update_id, "error": error}),
            Self::RejectUpdate { .. } => return None,
            Self::CompleteWorkflow { output, .. } => json!({"output": output}),
            Self::FailWorkflow {
                error,
                failure_type,
                ..
            } => json!({"error": error, "failureType": failure_type}),
            Self::SuspendWorkflow { reason, .. } => json!({"reason": reason}),
            Self::CancelWorkflow { reason, .. } => json!({"reason": reason}),
        };
        Some(ReplayEvent::new(sequence_number, event_type, data, timestamp))
    }
}
