//! Workflow event types for replay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event types that can be recorded in a workflow execution's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Workflow lifecycle events
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowExecutionFailed,
    WorkflowSuspended,
    WorkflowCancelled,
    CancellationRequested,

    // Operation events
    OperationCompleted,

    // State events
    StateSet,
    StateCleared,

    // Task events
    TaskScheduled,
    TaskCompleted,
    TaskFailed,

    // Timer events
    TimerStarted,
    TimerFired,

    // Signal events
    SignalReceived,

    // Update events
    UpdateAccepted,
    UpdateCompleted,
    UpdateFailed,
}

impl EventType {
    /// Completed, failed or cancelled
    pub fn is_workflow_terminal(&self) -> bool {
        matches!(
            self,
            Self::WorkflowCompleted | Self::WorkflowExecutionFailed | Self::WorkflowCancelled
        )
    }

    pub fn is_task_terminal(&self) -> bool {
        matches!(self, Self::TaskCompleted | Self::TaskFailed)
    }

    pub fn is_update_terminal(&self) -> bool {
        matches!(self, Self::UpdateCompleted | Self::UpdateFailed)
    }

    /// Produced from a workflow command rather than by the engine.
    /// Suspension markers depend on task boundaries and are excluded.
    pub fn is_command_generated(&self) -> bool {
        matches!(
            self,
            Self::OperationCompleted
                | Self::StateSet
                | Self::StateCleared
                | Self::TaskScheduled
                | Self::TimerStarted
                | Self::UpdateAccepted
                | Self::UpdateCompleted
                | Self::UpdateFailed
                | Self::WorkflowCompleted
                | Self::WorkflowExecutionFailed
                | Self::WorkflowCancelled
        )
    }

    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowStarted => "WORKFLOW_STARTED",
            Self::WorkflowCompleted => "WORKFLOW_COMPLETED",
            Self::WorkflowExecutionFailed => "WORKFLOW_EXECUTION_FAILED",
            Self::WorkflowSuspended => "WORKFLOW_SUSPENDED",
            Self::WorkflowCancelled => "WORKFLOW_CANCELLED",
            Self::CancellationRequested => "CANCELLATION_REQUESTED",
            Self::OperationCompleted => "OPERATION_COMPLETED",
            Self::StateSet => "STATE_SET",
            Self::StateCleared => "STATE_CLEARED",
            Self::TaskScheduled => "TASK_SCHEDULED",
            Self::TaskCompleted => "TASK_COMPLETED",
            Self::TaskFailed => "TASK_FAILED",
            Self::TimerStarted => "TIMER_STARTED",
            Self::TimerFired => "TIMER_FIRED",
            Self::SignalReceived => "SIGNAL_RECEIVED",
            Self::UpdateAccepted => "UPDATE_ACCEPTED",
            Self::UpdateCompleted => "UPDATE_COMPLETED",
            Self::UpdateFailed => "UPDATE_FAILED",
        }
    }
}

/// One entry of an execution's append-only history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    /// Sequence number of this event (1-indexed)
    #[serde(rename = "sequenceNumber")]
    sequence_number: i32,

    #[serde(rename = "type")]
    event_type: EventType,

    /// Event data (varies by event type)
    data: Value,

    #[serde(rename = "timestamp")]
    timestamp: DateTime<Utc>,
}

impl ReplayEvent {
    pub fn new(
        sequence_number: i32,
        event_type: EventType,
        data: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sequence_number,
            event_type,
            data,
            timestamp,
        }
    }

    pub fn sequence_number(&self) -> i32 {
        self.sequence_number
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// String field of the event data; `None` if absent or not a string
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|v| v.as_i64())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Re-number the event. Used by stores when appending.
    pub fn with_sequence_number(mut self, sequence_number: i32) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    fn with_field(mut self, key: &str, value: Value) -> Self {
        if let Value::Object(ref mut map) = self.data {
            map.insert(key.to_string(), value);
        }
        self
    }

    /// Set the operation name in the event data
    pub fn with_operation_name(self, name: String) -> Self {
        self.with_field("operationName", Value::String(name))
    }

    /// Set the result in the event data
    pub fn with_result(self, result: Value) -> Self {
        self.with_field("result", result)
    }

    /// Set the timer ID in the event data
    pub fn with_timer_id(self, timer_id: String) -> Self {
        self.with_field("timerId", Value::String(timer_id))
    }

    /// Set the update ID in the event data
    pub fn with_update_id(self, update_id: String) -> Self {
        self.with_field("updateId", Value::String(update_id))
    }

    /// Set the error in the event data
    pub fn with_error(self, error: String) -> Self {
        self.with_field("error", Value::String(error))
    }
}
