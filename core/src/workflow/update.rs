//! Update protocol types
//!
//! An update is a request to mutate a running workflow and get a result back.
//! It goes through admission (queued on the execution), validation (the
//! workflow's validator may refuse it) and execution (the handler runs and its
//! outcome is recorded). Only accepted updates are written to history.

use crate::workflow::event::{EventType, ReplayEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A client request to run an update against a workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// Caller-supplied or generated identifier, unique per execution
    pub update_id: String,
    /// Update name, matched against the workflow's registered handlers
    pub name: String,
    /// Serialized update arguments
    pub args: Value,
    /// When the request was admitted
    pub requested_at: DateTime<Utc>,
}

impl UpdateRequest {
    /// Create a request stamped with the current time
    pub fn new(update_id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            update_id: update_id.into(),
            name: name.into(),
            args,
            requested_at: Utc::now(),
        }
    }
}

/// Why an update never ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    /// No handler is registered under the update's name
    UnknownUpdate,
    /// The handler's validator refused the arguments
    ValidationFailed,
    /// Still queued when the workflow closed
    ClosedBeforeDelivery,
    /// Sent to a workflow that had already closed
    WorkflowClosed,
}

/// Final outcome of an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateOutcome {
    /// Handler returned a result
    Completed(Value),
    /// Handler ran and failed
    Failed(String),
    Rejected { kind: RejectionKind, reason: String },
}

impl UpdateOutcome {
    pub fn rejected(kind: RejectionKind, reason: impl Into<String>) -> Self {
        Self::Rejected {
            kind,
            reason: reason.into(),
        }
    }

    /// Whether the update passed validation
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    /// Short label used in logs and mismatch reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::Rejected { .. } => "rejected",
        }
    }

    /// Build the outcome recorded by an UpdateCompleted/UpdateFailed event
    pub fn from_event(event: &ReplayEvent) -> Option<Self> {
        match event.event_type() {
            EventType::UpdateCompleted => Some(Self::Completed(
                event.get("result").cloned().unwrap_or(Value::Null),
            )),
            EventType::UpdateFailed => Some(Self::Failed(
                event.get_string("error").unwrap_or("Update failed").to_string(),
            )),
            _ => None,
        }
    }
}

/// How far an update has progressed. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateStage {
    /// Queued on the execution, not yet delivered
    Admitted,
    /// Passed validation and recorded in history
    Accepted,
    /// Outcome known (completed, failed or rejected)
    Completed,
}

impl UpdateStage {
    /// Move to `next` unless that would go backwards
    pub fn advance(self, next: UpdateStage) -> UpdateStage {
        self.max(next)
    }
}
