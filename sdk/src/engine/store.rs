//! History storage for workflow executions

use crate::error::{CairnError, Result};
use crate::worker::executor::WorkflowStatus;
use crate::workflow::event::ReplayEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Descriptive row of one workflow execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub workflow_execution_id: Uuid,
    pub workflow_id: String,
    pub kind: String,
    pub input: Value,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn new(workflow_id: impl Into<String>, kind: impl Into<String>, input: Value) -> Self {
        let now = Utc::now();
        Self {
            workflow_execution_id: Uuid::new_v4(),
            workflow_id: workflow_id.into(),
            kind: kind.into(),
            input,
            status: WorkflowStatus::Running,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Durable storage of execution records and their event histories.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Create an execution with its first history event.
    ///
    /// Fails with `WorkflowAlreadyStarted` while another execution with the
    /// same workflow ID is open.
    async fn create_execution(&self, record: ExecutionRecord, first: ReplayEvent) -> Result<()>;

    async fn get_execution(&self, workflow_execution_id: Uuid) -> Result<Option<ExecutionRecord>>;

    /// Most recent execution for a workflow ID
    async fn find_execution(&self, workflow_id: &str) -> Result<Option<ExecutionRecord>>;

    async fn list_open_executions(&self) -> Result<Vec<ExecutionRecord>>;

    /// Append events atomically, assigning consecutive sequence numbers.
    /// Returns the events as stored.
    ///
    /// Fails with `WorkflowClosed` once the execution has closed.
    async fn append_events(
        &self,
        workflow_execution_id: Uuid,
        events: Vec<ReplayEvent>,
    ) -> Result<Vec<ReplayEvent>>;

    async fn load_history(&self, workflow_execution_id: Uuid) -> Result<Vec<ReplayEvent>>;

    /// A closed execution only accepts its own terminal status again.
    async fn set_status(&self, workflow_execution_id: Uuid, status: WorkflowStatus) -> Result<()>;
}

struct StoredExecution {
    record: ExecutionRecord,
    events: Vec<ReplayEvent>,
}

impl StoredExecution {
    /// Closed once either the status or the last event says so
    fn is_closed(&self) -> bool {
        self.record.status.is_terminal()
            || self
                .events
                .last()
                .is_some_and(|e| e.event_type().is_workflow_terminal())
    }
}

/// [`HistoryStore`] kept in process memory
#[derive(Default)]
pub struct InMemoryHistoryStore {
    executions: RwLock<HashMap<Uuid, StoredExecution>>,
    latest: RwLock<HashMap<String, Uuid>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(id: Uuid) -> CairnError {
        CairnError::WorkflowNotFound(format!("execution {}", id))
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn create_execution(&self, record: ExecutionRecord, first: ReplayEvent) -> Result<()> {
        let mut latest = self.latest.write();
        let mut executions = self.executions.write();

        if let Some(existing) = latest.get(&record.workflow_id).and_then(|id| executions.get(id)) {
            if !existing.is_closed() {
                return Err(CairnError::WorkflowAlreadyStarted(record.workflow_id));
            }
        }

        latest.insert(record.workflow_id.clone(), record.workflow_execution_id);
        executions.insert(
            record.workflow_execution_id,
            StoredExecution {
                record,
                events: vec![first.with_sequence_number(1)],
            },
        );
        Ok(())
    }

    async fn get_execution(&self, workflow_execution_id: Uuid) -> Result<Option<ExecutionRecord>> {
        Ok(self
            .executions
            .read()
            .get(&workflow_execution_id)
            .map(|e| e.record.clone()))
    }

    async fn find_execution(&self, workflow_id: &str) -> Result<Option<ExecutionRecord>> {
        let id = match self.latest.read().get(workflow_id) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.get_execution(id).await
    }

    async fn list_open_executions(&self) -> Result<Vec<ExecutionRecord>> {
        let mut open: Vec<ExecutionRecord> = self
            .executions
            .read()
            .values()
            .filter(|e| !e.is_closed())
            .map(|e| e.record.clone())
            .collect();
        open.sort_by_key(|r| r.created_at);
        Ok(open)
    }

    async fn append_events(
        &self,
        workflow_execution_id: Uuid,
        events: Vec<ReplayEvent>,
    ) -> Result<Vec<ReplayEvent>> {
        let mut executions = self.executions.write();
        let stored = executions
            .get_mut(&workflow_execution_id)
            .ok_or_else(|| Self::not_found(workflow_execution_id))?;
        if stored.is_closed() {
            return Err(CairnError::WorkflowClosed(stored.record.workflow_id.clone()));
        }

        let mut next = stored.events.len() as i32 + 1;
        let mut appended = Vec::with_capacity(events.len());
        for event in events {
            let event = event.with_sequence_number(next);
            next += 1;
            appended.push(event.clone());
            stored.events.push(event);
        }
        stored.record.updated_at = Utc::now();
        Ok(appended)
    }

    async fn load_history(&self, workflow_execution_id: Uuid) -> Result<Vec<ReplayEvent>> {
        self.executions
            .read()
            .get(&workflow_execution_id)
            .map(|e| e.events.clone())
            .ok_or_else(|| Self::not_found(workflow_execution_id))
    }

    async fn set_status(&self, workflow_execution_id: Uuid, status: WorkflowStatus) -> Result<()> {
        let mut executions = self.executions.write();
        let stored = executions
            .get_mut(&workflow_execution_id)
            .ok_or_else(|| Self::not_found(workflow_execution_id))?;

        let current = stored.record.status;
        let allowed = if current.is_terminal() {
            status == current
        } else {
            !stored.is_closed() || status.is_terminal()
        };
        if !allowed {
            return Err(CairnError::WorkflowClosed(stored.record.workflow_id.clone()));
        }
        stored.record.status = status;
        stored.record.updated_at = Utc::now();
        Ok(())
    }
}
