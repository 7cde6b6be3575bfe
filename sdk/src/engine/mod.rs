//! In-process durable runtime
//!
//! The engine owns workflow executions end to end. It persists history through a
//! [`HistoryStore`], dispatches workflow tasks (one at a time per execution),
//! runs tasks with retries, fires timers and routes updates to their callers.
//!
//! A fresh engine over the same store picks up where a stopped one left off,
//! see [`WorkflowEngine::recover`].

pub mod store;

pub use store::{ExecutionRecord, HistoryStore, InMemoryHistoryStore};

use crate::client::StartWorkflowOptions;
use crate::config::EngineConfig;
use crate::error::{CairnError, Result};
use crate::task::context_impl::TaskContextImpl;
use crate::task::registry::TaskRegistry;
use crate::worker::executor::{
    ExecutionOptions, WorkflowExecutor, WorkflowStatus, WorkflowTaskResult,
};
use crate::worker::registry::WorkflowRegistry;
use crate::workflow::command::WorkflowCommand;
use crate::workflow::event::{EventType, ReplayEvent};
use cairn_core::{
    calculate_backoff, should_retry, BackoffConfig, EventLookup, RejectionKind,
    TaskExecutionResult, UpdateOutcome, UpdateRequest, UpdateStage,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Reason given to updates still queued when their workflow closes
pub const CLOSED_BEFORE_DELIVERY: &str = "workflow completed before update was delivered";

/// Reason given to updates sent to a closed workflow
pub const WORKFLOW_CLOSED: &str = "workflow is closed";

struct UpdateEntry {
    name: String,
    stage: UpdateStage,
    outcome: Option<UpdateOutcome>,
    waiters: Vec<oneshot::Sender<UpdateOutcome>>,
}

impl UpdateEntry {
    fn admitted(name: String, waiter: oneshot::Sender<UpdateOutcome>) -> Self {
        Self {
            name,
            stage: UpdateStage::Admitted,
            outcome: None,
            waiters: vec![waiter],
        }
    }

    fn resolve(&mut self, outcome: UpdateOutcome) {
        self.stage = self.stage.advance(UpdateStage::Completed);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
        self.outcome = Some(outcome);
    }
}

/// Runtime state of one execution
struct ExecutionSlot {
    record: ExecutionRecord,
    /// Serialises workflow tasks of this execution
    task_lock: tokio::sync::Mutex<()>,
    /// Set while a workflow task is waiting in the dispatcher queue
    queued: AtomicBool,
    /// Admitted updates not yet delivered to the workflow
    inbox: Mutex<Vec<UpdateRequest>>,
    updates: Mutex<HashMap<String, UpdateEntry>>,
    status: watch::Sender<WorkflowStatus>,
    /// Cancellation requested or execution closed; shared with task contexts
    cancelled: Arc<AtomicBool>,
    /// Serialises cancellation requests
    cancel_lock: tokio::sync::Mutex<()>,
    /// Timer and task IDs with a live runner
    active: Mutex<HashSet<String>>,
}

impl ExecutionSlot {
    fn from_history(record: ExecutionRecord, history: &[ReplayEvent]) -> Self {
        let mut updates = HashMap::new();
        for accepted in history
            .iter()
            .filter(|e| e.event_type() == EventType::UpdateAccepted)
        {
            let Some(update_id) = accepted.get_string("updateId") else {
                continue;
            };
            let outcome = EventLookup::find_update_outcome(history, update_id)
                .and_then(UpdateOutcome::from_event);
            let stage = if outcome.is_some() {
                UpdateStage::Completed
            } else {
                UpdateStage::Accepted
            };
            updates.insert(
                update_id.to_string(),
                UpdateEntry {
                    name: accepted.get_string("updateName").unwrap_or_default().to_string(),
                    stage,
                    outcome,
                    waiters: Vec::new(),
                },
            );
        }

        // History may already be closed while the record still lags behind
        let status = history
            .last()
            .and_then(|e| closed_status(e.event_type()))
            .filter(|_| !record.status.is_terminal())
            .unwrap_or(record.status);
        let cancelled = status.is_terminal()
            || history
                .iter()
                .any(|e| e.event_type() == EventType::CancellationRequested);
        let (status, _) = watch::channel(status);

        Self {
            record,
            task_lock: tokio::sync::Mutex::new(()),
            queued: AtomicBool::new(false),
            inbox: Mutex::new(Vec::new()),
            updates: Mutex::new(updates),
            status,
            cancelled: Arc::new(AtomicBool::new(cancelled)),
            cancel_lock: tokio::sync::Mutex::new(()),
            active: Mutex::new(HashSet::new()),
        }
    }

    fn id(&self) -> Uuid {
        self.record.workflow_execution_id
    }

    fn status(&self) -> WorkflowStatus {
        *self.status.borrow()
    }

    fn mark_update(&self, update_id: &str, stage: UpdateStage) {
        if let Some(entry) = self.updates.lock().get_mut(update_id) {
            entry.stage = entry.stage.advance(stage);
        }
    }

    fn resolve_update(&self, update_id: &str, outcome: UpdateOutcome) {
        match self.updates.lock().get_mut(update_id) {
            Some(entry) => entry.resolve(outcome),
            None => warn!(update_id = %update_id, "Outcome for unknown update"),
        }
    }

    /// Publish a terminal status and reject every update still queued.
    ///
    /// Resolved updates are dropped; their outcomes live on in history.
    /// Returns true once no caller is left waiting on this slot.
    fn close(&self, status: WorkflowStatus) -> bool {
        let mut updates = self.updates.lock();
        self.status.send_replace(status);
        self.cancelled.store(true, Ordering::SeqCst);

        let queued: Vec<UpdateRequest> = self.inbox.lock().drain(..).collect();
        for request in queued {
            debug!(update_id = %request.update_id, "Rejecting undelivered update");
            if let Some(entry) = updates.get_mut(&request.update_id) {
                entry.resolve(UpdateOutcome::rejected(
                    RejectionKind::ClosedBeforeDelivery,
                    CLOSED_BEFORE_DELIVERY,
                ));
            }
        }

        updates.retain(|_, entry| !entry.waiters.is_empty());
        updates.is_empty()
    }
}

struct EngineInner {
    store: Arc<dyn HistoryStore>,
    workflows: Arc<WorkflowRegistry>,
    tasks: Arc<TaskRegistry>,
    config: EngineConfig,
    slots: RwLock<HashMap<Uuid, Arc<ExecutionSlot>>>,
    ready_tx: mpsc::Sender<Uuid>,
    /// One permit per running workflow task
    workflow_permits: Arc<Semaphore>,
    task_permits: Semaphore,
    /// Timer and task runners
    background: Mutex<JoinSet<()>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Handle to a running engine. Cheap to clone.
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

impl WorkflowEngine {
    /// Start an engine. Must be called inside a tokio runtime.
    pub fn new(
        store: Arc<dyn HistoryStore>,
        workflows: Arc<WorkflowRegistry>,
        tasks: Arc<TaskRegistry>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (ready_tx, ready_rx) = mpsc::channel(config.workflow_config.queue_size);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(EngineInner {
            store,
            workflows,
            tasks,
            workflow_permits: Arc::new(Semaphore::new(config.workflow_config.max_concurrent)),
            task_permits: Semaphore::new(config.task_config.max_concurrent),
            background: Mutex::new(JoinSet::new()),
            config,
            slots: RwLock::new(HashMap::new()),
            ready_tx,
            shutdown_tx,
        });

        info!(
            max_concurrent = inner.config.workflow_config.max_concurrent,
            workflow_kinds = ?inner.workflows.get_registered_kinds(),
            "Starting workflow engine"
        );
        tokio::spawn(EngineInner::dispatch_loop(
            Arc::clone(&inner),
            ready_rx,
            shutdown_rx,
        ));

        Ok(Self { inner })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn workflows(&self) -> &Arc<WorkflowRegistry> {
        &self.inner.workflows
    }

    pub fn tasks(&self) -> &Arc<TaskRegistry> {
        &self.inner.tasks
    }

    /// Start a new execution of a registered workflow kind
    pub async fn start_workflow(
        &self,
        kind: &str,
        input: Value,
        options: StartWorkflowOptions,
    ) -> Result<ExecutionRecord> {
        if !self.inner.workflows.has(kind) {
            return Err(CairnError::WorkflowNotFound(kind.to_string()));
        }

        let workflow_id = options
            .workflow_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let record = ExecutionRecord::new(workflow_id, kind, input.clone());
        let started = ReplayEvent::new(
            1,
            EventType::WorkflowStarted,
            json!({"workflowKind": kind, "input": input}),
            Utc::now(),
        );
        self.inner
            .store
            .create_execution(record.clone(), started)
            .await?;

        info!(
            workflow_id = %record.workflow_id,
            workflow_execution_id = %record.workflow_execution_id,
            kind = %kind,
            "Workflow started"
        );
        let slot = self.inner.slot_for(record.clone()).await?;
        self.inner.schedule(&slot);
        Ok(record)
    }

    /// Deliver a signal to a running workflow
    pub async fn signal_workflow(&self, workflow_id: &str, name: &str, value: Value) -> Result<()> {
        let slot = self.inner.open_slot(workflow_id).await?;
        let event = ReplayEvent::new(
            0,
            EventType::SignalReceived,
            json!({"signalName": name, "value": value}),
            Utc::now(),
        );
        self.inner.store.append_events(slot.id(), vec![event]).await?;
        debug!(workflow_id = %workflow_id, signal = %name, "Signal received");
        self.inner.schedule(&slot);
        Ok(())
    }

    /// Admit an update. The receiver resolves with the update's outcome.
    ///
    /// A request reusing a known `update_id` joins that update instead of
    /// running again.
    pub async fn request_update(
        &self,
        workflow_id: &str,
        request: UpdateRequest,
    ) -> Result<oneshot::Receiver<UpdateOutcome>> {
        let slot = self.inner.slot(workflow_id).await?;
        let (tx, rx) = oneshot::channel();

        {
            let mut updates = slot.updates.lock();
            if let Some(entry) = updates.get_mut(&request.update_id) {
                debug!(
                    workflow_id = %workflow_id,
                    update_id = %request.update_id,
                    stage = ?entry.stage,
                    "Duplicate update request"
                );
                match &entry.outcome {
                    Some(outcome) => {
                        let _ = tx.send(outcome.clone());
                    }
                    None => entry.waiters.push(tx),
                }
                return Ok(rx);
            }

            if slot.status().is_terminal() {
                debug!(workflow_id = %workflow_id, update_id = %request.update_id, "Update sent to closed workflow");
                let _ = tx.send(UpdateOutcome::rejected(
                    RejectionKind::WorkflowClosed,
                    WORKFLOW_CLOSED,
                ));
                return Ok(rx);
            }

            debug!(
                workflow_id = %workflow_id,
                update_id = %request.update_id,
                update_name = %request.name,
                "Update admitted"
            );
            updates.insert(
                request.update_id.clone(),
                UpdateEntry::admitted(request.name.clone(), tx),
            );
            slot.inbox.lock().push(request);
        }

        self.inner.schedule(&slot);
        Ok(rx)
    }

    /// Wait for the outcome of an update admitted earlier
    pub async fn await_update(&self, workflow_id: &str, update_id: &str) -> Result<UpdateOutcome> {
        let slot = self.inner.slot(workflow_id).await?;
        let rx = {
            let mut updates = slot.updates.lock();
            let entry = updates.get_mut(update_id).ok_or_else(|| {
                CairnError::InvalidInput(format!("No update '{}' on {}", update_id, workflow_id))
            })?;
            if let Some(outcome) = &entry.outcome {
                return Ok(outcome.clone());
            }
            let (tx, rx) = oneshot::channel();
            entry.waiters.push(tx);
            rx
        };
        rx.await
            .map_err(|_| CairnError::Other("Engine stopped before the update finished".to_string()))
    }

    /// Name of a known update
    pub async fn update_name(&self, workflow_id: &str, update_id: &str) -> Result<Option<String>> {
        let slot = self.inner.slot(workflow_id).await?;
        let name = slot.updates.lock().get(update_id).map(|e| e.name.clone());
        Ok(name)
    }

    /// Ask a workflow to cancel. It stops at its next blocking call.
    pub async fn cancel_workflow(&self, workflow_id: &str, reason: &str) -> Result<()> {
        let slot = self.inner.open_slot(workflow_id).await?;
        if let Some(workflow) = self.inner.workflows.get(&slot.record.kind) {
            if !workflow.metadata.cancellable {
                return Err(CairnError::InvalidInput(format!(
                    "Workflow kind '{}' is not cancellable",
                    slot.record.kind
                )));
            }
        }

        let _guard = slot.cancel_lock.lock().await;
        if slot.cancelled.load(Ordering::SeqCst) {
            return Ok(());
        }

        let event = ReplayEvent::new(
            0,
            EventType::CancellationRequested,
            json!({"reason": reason}),
            Utc::now(),
        );
        self.inner.store.append_events(slot.id(), vec![event]).await?;
        // Raised only once the request is durable, so a failed append can be retried
        slot.cancelled.store(true, Ordering::SeqCst);
        info!(workflow_id = %workflow_id, reason = %reason, "Cancellation requested");
        self.inner.schedule(&slot);
        Ok(())
    }

    pub async fn describe(&self, workflow_id: &str) -> Result<ExecutionRecord> {
        self.inner
            .store
            .find_execution(workflow_id)
            .await?
            .ok_or_else(|| CairnError::WorkflowNotFound(workflow_id.to_string()))
    }

    pub async fn history(&self, workflow_id: &str) -> Result<Vec<ReplayEvent>> {
        let record = self.describe(workflow_id).await?;
        self.inner
            .store
            .load_history(record.workflow_execution_id)
            .await
    }

    /// Wait until the workflow closes and return its output
    pub async fn await_result(&self, workflow_id: &str) -> Result<Value> {
        let slot = self.inner.slot(workflow_id).await?;
        let mut status_rx = slot.status.subscribe();
        status_rx
            .wait_for(|s| s.is_terminal())
            .await
            .map_err(|_| CairnError::Other("Engine stopped".to_string()))?;

        let history = self.inner.store.load_history(slot.id()).await?;
        terminal_result(&history)
    }

    /// Resume every open execution in the store.
    ///
    /// Timers are re-armed for their remaining time, tasks without a result
    /// are run again and each execution gets a workflow task.
    pub async fn recover(&self) -> Result<usize> {
        let open = self.inner.store.list_open_executions().await?;
        let count = open.len();

        for record in open {
            let slot = self.inner.slot_for(record).await?;
            let history = self.inner.store.load_history(slot.id()).await?;
            let now = Utc::now();

            for event in &history {
                match event.event_type() {
                    EventType::TimerStarted => {
                        let Some(timer_id) = event.get_string("timerId") else {
                            continue;
                        };
                        if EventLookup::find_terminal_timer_event(&history, timer_id).is_some() {
                            continue;
                        }
                        let duration_ms = event.get_i64("durationMs").unwrap_or(0);
                        let elapsed_ms = (now - event.timestamp()).num_milliseconds();
                        let remaining = duration_ms.saturating_sub(elapsed_ms).max(0) as u64;
                        self.inner.spawn_timer(
                            &slot,
                            timer_id.to_string(),
                            Duration::from_millis(remaining),
                        );
                    }
                    EventType::TaskScheduled => {
                        let Some(task_execution_id) = event.get_string("taskExecutionId") else {
                            continue;
                        };
                        if EventLookup::find_terminal_task_event(&history, task_execution_id)
                            .is_some()
                        {
                            continue;
                        }
                        self.inner.spawn_task(
                            &slot,
                            task_execution_id.to_string(),
                            event.get_string("kind").unwrap_or_default().to_string(),
                            event.get("input").cloned().unwrap_or(Value::Null),
                        );
                    }
                    _ => {}
                }
            }

            self.inner.schedule(&slot);
        }

        info!(count, "Recovered open executions");
        Ok(count)
    }

    /// Stop dispatching and abort running timers and tasks, without waiting.
    ///
    /// A workflow task already running may still apply its result; use
    /// [`shutdown`](Self::shutdown) to wait for it.
    pub fn request_shutdown(&self) {
        if self.inner.shutdown_tx.send_replace(true) {
            return;
        }
        info!("Shutting down workflow engine");
        self.inner.background.lock().abort_all();
    }

    /// Stop the engine and wait until it can no longer write history.
    ///
    /// Once this returns, another engine may recover the same store.
    pub async fn shutdown(&self) {
        self.request_shutdown();

        let all = self.inner.config.workflow_config.max_concurrent as u32;
        if let Ok(permits) = self.inner.workflow_permits.acquire_many(all).await {
            self.inner.workflow_permits.close();
            drop(permits);
        }

        let mut background = std::mem::take(&mut *self.inner.background.lock());
        while background.join_next().await.is_some() {}
        debug!("Workflow engine stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }
}

impl EngineInner {
    fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    async fn dispatch_loop(
        inner: Arc<EngineInner>,
        mut ready_rx: mpsc::Receiver<Uuid>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            let execution_id = tokio::select! {
                _ = shutdown_rx.changed() => break,
                next = ready_rx.recv() => match next {
                    Some(id) => id,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = shutdown_rx.changed() => break,
                permit = Arc::clone(&inner.workflow_permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = inner.run_workflow_task(execution_id).await {
                    error!(
                        workflow_execution_id = %execution_id,
                        error = %e,
                        "Workflow task failed"
                    );
                }
            });
        }

        debug!("Workflow dispatcher stopped");
    }

    /// Queue a workflow task unless one is already queued
    fn schedule(&self, slot: &ExecutionSlot) {
        if slot.queued.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.ready_tx.try_send(slot.id()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(id)) => {
                let tx = self.ready_tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(id).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                slot.queued.store(false, Ordering::SeqCst);
                warn!(workflow_id = %slot.record.workflow_id, "Dispatcher stopped; workflow task dropped");
            }
        }
    }

    async fn slot(&self, workflow_id: &str) -> Result<Arc<ExecutionSlot>> {
        let record = self
            .store
            .find_execution(workflow_id)
            .await?
            .ok_or_else(|| CairnError::WorkflowNotFound(workflow_id.to_string()))?;
        self.slot_for(record).await
    }

    /// Slot of a workflow that is still open
    async fn open_slot(&self, workflow_id: &str) -> Result<Arc<ExecutionSlot>> {
        let slot = self.slot(workflow_id).await?;
        if slot.status().is_terminal() {
            return Err(CairnError::WorkflowClosed(workflow_id.to_string()));
        }
        Ok(slot)
    }

    async fn slot_for(&self, record: ExecutionRecord) -> Result<Arc<ExecutionSlot>> {
        let id = record.workflow_execution_id;
        let existing = self.slots.read().get(&id).cloned();
        if let Some(slot) = existing {
            return Ok(slot);
        }

        let history = self.store.load_history(id).await?;
        let slot = Arc::new(ExecutionSlot::from_history(record, &history));
        if slot.status().is_terminal() {
            return Ok(slot);
        }
        let mut slots = self.slots.write();
        Ok(Arc::clone(slots.entry(id).or_insert(slot)))
    }

    async fn set_status(&self, slot: &ExecutionSlot, status: WorkflowStatus) -> Result<()> {
        self.store.set_status(slot.id(), status).await?;
        if status.is_terminal() {
            if slot.close(status) {
                self.slots.write().remove(&slot.id());
            }
        } else {
            slot.status.send_replace(status);
        }
        Ok(())
    }

    async fn run_workflow_task(self: &Arc<Self>, execution_id: Uuid) -> Result<()> {
        let slot = match self.slots.read().get(&execution_id).cloned() {
            Some(slot) => slot,
            None => return Ok(()),
        };
        let _guard = slot.task_lock.lock().await;
        slot.queued.store(false, Ordering::SeqCst);

        if slot.status().is_terminal() || self.is_shut_down() {
            return Ok(());
        }

        let history = self.store.load_history(execution_id).await?;
        let pending: Vec<UpdateRequest> = slot.inbox.lock().clone();
        self.set_status(&slot, WorkflowStatus::Running).await?;

        trace!(
            workflow_id = %slot.record.workflow_id,
            history_len = history.len(),
            pending_updates = pending.len(),
            "Running workflow task"
        );

        let result = match self.workflows.get(&slot.record.kind) {
            Some(workflow) => {
                let executor = WorkflowExecutor::new(
                    slot.record.workflow_id.clone(),
                    execution_id,
                    slot.record.input.clone(),
                    history,
                )
                .with_options(ExecutionOptions {
                    enable_determinism_validation: self.config.enable_determinism_validation,
                    workflow_task_time: None,
                })
                .with_pending_updates(pending);

                executor
                    .execute(move |ctx, input| async move { workflow.execute(ctx, input).await })
                    .await
            }
            None => {
                let error = CairnError::WorkflowNotFound(slot.record.kind.clone()).to_string();
                let command = WorkflowCommand::FailWorkflow {
                    sequence_number: history.len() as i32 + 1,
                    error: error.clone(),
                    stack_trace: String::new(),
                    failure_type: Some("NON_RETRYABLE".to_string()),
                };
                WorkflowTaskResult::failed(vec![command], error, None, "NON_RETRYABLE")
            }
        };

        self.apply_task_result(&slot, result).await
    }

    async fn apply_task_result(
        self: &Arc<Self>,
        slot: &Arc<ExecutionSlot>,
        result: WorkflowTaskResult,
    ) -> Result<()> {
        if self.is_shut_down() {
            debug!(workflow_id = %slot.record.workflow_id, "Engine stopped; discarding workflow task result");
            return Ok(());
        }

        let now = Utc::now();
        let events: Vec<ReplayEvent> = result
            .commands
            .iter()
            .filter_map(|c| c.to_event(0, now))
            .collect();
        if !events.is_empty() {
            self.store.append_events(slot.id(), events).await?;
        }

        let delivered: HashSet<&String> = result.delivered_updates.iter().collect();
        slot.inbox
            .lock()
            .retain(|u| !delivered.contains(&u.update_id));

        for command in &result.commands {
            match command {
                WorkflowCommand::ScheduleTask {
                    task_execution_id,
                    kind,
                    input,
                    ..
                } => self.spawn_task(slot, task_execution_id.clone(), kind.clone(), input.clone()),
                WorkflowCommand::StartTimer {
                    timer_id,
                    duration_ms,
                    ..
                } => self.spawn_timer(
                    slot,
                    timer_id.clone(),
                    Duration::from_millis((*duration_ms).max(0) as u64),
                ),
                WorkflowCommand::AcceptUpdate { update_id, .. } => {
                    slot.mark_update(update_id, UpdateStage::Accepted)
                }
                WorkflowCommand::CompleteUpdate {
                    update_id, result, ..
                } => slot.resolve_update(update_id, UpdateOutcome::Completed(result.clone())),
                WorkflowCommand::FailUpdate {
                    update_id, error, ..
                } => slot.resolve_update(update_id, UpdateOutcome::Failed(error.clone())),
                WorkflowCommand::RejectUpdate {
                    update_id,
                    kind,
                    reason,
                    ..
                } => slot.resolve_update(update_id, UpdateOutcome::rejected(*kind, reason.clone())),
                _ => {}
            }
        }

        self.set_status(slot, result.status).await?;

        if result.status.is_terminal() {
            info!(
                workflow_id = %slot.record.workflow_id,
                status = ?result.status,
                "Workflow closed"
            );
        } else if !slot.inbox.lock().is_empty() && !self.is_shut_down() {
            // Updates left queued by a condition that returned early
            self.schedule(slot);
        }
        Ok(())
    }

    /// Run a timer or task runner; aborted by shutdown
    fn spawn_background<F>(&self, runner: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut background = self.background.lock();
        while background.try_join_next().is_some() {}
        background.spawn(runner);
    }

    fn spawn_timer(self: &Arc<Self>, slot: &Arc<ExecutionSlot>, timer_id: String, duration: Duration) {
        if self.is_shut_down() || !slot.active.lock().insert(timer_id.clone()) {
            return;
        }
        let inner = Arc::clone(self);
        let slot = Arc::clone(slot);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.spawn_background(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = shutdown_rx.wait_for(|stopped| *stopped) => return,
            }
            slot.active.lock().remove(&timer_id);
            if slot.status().is_terminal() || inner.is_shut_down() {
                return;
            }

            let fired = ReplayEvent::new(
                0,
                EventType::TimerFired,
                json!({"timerId": timer_id}),
                Utc::now(),
            );
            match inner.store.append_events(slot.id(), vec![fired]).await {
                Ok(_) => {
                    trace!(workflow_id = %slot.record.workflow_id, timer_id = %timer_id, "Timer fired");
                    inner.schedule(&slot);
                }
                Err(e) => error!(timer_id = %timer_id, error = %e, "Failed to record timer"),
            }
        });
    }

    fn spawn_task(
        self: &Arc<Self>,
        slot: &Arc<ExecutionSlot>,
        task_execution_id: String,
        kind: String,
        input: Value,
    ) {
        if self.is_shut_down() || !slot.active.lock().insert(task_execution_id.clone()) {
            return;
        }
        let inner = Arc::clone(self);
        let slot = Arc::clone(slot);

        self.spawn_background(async move {
            let outcome = inner.run_task(&slot, &task_execution_id, &kind, input).await;
            slot.active.lock().remove(&task_execution_id);
            if slot.status().is_terminal() || inner.is_shut_down() {
                return;
            }

            let event = match outcome {
                Ok(result) => ReplayEvent::new(
                    0,
                    EventType::TaskCompleted,
                    json!({"taskExecutionId": task_execution_id, "result": result}),
                    Utc::now(),
                ),
                Err(error) => ReplayEvent::new(
                    0,
                    EventType::TaskFailed,
                    json!({"taskExecutionId": task_execution_id, "error": error}),
                    Utc::now(),
                ),
            };
            match inner.store.append_events(slot.id(), vec![event]).await {
                Ok(_) => inner.schedule(&slot),
                Err(e) => error!(
                    task_execution_id = %task_execution_id,
                    error = %e,
                    "Failed to record task result"
                ),
            }
        });
    }

    /// Run a task to completion, retrying per its retry policy
    async fn run_task(
        &self,
        slot: &ExecutionSlot,
        task_execution_id: &str,
        kind: &str,
        input: Value,
    ) -> std::result::Result<Value, String> {
        let Some(task) = self.tasks.get(kind) else {
            warn!(kind = %kind, "No task registered for kind");
            return Err(CairnError::TaskNotFound(kind.to_string()).to_string());
        };
        let _permit = self
            .task_permits
            .acquire()
            .await
            .map_err(|e| e.to_string())?;

        let defaults = &self.config.task_config;
        let backoff = task
            .metadata
            .retry
            .as_ref()
            .map(BackoffConfig::from)
            .unwrap_or_else(|| BackoffConfig {
                max_retries: defaults.max_retries,
                initial_backoff_ms: defaults.initial_backoff.as_millis() as u64,
                ..BackoffConfig::default()
            });
        let timeout = task
            .metadata
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_timeout);

        let mut attempt = 1;
        loop {
            let ctx = Arc::new(TaskContextImpl::new(
                task_execution_id,
                slot.record.workflow_id.clone(),
                attempt,
                Arc::clone(&slot.cancelled),
            ));
            let result = match tokio::time::timeout(timeout, task.execute(ctx, input.clone())).await
            {
                Ok(Ok(output)) => TaskExecutionResult::completed(output),
                Ok(Err(CairnError::TaskCancelled)) => TaskExecutionResult::Cancelled,
                Ok(Err(e @ CairnError::NonRetryable(_))) => {
                    TaskExecutionResult::failed(e.to_string(), false)
                }
                Ok(Err(e)) => TaskExecutionResult::failed(e.to_string(), true),
                Err(_) => TaskExecutionResult::TimedOut,
            };

            if let TaskExecutionResult::Completed { output } = result {
                debug!(task_execution_id = %task_execution_id, kind = %kind, attempt, "Task completed");
                return Ok(output);
            }
            if !should_retry(&backoff, attempt, &result) {
                let error = result.error_message().unwrap_or_default();
                warn!(task_execution_id = %task_execution_id, kind = %kind, attempt, error = %error, "Task failed");
                return Err(error);
            }

            let delay = calculate_backoff(&backoff, attempt);
            debug!(
                task_execution_id = %task_execution_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying task"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Status a terminal history event stands for
fn closed_status(event_type: EventType) -> Option<WorkflowStatus> {
    match event_type {
        EventType::WorkflowCompleted => Some(WorkflowStatus::Completed),
        EventType::WorkflowExecutionFailed => Some(WorkflowStatus::Failed),
        EventType::WorkflowCancelled => Some(WorkflowStatus::Cancelled),
        _ => None,
    }
}

/// Output or error recorded by the terminal event of a history
fn terminal_result(history: &[ReplayEvent]) -> Result<Value> {
    let terminal = history
        .iter()
        .rev()
        .find(|e| e.event_type().is_workflow_terminal())
        .ok_or_else(|| CairnError::Other("Workflow has not closed".to_string()))?;

    match terminal.event_type() {
        EventType::WorkflowCompleted => Ok(terminal.get("output").cloned().unwrap_or(Value::Null)),
        EventType::WorkflowCancelled => Err(CairnError::WorkflowCancelled(
            terminal.get_string("reason").unwrap_or_default().to_string(),
        )),
        _ => Err(CairnError::WorkflowFailed(
            terminal.get_string("error").unwrap_or("Workflow failed").to_string(),
        )),
    }
}
