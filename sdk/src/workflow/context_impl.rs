//! WorkflowContextImpl - replaying implementation of WorkflowContext

use crate::error::{CairnError, DeterminismViolationError, Result};
use crate::workflow::context::{DeterministicRandom, WorkflowContext};
use crate::workflow::update::UpdateHandler;
use async_trait::async_trait;
use cairn_core::{
    CommandRecorder, EventType, RejectionKind, ReplayEngine, ReplayEvent, SeededRandom,
    UpdateOutcome, UpdateRequest, WorkflowCommand,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

fn task_output(event: &ReplayEvent) -> Value {
    event.get("result").cloned().unwrap_or(Value::Null)
}

fn task_error(event: &ReplayEvent) -> CairnError {
    CairnError::TaskFailed(event.get_string("error").unwrap_or("Task failed").to_string())
}

/// Concrete implementation of WorkflowContext.
///
/// One instance lives for exactly one workflow task. It replays the workflow
/// against history and records commands for everything past it.
///
/// Every blocking call is a yield point with a per-run index `k`:
///
/// 1. the call's own history step (positions are allocated, new commands recorded)
/// 2. updates accepted at `k` in history are re-applied, in history order
/// 3. the call returns if it is satisfied
/// 4. queued updates are validated, accepted and run
/// 5. the call fails with `WorkflowCancelled` if cancellation was requested,
///    otherwise with `Suspended`
pub struct WorkflowContextImpl<R: CommandRecorder> {
    workflow_id: String,
    workflow_execution_id: Uuid,
    input: Value,

    /// Command recorder; validates replayed calls when it is a validating recorder
    recorder: RwLock<R>,

    replay: ReplayEngine,

    /// Current sequence number (1-indexed, continues after history)
    sequence_number: AtomicI32,

    /// Deterministic time (milliseconds since epoch)
    current_time: AtomicI64,

    uuid_counter: AtomicI64,
    random: SeededRandom,

    /// Reason of the pending cancellation request, if any
    cancellation: RwLock<Option<String>>,

    /// Number of yield points reached so far in this run
    yield_counter: AtomicU32,

    update_handlers: RwLock<HashMap<String, UpdateHandler>>,

    /// Updates admitted but not yet delivered
    inbox: Mutex<VecDeque<UpdateRequest>>,

    /// IDs of updates accepted or rejected during this task
    delivered: Mutex<Vec<String>>,
}

impl<R: CommandRecorder> WorkflowContextImpl<R> {
    /// Create a new WorkflowContextImpl
    pub fn new(
        workflow_id: impl Into<String>,
        workflow_execution_id: Uuid,
        input: Value,
        recorder: R,
        existing_events: Vec<ReplayEvent>,
        start_time_millis: i64,
    ) -> Self {
        // Seed from the execution ID for deterministic randomness
        let seed = workflow_execution_id.as_u128() as u64;
        let initial_sequence = (existing_events.len() as i32) + 1;
        let replay = ReplayEngine::new(existing_events);
        let cancellation = replay.cancellation_reason();

        Self {
            workflow_id: workflow_id.into(),
            workflow_execution_id,
            input,
            recorder: RwLock::new(recorder),
            replay,
            sequence_number: AtomicI32::new(initial_sequence),
            current_time: AtomicI64::new(start_time_millis),
            uuid_counter: AtomicI64::new(0),
            random: SeededRandom::new(seed),
            cancellation: RwLock::new(cancellation),
            yield_counter: AtomicU32::new(0),
            update_handlers: RwLock::new(HashMap::new()),
            inbox: Mutex::new(VecDeque::new()),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Queue updates for delivery in this task.
    ///
    /// Requests already accepted in history are dropped.
    pub fn with_pending_updates(self, updates: Vec<UpdateRequest>) -> Self {
        let accepted = self.replay.accepted_update_ids();
        {
            let mut inbox = self.inbox.lock();
            inbox.extend(
                updates
                    .into_iter()
                    .filter(|u| !accepted.contains(&u.update_id)),
            );
        }
        self
    }

    /// Get the next sequence number and increment
    fn next_sequence(&self) -> i32 {
        self.sequence_number.fetch_add(1, Ordering::SeqCst)
    }

    /// Record a command via the recorder
    fn record_command(&self, command: WorkflowCommand) -> Result<()> {
        self.recorder
            .write()
            .record_command(command)
            .map_err(CairnError::DeterminismViolation)
    }

    /// Check a replayed call against its history event
    fn check_replayed(&self, command: &WorkflowCommand, event: &ReplayEvent) -> Result<()> {
        self.recorder
            .read()
            .check_replayed(command, event)
            .map_err(CairnError::DeterminismViolation)
    }

    /// Request cancellation of the workflow
    pub fn request_cancellation(&self, reason: impl Into<String>) {
        let mut cancellation = self.cancellation.write();
        if cancellation.is_none() {
            *cancellation = Some(reason.into());
        }
    }

    /// Get all recorded commands
    pub fn get_commands(&self) -> Vec<WorkflowCommand> {
        self.recorder.read().get_commands()
    }

    /// Take all recorded commands
    pub fn take_commands(&self) -> Vec<WorkflowCommand> {
        self.recorder.write().take_commands()
    }

    /// IDs of updates accepted or rejected in this task
    pub fn delivered_updates(&self) -> Vec<String> {
        self.delivered.lock().clone()
    }

    /// Number of yield points reached in this run
    pub fn yield_points(&self) -> u32 {
        self.yield_counter.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Yield points
    // =========================================================================

    fn next_yield_point(&self) -> u32 {
        self.yield_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Move workflow time up to an event that unblocked the workflow.
    ///
    /// Only events that existed before the consuming task ran qualify, so
    /// every replay sees the same clock at the same point.
    fn observe(&self, event: &ReplayEvent) {
        self.current_time
            .fetch_max(event.timestamp().timestamp_millis(), Ordering::SeqCst);
    }

    /// Re-run handlers of updates accepted at yield point `k` in history.
    fn apply_historic_updates(&self, k: u32) -> Result<()> {
        for event in self.replay.updates_at_yield_point(k) {
            let update_id = event.get_string("updateId").unwrap_or_default().to_string();
            let name = event.get_string("updateName").unwrap_or_default().to_string();
            let args = event.get("args").cloned().unwrap_or(Value::Null);

            let handler = self.update_handlers.read().get(&name).cloned();
            let Some(handler) = handler else {
                return Err(CairnError::DeterminismViolation(
                    DeterminismViolationError::UpdateHandlerMissing { update_id, name },
                ));
            };

            trace!(update_id = %update_id, update_name = %name, yield_point = k, "Re-applying historic update");
            let outcome = handler.handle(args);

            let recorded = self
                .replay
                .find_update_outcome(&update_id)
                .and_then(UpdateOutcome::from_event);
            match recorded {
                Some(recorded) => {
                    let replayed = if outcome.is_ok() { "completed" } else { "failed" };
                    if recorded.label() != replayed {
                        return Err(CairnError::DeterminismViolation(
                            DeterminismViolationError::UpdateOutcomeMismatch {
                                update_id,
                                expected: recorded.label().to_string(),
                                actual: replayed.to_string(),
                            },
                        ));
                    }
                }
                None => self.record_update_outcome(&update_id, outcome)?,
            }
        }
        Ok(())
    }

    fn record_update_outcome(&self, update_id: &str, outcome: Result<Value>) -> Result<()> {
        let sequence = self.next_sequence();
        let command = match outcome {
            Ok(result) => WorkflowCommand::CompleteUpdate {
                sequence_number: sequence,
                update_id: update_id.to_string(),
                result,
            },
            Err(e) => {
                debug!(update_id = %update_id, error = %e, "Update handler failed");
                WorkflowCommand::FailUpdate {
                    sequence_number: sequence,
                    update_id: update_id.to_string(),
                    error: e.to_string(),
                }
            }
        };
        self.record_command(command)
    }

    /// Deliver queued updates at yield point `k`.
    ///
    /// With a predicate, returns `true` as soon as it holds after an accepted
    /// update. Updates left in the inbox stay queued.
    fn deliver_updates(
        &self,
        k: u32,
        predicate: Option<&(dyn Fn() -> bool + Send + Sync)>,
    ) -> Result<bool> {
        loop {
            let next = self.inbox.lock().pop_front();
            let Some(request) = next else {
                return Ok(false);
            };
            self.delivered.lock().push(request.update_id.clone());

            let handler = self.update_handlers.read().get(&request.name).cloned();
            let rejection = match &handler {
                None => Some((
                    RejectionKind::UnknownUpdate,
                    format!("Unknown update: {}", request.name),
                )),
                Some(handler) => handler
                    .validate(&request.args)
                    .err()
                    .map(|e| (RejectionKind::ValidationFailed, e.to_string())),
            };

            if let Some((kind, reason)) = rejection {
                debug!(
                    workflow_id = %self.workflow_id,
                    update_id = %request.update_id,
                    update_name = %request.name,
                    reason = %reason,
                    "Rejecting update"
                );
                let sequence = self.next_sequence();
                self.record_command(WorkflowCommand::RejectUpdate {
                    sequence_number: sequence,
                    update_id: request.update_id,
                    update_name: request.name,
                    kind,
                    reason,
                })?;
                continue;
            }
            let Some(handler) = handler else {
                continue;
            };

            debug!(
                workflow_id = %self.workflow_id,
                update_id = %request.update_id,
                update_name = %request.name,
                yield_point = k,
                "Accepting update"
            );
            let sequence = self.next_sequence();
            self.record_command(WorkflowCommand::AcceptUpdate {
                sequence_number: sequence,
                update_id: request.update_id.clone(),
                update_name: request.name.clone(),
                args: request.args.clone(),
                yield_point: k,
            })?;
            let outcome = handler.handle(request.args);
            self.record_update_outcome(&request.update_id, outcome)?;

            if let Some(predicate) = predicate {
                if predicate() {
                    return Ok(true);
                }
            }
        }
    }

    /// Error returned when a yield point cannot make progress.
    fn block(&self, reason: String) -> CairnError {
        match self.cancellation.read().clone() {
            Some(cancel_reason) => CairnError::WorkflowCancelled(cancel_reason),
            None => CairnError::Suspended { reason },
        }
    }

    // =========================================================================
    // History steps
    // =========================================================================

    /// Allocate a timer. Returns its ID and its TimerFired event, if any.
    fn start_timer(&self, duration: Duration) -> Result<(String, Option<&ReplayEvent>)> {
        let timer_seq = self.replay.next_timer_seq();
        let timer_id = format!("timer-{}", timer_seq);
        // Longer than i64 millis is forever
        let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);

        if let Some(started) = self.replay.get_timer_event(timer_seq) {
            self.check_replayed(
                &WorkflowCommand::StartTimer {
                    sequence_number: started.sequence_number(),
                    timer_id: timer_id.clone(),
                    duration_ms,
                },
                started,
            )?;
            let fired = self.replay.find_terminal_timer_event(&timer_id);
            return Ok((timer_id, fired));
        }

        let sequence = self.next_sequence();
        self.record_command(WorkflowCommand::StartTimer {
            sequence_number: sequence,
            timer_id: timer_id.clone(),
            duration_ms,
        })?;
        Ok((timer_id, None))
    }

    /// Allocate a task. Returns its TaskCompleted or TaskFailed event if
    /// history has one.
    fn start_task(&self, kind: &str, input: Value) -> Result<Option<&ReplayEvent>> {
        let task_seq = self.replay.next_task_seq();

        if let Some(scheduled) = self.replay.get_task_event(task_seq) {
            let task_execution_id = scheduled
                .get_string("taskExecutionId")
                .ok_or_else(|| {
                    CairnError::Other("TaskScheduled event missing taskExecutionId".to_string())
                })?
                .to_string();
            self.check_replayed(
                &WorkflowCommand::ScheduleTask {
                    sequence_number: scheduled.sequence_number(),
                    task_execution_id: task_execution_id.clone(),
                    kind: kind.to_string(),
                    input,
                },
                scheduled,
            )?;

            return Ok(self.replay.find_terminal_task_event(&task_execution_id));
        }

        let task_execution_id = Uuid::new_v5(
            &self.workflow_execution_id,
            format!("task-{}", task_seq).as_bytes(),
        );
        let sequence = self.next_sequence();
        self.record_command(WorkflowCommand::ScheduleTask {
            sequence_number: sequence,
            task_execution_id: task_execution_id.to_string(),
            kind: kind.to_string(),
            input,
        })?;
        Ok(None)
    }
}

#[async_trait]
impl<R: CommandRecorder + Send + Sync> WorkflowContext for WorkflowContextImpl<R> {
    fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    fn workflow_execution_id(&self) -> Uuid {
        self.workflow_execution_id
    }

    fn input_raw(&self) -> &Value {
        &self.input
    }

    fn current_time_millis(&self) -> i64 {
        self.current_time.load(Ordering::SeqCst)
    }

    fn random_uuid(&self) -> Uuid {
        let counter = self.uuid_counter.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}:{}", self.workflow_execution_id, counter);
        Uuid::new_v5(&self.workflow_execution_id, name.as_bytes())
    }

    fn random(&self) -> &dyn DeterministicRandom {
        &self.random
    }

    async fn run_raw(&self, name: &str, result: Value) -> Result<Value> {
        let op_seq = self.replay.next_operation_seq();

        if let Some(recorded) = self.replay.get_operation_event(op_seq) {
            self.check_replayed(
                &WorkflowCommand::RecordOperation {
                    sequence_number: recorded.sequence_number(),
                    operation_name: name.to_string(),
                    result: Value::Null,
                },
                recorded,
            )?;
            return Ok(recorded.get("result").cloned().unwrap_or(Value::Null));
        }

        let sequence = self.next_sequence();
        self.record_command(WorkflowCommand::RecordOperation {
            sequence_number: sequence,
            operation_name: name.to_string(),
            result: result.clone(),
        })?;
        Ok(result)
    }

    async fn schedule_raw(&self, kind: &str, input: Value) -> Result<Value> {
        let k = self.next_yield_point();
        let finished = self.start_task(kind, input)?;
        self.apply_historic_updates(k)?;

        if let Some(event) = finished {
            self.observe(event);
            return match event.event_type() {
                EventType::TaskCompleted => Ok(task_output(event)),
                _ => Err(task_error(event)),
            };
        }

        self.deliver_updates(k, None)?;
        Err(self.block(format!("Task is still running: {}", kind)))
    }

    async fn schedule_all_raw(&self, tasks: Vec<(String, Value)>) -> Result<Vec<Value>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let k = self.next_yield_point();
        let count = tasks.len();
        let mut finished = Vec::with_capacity(count);
        for (kind, input) in tasks {
            finished.push(self.start_task(&kind, input)?);
        }
        self.apply_historic_updates(k)?;

        // First failure in call order fails the batch
        if let Some(failed) = finished
            .iter()
            .flatten()
            .find(|e| e.event_type() == EventType::TaskFailed)
        {
            self.observe(failed);
            return Err(task_error(failed));
        }
        if finished.iter().all(Option::is_some) {
            let mut results = Vec::with_capacity(count);
            for event in finished.into_iter().flatten() {
                self.observe(event);
                results.push(task_output(event));
            }
            return Ok(results);
        }

        self.deliver_updates(k, None)?;
        let pending = finished.iter().filter(|o| o.is_none()).count();
        Err(self.block(format!("Waiting for {} of {} tasks", pending, count)))
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.replay.get_state(key))
    }

    async fn set_raw(&self, key: &str, value: Value) -> Result<()> {
        let state_seq = self.replay.next_state_seq();
        let command = WorkflowCommand::SetState {
            sequence_number: 0,
            key: key.to_string(),
            value: value.clone(),
        };

        if let Some(recorded) = self.replay.get_state_event(state_seq) {
            self.check_replayed(&command, recorded)?;
        } else {
            let sequence = self.next_sequence();
            self.record_command(WorkflowCommand::SetState {
                sequence_number: sequence,
                key: key.to_string(),
                value: value.clone(),
            })?;
        }

        self.replay.set_state(key, value);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let state_seq = self.replay.next_state_seq();

        if let Some(recorded) = self.replay.get_state_event(state_seq) {
            self.check_replayed(
                &WorkflowCommand::ClearState {
                    sequence_number: recorded.sequence_number(),
                    key: key.to_string(),
                },
                recorded,
            )?;
        } else {
            let sequence = self.next_sequence();
            self.record_command(WorkflowCommand::ClearState {
                sequence_number: sequence,
                key: key.to_string(),
            })?;
        }

        self.replay.clear_state(key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        for key in self.replay.state_keys() {
            self.clear(&key).await?;
        }
        Ok(())
    }

    async fn state_keys(&self) -> Result<Vec<String>> {
        Ok(self.replay.state_keys())
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        let k = self.next_yield_point();
        let (timer_id, fired) = self.start_timer(duration)?;
        self.apply_historic_updates(k)?;

        if let Some(fired) = fired {
            self.observe(fired);
            return Ok(());
        }

        self.deliver_updates(k, None)?;
        Err(self.block(format!("Waiting for timer: {}", timer_id)))
    }

    async fn wait_signal_raw(&self, name: &str) -> Result<Value> {
        let k = self.next_yield_point();
        let n = self.replay.next_signal_seq(name);
        let received = self.replay.signal_event(name, n);
        self.apply_historic_updates(k)?;

        if let Some(signal) = received {
            self.observe(signal);
            return Ok(signal.get("value").cloned().unwrap_or(Value::Null));
        }

        self.deliver_updates(k, None)?;
        Err(self.block(format!("Waiting for signal: {}", name)))
    }

    fn set_update_handler_raw(&self, name: &str, handler: UpdateHandler) {
        trace!(workflow_id = %self.workflow_id, update_name = %name, "Update handler installed");
        self.update_handlers
            .write()
            .insert(name.to_string(), handler);
    }

    async fn condition(&self, predicate: &(dyn Fn() -> bool + Send + Sync)) -> Result<()> {
        let k = self.next_yield_point();
        self.apply_historic_updates(k)?;

        if predicate() {
            return Ok(());
        }
        if self.deliver_updates(k, Some(predicate))? {
            return Ok(());
        }
        Err(self.block("Waiting for condition".to_string()))
    }

    async fn condition_with_timeout(
        &self,
        predicate: &(dyn Fn() -> bool + Send + Sync),
        timeout: Duration,
    ) -> Result<bool> {
        let k = self.next_yield_point();

        // The timer exists only if the condition did not already hold
        if predicate() {
            self.apply_historic_updates(k)?;
            return Ok(true);
        }
        let (timer_id, fired) = self.start_timer(timeout)?;
        self.apply_historic_updates(k)?;

        if predicate() {
            return Ok(true);
        }
        if let Some(fired) = fired {
            self.observe(fired);
            return Ok(false);
        }
        if self.deliver_updates(k, Some(predicate))? {
            return Ok(true);
        }
        Err(self.block(format!("Waiting for condition or timer: {}", timer_id)))
    }

    fn is_cancellation_requested(&self) -> bool {
        self.cancellation.read().is_some()
    }

    async fn check_cancellation(&self) -> Result<()> {
        match self.cancellation.read().clone() {
            Some(reason) => Err(CairnError::WorkflowCancelled(reason)),
            None => Ok(()),
        }
    }
}
