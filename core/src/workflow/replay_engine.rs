//! ReplayEngine - replay bookkeeping for one workflow task.
//!
//! History is pre-filtered into per-type lists. Every workflow call takes the
//! next position in its list through a per-type counter; if an event exists at
//! that position the call is a replay, otherwise it is new.
//!
//! ```ignore
//! let engine = ReplayEngine::new(events);
//!
//! let seq = engine.next_task_seq();
//! if let Some(event) = engine.get_task_event(seq) {
//!     // replaying: look up the terminal event for this task
//! } else {
//!     // new: record a ScheduleTask command
//! }
//! ```
//!
//! Update acceptances are not matched by counter. They are keyed by the
//! yield point at which they were applied ([`ReplayEngine::updates_at_yield_point`]).

use crate::workflow::event::{EventType, ReplayEvent};
use crate::workflow::execution::EventLookup;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

pub struct ReplayEngine {
    task_events: Vec<ReplayEvent>,
    timer_events: Vec<ReplayEvent>,
    operation_events: Vec<ReplayEvent>,
    state_events: Vec<ReplayEvent>,
    signal_events: HashMap<String, Vec<ReplayEvent>>,
    update_events: Vec<ReplayEvent>,

    all_events: Vec<ReplayEvent>,

    next_task_seq: AtomicU32,
    next_timer_seq: AtomicU32,
    next_operation_seq: AtomicU32,
    next_state_seq: AtomicU32,
    next_signal_seq: Mutex<HashMap<String, u32>>,

    // Starts empty; replayed set/clear calls rebuild it in program order.
    state: RwLock<HashMap<String, Value>>,
}

impl ReplayEngine {
    /// Create a new ReplayEngine from the execution history.
    pub fn new(events: Vec<ReplayEvent>) -> Self {
        let task_events = EventLookup::filter_events_by_type(&events, EventType::TaskScheduled);
        let timer_events = EventLookup::filter_events_by_type(&events, EventType::TimerStarted);
        let operation_events =
            EventLookup::filter_events_by_type(&events, EventType::OperationCompleted);
        let state_events = EventLookup::filter_events_by_types(
            &events,
            &[EventType::StateSet, EventType::StateCleared],
        );
        let update_events = EventLookup::filter_events_by_type(&events, EventType::UpdateAccepted);

        let mut signal_events: HashMap<String, Vec<ReplayEvent>> = HashMap::new();
        for event in events
            .iter()
            .filter(|e| e.event_type() == EventType::SignalReceived)
        {
            let name = event.get_string("signalName").unwrap_or_default().to_string();
            signal_events.entry(name).or_default().push(event.clone());
        }

        Self {
            task_events,
            timer_events,
            operation_events,
            state_events,
            signal_events,
            update_events,
            all_events: events,
            next_task_seq: AtomicU32::new(0),
            next_timer_seq: AtomicU32::new(0),
            next_operation_seq: AtomicU32::new(0),
            next_state_seq: AtomicU32::new(0),
            next_signal_seq: Mutex::new(HashMap::new()),
            state: RwLock::new(HashMap::new()),
        }
    }

    // =========================================================================
    // Sequence Management
    // =========================================================================

    /// Get next task sequence number and increment.
    pub fn next_task_seq(&self) -> u32 {
        self.next_task_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get next timer sequence number and increment.
    pub fn next_timer_seq(&self) -> u32 {
        self.next_timer_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get next operation sequence number and increment.
    pub fn next_operation_seq(&self) -> u32 {
        self.next_operation_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get next state sequence number and increment.
    pub fn next_state_seq(&self) -> u32 {
        self.next_state_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the next position for a signal name and increment.
    pub fn next_signal_seq(&self, name: &str) -> u32 {
        let mut counters = self.next_signal_seq.lock();
        let counter = counters.entry(name.to_string()).or_insert(0);
        let seq = *counter;
        *counter += 1;
        seq
    }

    // =========================================================================
    // Event Lookup
    // =========================================================================

    /// Get the task event at the given sequence index (if replaying).
    pub fn get_task_event(&self, seq: u32) -> Option<&ReplayEvent> {
        self.task_events.get(seq as usize)
    }

    /// Get the timer event at the given sequence index (if replaying).
    pub fn get_timer_event(&self, seq: u32) -> Option<&ReplayEvent> {
        self.timer_events.get(seq as usize)
    }

    /// Get the operation event at the given sequence index (if replaying).
    pub fn get_operation_event(&self, seq: u32) -> Option<&ReplayEvent> {
        self.operation_events.get(seq as usize)
    }

    /// Get the state event at the given sequence index (if replaying).
    pub fn get_state_event(&self, seq: u32) -> Option<&ReplayEvent> {
        self.state_events.get(seq as usize)
    }

    /// The n-th SignalReceived event with this name.
    pub fn signal_event(&self, name: &str, n: u32) -> Option<&ReplayEvent> {
        self.signal_events
            .get(name)
            .and_then(|events| events.get(n as usize))
    }

    /// UpdateAccepted events applied at yield point `k`, in history order.
    pub fn updates_at_yield_point(&self, k: u32) -> Vec<&ReplayEvent> {
        self.update_events
            .iter()
            .filter(|e| e.get_i64("yieldPoint") == Some(k as i64))
            .collect()
    }

    /// IDs of every update accepted in history.
    pub fn accepted_update_ids(&self) -> HashSet<String> {
        self.update_events
            .iter()
            .filter_map(|e| e.get_string("updateId").map(str::to_string))
            .collect()
    }

    /// Reason of the first CancellationRequested event, if any.
    pub fn cancellation_reason(&self) -> Option<String> {
        self.all_events
            .iter()
            .find(|e| e.event_type() == EventType::CancellationRequested)
            .map(|e| {
                e.get_string("reason")
                    .unwrap_or("Cancellation requested")
                    .to_string()
            })
    }

    // =========================================================================
    // Terminal Event Lookup
    // =========================================================================

    /// Find terminal event (TaskCompleted or TaskFailed) for a task by execution ID.
    pub fn find_terminal_task_event(&self, task_execution_id: &str) -> Option<&ReplayEvent> {
        EventLookup::find_terminal_task_event(&self.all_events, task_execution_id)
    }

    /// Find the TimerFired event for a timer by ID.
    pub fn find_terminal_timer_event(&self, timer_id: &str) -> Option<&ReplayEvent> {
        EventLookup::find_terminal_timer_event(&self.all_events, timer_id)
    }

    /// Find the UpdateCompleted or UpdateFailed event for an update.
    pub fn find_update_outcome(&self, update_id: &str) -> Option<&ReplayEvent> {
        EventLookup::find_update_outcome(&self.all_events, update_id)
    }

    // =========================================================================
    // State Management
    // =========================================================================

    /// Get a value from workflow state.
    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.state.read().get(key).cloned()
    }

    /// Set a value in workflow state.
    pub fn set_state(&self, key: &str, value: Value) {
        self.state.write().insert(key.to_string(), value);
    }

    /// Clear a specific key from workflow state.
    pub fn clear_state(&self, key: &str) {
        self.state.write().remove(key);
    }

    /// Get all keys in workflow state, sorted.
    pub fn state_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}
