//! Helpers for executing a workflow against its history

use crate::workflow::event::{EventType, ReplayEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// What the engine knows about a registered workflow kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    pub kind: String,
    /// Display name, defaults to the kind
    pub name: String,
    pub description: Option<String>,
    /// `false` makes `cancel` fail with an invalid-input error
    pub cancellable: bool,
}

impl WorkflowMetadata {
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            name: kind.clone(),
            kind,
            description: None,
            cancellable: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_cancellable(mut self, cancellable: bool) -> Self {
        self.cancellable = cancellable;
        self
    }
}

/// Random values a workflow may use without breaking replay.
///
/// Implementations are seeded from the execution ID, so every replay of an
/// execution draws the same sequence.
pub trait DeterministicRandom: Send + Sync {
    /// Integer in `[min, max)`, or `min` for an empty range
    fn next_int(&self, min: i32, max: i32) -> i32;

    /// Long in `[min, max)`, or `min` for an empty range
    fn next_long(&self, min: i64, max: i64) -> i64;

    /// Double in `[0, 1)`
    fn next_double(&self) -> f64;

    fn next_bool(&self) -> bool;
}

/// xorshift64 generator.
pub struct SeededRandom {
    state: Mutex<u64>,
}

impl SeededRandom {
    // xorshift never leaves zero
    const ZERO_SEED_REPLACEMENT: u64 = 0x9E37_79B9_7F4A_7C15;

    pub fn new(seed: u64) -> Self {
        let seed = if seed == 0 {
            Self::ZERO_SEED_REPLACEMENT
        } else {
            seed
        };
        Self {
            state: Mutex::new(seed),
        }
    }

    fn next_u64(&self) -> u64 {
        let mut state = self.state.lock();
        let mut x = *state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        *state = x;
        x
    }

    fn below(&self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

impl DeterministicRandom for SeededRandom {
    fn next_int(&self, min: i32, max: i32) -> i32 {
        self.next_long(min as i64, max as i64) as i32
    }

    fn next_long(&self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        min.wrapping_add(self.below(max.wrapping_sub(min) as u64) as i64)
    }

    fn next_double(&self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn next_bool(&self) -> bool {
        self.next_u64() & 1 == 0
    }
}

/// Searches over a replay history.
pub struct EventLookup;

impl EventLookup {
    fn latest<'a>(
        events: &'a [ReplayEvent],
        matches: impl Fn(&ReplayEvent) -> bool,
    ) -> Option<&'a ReplayEvent> {
        events
            .iter()
            .filter(|e| matches(e))
            .max_by_key(|e| e.sequence_number())
    }

    /// Latest TaskCompleted or TaskFailed for a task execution
    pub fn find_terminal_task_event<'a>(
        events: &'a [ReplayEvent],
        task_execution_id: &str,
    ) -> Option<&'a ReplayEvent> {
        Self::latest(events, |e| {
            e.event_type().is_task_terminal()
                && e.get_string("taskExecutionId") == Some(task_execution_id)
        })
    }

    pub fn find_terminal_timer_event<'a>(
        events: &'a [ReplayEvent],
        timer_id: &str,
    ) -> Option<&'a ReplayEvent> {
        Self::latest(events, |e| {
            e.event_type() == EventType::TimerFired && e.get_string("timerId") == Some(timer_id)
        })
    }

    /// UpdateCompleted or UpdateFailed for an update. There is at most one.
    pub fn find_update_outcome<'a>(
        events: &'a [ReplayEvent],
        update_id: &str,
    ) -> Option<&'a ReplayEvent> {
        events.iter().find(|e| {
            e.event_type().is_update_terminal() && e.get_string("updateId") == Some(update_id)
        })
    }

    pub fn filter_events_by_type(events: &[ReplayEvent], event_type: EventType) -> Vec<ReplayEvent> {
        Self::filter_events_by_types(events, &[event_type])
    }

    pub fn filter_events_by_types(
        events: &[ReplayEvent],
        event_types: &[EventType],
    ) -> Vec<ReplayEvent> {
        events
            .iter()
            .filter(|e| event_types.contains(&e.event_type()))
            .cloned()
            .collect()
    }
}
