//! Property tests for replay and update delivery
//!
//! These drive [`WorkflowExecutor`](cairn_sdk::WorkflowExecutor) directly,
//! playing the engine's part by turning commands into history by hand.

mod determinism_props;
mod update_props;

use cairn_sdk::workflow::command::WorkflowCommand;
use cairn_sdk::workflow::event::{EventType, ReplayEvent};
use chrono::Utc;
use serde_json::{json, Value};

/// Append the events produced by `commands`, numbering them after `history`
pub fn persist(history: &mut Vec<ReplayEvent>, commands: &[WorkflowCommand]) {
    for command in commands {
        let next = history.len() as i32 + 1;
        if let Some(event) = command.to_event(next, Utc::now()) {
            history.push(event);
        }
    }
}

/// History holding only the start event
pub fn started(input: Value) -> Vec<ReplayEvent> {
    vec![ReplayEvent::new(
        1,
        EventType::WorkflowStarted,
        json!({"workflowKind": "prop", "input": input}),
        Utc::now(),
    )]
}

/// Record a completion event for every task scheduled but not yet finished
pub fn complete_open_tasks(history: &mut Vec<ReplayEvent>, result: impl Fn(&str, &Value) -> Value) {
    let open: Vec<(String, String, Value)> = history
        .iter()
        .filter(|e| e.event_type() == EventType::TaskScheduled)
        .filter_map(|e| {
            let id = e.get_string("taskExecutionId")?.to_string();
            let done = history.iter().any(|t| {
                t.event_type().is_task_terminal() && t.get_string("taskExecutionId") == Some(id.as_str())
            });
            if done {
                None
            } else {
                Some((
                    id,
                    e.get_string("kind").unwrap_or_default().to_string(),
                    e.get("input").cloned().unwrap_or(Value::Null),
                ))
            }
        })
        .collect();

    for (id, kind, input) in open {
        let next = history.len() as i32 + 1;
        history.push(ReplayEvent::new(
            next,
            EventType::TaskCompleted,
            json!({"taskExecutionId": id, "result": result(&kind, &input)}),
            Utc::now(),
        ));
    }
}
