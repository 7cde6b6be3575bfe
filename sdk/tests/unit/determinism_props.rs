//! Replay determinism properties
//!
//! **Same workflow code + same history = same commands.** A workflow driven to
//! completion and then replayed against its full history must reach the same
//! output without producing anything new.

use crate::{complete_open_tasks, persist, started};
use cairn_sdk::workflow::context::WorkflowContext;
use cairn_sdk::workflow::event::ReplayEvent;
use cairn_sdk::{WorkflowExecutor, WorkflowStatus, WorkflowTaskResult};
use proptest::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

/// Schedules one task per kind, in order, recording a marker operation
/// after every task.
async fn run_sequence(kinds: Vec<String>, history: Vec<ReplayEvent>, execution_id: Uuid) -> WorkflowTaskResult {
    WorkflowExecutor::new("prop-wf".to_string(), execution_id, json!(null), history)
        .execute(move |ctx, _input| async move {
            let mut results = Vec::new();
            for (i, kind) in kinds.iter().enumerate() {
                let result = ctx.schedule_raw(kind, json!(i)).await?;
                ctx.run_raw(&format!("after-{}", i), json!(i)).await?;
                results.push(result);
            }
            Ok(Value::Array(results))
        })
        .await
}

fn task_result(kind: &str, input: &Value) -> Value {
    json!(format!("{}:{}", kind, input))
}

/// Play engine: run tasks until the workflow closes
fn drive(kinds: &[String], execution_id: Uuid) -> (Vec<ReplayEvent>, WorkflowTaskResult) {
    let mut history = started(json!(null));
    for _ in 0..=kinds.len() + 1 {
        let result = block_on(run_sequence(kinds.to_vec(), history.clone(), execution_id));
        persist(&mut history, &result.commands);
        if result.status.is_terminal() {
            return (history, result);
        }
        complete_open_tasks(&mut history, task_result);
    }
    panic!("workflow did not complete for {:?}", kinds);
}

fn arb_kinds() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{3,8}", 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_driven_workflow_completes_with_task_results(kinds in arb_kinds()) {
        let (_, result) = drive(&kinds, Uuid::new_v4());

        let expected: Vec<Value> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| task_result(kind, &json!(i)))
            .collect();
        prop_assert_eq!(result.status, WorkflowStatus::Completed);
        prop_assert_eq!(result.output, Some(Value::Array(expected)));
    }

    #[test]
    fn prop_full_replay_produces_no_commands(kinds in arb_kinds()) {
        let execution_id = Uuid::new_v4();
        let (history, first) = drive(&kinds, execution_id);

        let replayed = block_on(run_sequence(kinds.clone(), history, execution_id));
        prop_assert_eq!(replayed.status, WorkflowStatus::Completed);
        prop_assert!(replayed.commands.is_empty(), "{:?}", replayed.commands);
        prop_assert_eq!(replayed.output, first.output);
    }

    #[test]
    fn prop_same_history_same_commands(kinds in arb_kinds(), completed in 0usize..6) {
        let execution_id = Uuid::new_v4();
        let mut history = started(json!(null));

        // Advance a few tasks into the workflow
        for _ in 0..completed.min(kinds.len()) {
            let result = block_on(run_sequence(kinds.clone(), history.clone(), execution_id));
            persist(&mut history, &result.commands);
            complete_open_tasks(&mut history, task_result);
        }

        let a = block_on(run_sequence(kinds.clone(), history.clone(), execution_id));
        let b = block_on(run_sequence(kinds.clone(), history, execution_id));
        prop_assert_eq!(a.commands, b.commands);
        prop_assert_eq!(a.status, b.status);
    }

    #[test]
    fn prop_changed_task_kind_is_detected(kinds in arb_kinds(), pick in any::<prop::sample::Index>()) {
        let execution_id = Uuid::new_v4();
        let (history, _) = drive(&kinds, execution_id);

        let mut changed = kinds.clone();
        let position = pick.index(changed.len());
        changed[position] = format!("{}-v2", changed[position]);

        let replayed = block_on(run_sequence(changed, history, execution_id));
        prop_assert_eq!(replayed.status, WorkflowStatus::Failed);
        prop_assert_eq!(replayed.failure_type.as_deref(), Some("DETERMINISM_VIOLATION"));
    }
}
