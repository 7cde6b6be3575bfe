//! Update delivery properties
//!
//! Accepted updates are applied exactly once, in order, and their effects
//! are rebuilt from history on replay. Rejected updates leave no history.

use crate::{persist, started};
use cairn_sdk::error::CairnError;
use cairn_sdk::workflow::command::WorkflowCommand;
use cairn_sdk::workflow::context::WorkflowContext;
use cairn_sdk::workflow::event::{EventType, ReplayEvent};
use cairn_sdk::{UpdateHandler, UpdateRequest, WorkflowExecutor, WorkflowStatus, WorkflowTaskResult};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

/// Sums positive "add" updates until a "finish" update arrives, then
/// returns the applied values in order.
async fn run_ledger(
    history: Vec<ReplayEvent>,
    pending: Vec<UpdateRequest>,
    execution_id: Uuid,
) -> WorkflowTaskResult {
    WorkflowExecutor::new("ledger".to_string(), execution_id, json!(null), history)
        .with_pending_updates(pending)
        .execute(|ctx, _input| async move {
            let applied = Arc::new(Mutex::new(Vec::<i64>::new()));
            let finished = Arc::new(Mutex::new(false));

            let log = Arc::clone(&applied);
            ctx.set_update_handler_raw(
                "add",
                UpdateHandler::new_raw(move |args: Value| {
                    let n = args.as_i64().unwrap_or_default();
                    let mut log = log.lock();
                    log.push(n);
                    Ok(json!(log.iter().sum::<i64>()))
                })
                .with_validator_raw(|args: &Value| match args.as_i64() {
                    Some(n) if n > 0 => Ok(()),
                    _ => Err(CairnError::Other("must be positive".to_string())),
                }),
            );
            let flag = Arc::clone(&finished);
            ctx.set_update_handler_raw(
                "finish",
                UpdateHandler::new_raw(move |_args: Value| {
                    *flag.lock() = true;
                    Ok(Value::Null)
                }),
            );

            let watched = Arc::clone(&finished);
            ctx.condition(&move || *watched.lock()).await?;

            let applied = applied.lock().clone();
            Ok(json!(applied))
        })
        .await
}

fn requests(values: &[i64]) -> Vec<UpdateRequest> {
    let mut requests: Vec<UpdateRequest> = values
        .iter()
        .enumerate()
        .map(|(i, n)| UpdateRequest::new(format!("add-{}", i), "add", json!(n)))
        .collect();
    requests.push(UpdateRequest::new("finish", "finish", Value::Null));
    requests
}

fn count(commands: &[WorkflowCommand], pred: impl Fn(&WorkflowCommand) -> bool) -> usize {
    commands.iter().filter(|c| pred(c)).count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_accepted_updates_applied_in_order(values in prop::collection::vec(-5i64..20, 0..12)) {
        let execution_id = Uuid::new_v4();
        let result = block_on(run_ledger(started(json!(null)), requests(&values), execution_id));

        let positives: Vec<i64> = values.iter().copied().filter(|n| *n > 0).collect();
        prop_assert_eq!(result.status, WorkflowStatus::Completed);
        prop_assert_eq!(result.output, Some(json!(positives)));

        let accepted = count(&result.commands, |c| matches!(c, WorkflowCommand::AcceptUpdate { .. }));
        let rejected = count(&result.commands, |c| matches!(c, WorkflowCommand::RejectUpdate { .. }));
        prop_assert_eq!(accepted, positives.len() + 1);
        prop_assert_eq!(rejected, values.len() - positives.len());
        prop_assert_eq!(result.delivered_updates.len(), values.len() + 1);
    }

    #[test]
    fn prop_replay_rebuilds_update_effects(values in prop::collection::vec(-5i64..20, 0..12)) {
        let execution_id = Uuid::new_v4();
        let mut history = started(json!(null));
        let first = block_on(run_ledger(history.clone(), requests(&values), execution_id));
        persist(&mut history, &first.commands);

        // Rejections are never persisted
        let persisted_accepts = history
            .iter()
            .filter(|e| e.event_type() == EventType::UpdateAccepted)
            .count();
        let positives = values.iter().filter(|n| **n > 0).count();
        prop_assert_eq!(persisted_accepts, positives + 1);

        let replayed = block_on(run_ledger(history, Vec::new(), execution_id));
        prop_assert_eq!(replayed.status, WorkflowStatus::Completed);
        prop_assert!(replayed.commands.is_empty(), "{:?}", replayed.commands);
        prop_assert_eq!(replayed.output, first.output);
    }

    #[test]
    fn prop_updates_split_across_tasks_match_single_task(
        values in prop::collection::vec(1i64..20, 1..8),
        split in any::<prop::sample::Index>(),
    ) {
        let execution_id = Uuid::new_v4();
        let all = requests(&values);
        let cut = split.index(values.len());

        // First task sees only a prefix of the adds; the rest arrive later
        let mut history = started(json!(null));
        let early = block_on(run_ledger(history.clone(), all[..cut].to_vec(), execution_id));
        prop_assert_eq!(early.status, WorkflowStatus::Suspended);
        persist(&mut history, &early.commands);

        let late = block_on(run_ledger(history, all[cut..].to_vec(), execution_id));
        prop_assert_eq!(late.status, WorkflowStatus::Completed);
        prop_assert_eq!(late.output, Some(json!(values)));
    }
}
