//! Replay E2E tests
//!
//! A fresh engine over the same store rebuilds workflow state from history,
//! including the effects of updates accepted before the restart.

use crate::fixtures::workflows::INCREMENT;
use crate::{test_env, with_timeout};
use cairn_sdk::client::StartWorkflowOptions;
use cairn_sdk::error::CairnError;
use cairn_sdk::workflow::context::WorkflowContext;
use cairn_sdk::workflow::event::EventType;
use cairn_sdk::WorkflowStatus;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[tokio::test]
async fn test_updates_replayed_after_restart() {
    with_timeout("test_updates_replayed_after_restart", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow(
                "counter-workflow",
                json!({"target": 3}),
                StartWorkflowOptions::new().with_workflow_id("counter-restart"),
            )
            .await
            .unwrap();
        assert_eq!(handle.execute_update(&INCREMENT, 1).await.unwrap(), 1);
        assert_eq!(handle.execute_update(&INCREMENT, 1).await.unwrap(), 2);

        assert_eq!(env.restart().await.unwrap(), 1);

        // The handler sees the replayed total, not a fresh counter
        let handle = env.client().workflow_handle("counter-restart");
        assert_eq!(handle.execute_update(&INCREMENT, 1).await.unwrap(), 3);

        let output: Value = handle.result().await.unwrap();
        assert_eq!(output["total"], json!(3));
        assert_eq!(output["recorded"]["total"], json!(3));

        let history = handle.history().await.unwrap();
        let accepted: Vec<i64> = history
            .iter()
            .filter(|e| e.event_type() == EventType::UpdateAccepted)
            .filter_map(|e| e.get("args").and_then(Value::as_i64))
            .collect();
        assert_eq!(accepted, vec![1, 1, 1]);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_timer_survives_restart() {
    with_timeout("test_timer_survives_restart", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow(
                "timer-workflow",
                json!({"sleepMs": 5000}),
                StartWorkflowOptions::new().with_workflow_id("timer-restart"),
            )
            .await
            .unwrap();
        env.time_controller().advance(Duration::ZERO).await;

        assert_eq!(env.restart().await.unwrap(), 1);

        let handle = env.client().workflow_handle(handle.workflow_id());
        assert_eq!(handle.result_raw().await.unwrap(), json!({"sleptMs": 5000}));

        let history = handle.history().await.unwrap();
        let fired = history
            .iter()
            .filter(|e| e.event_type() == EventType::TimerFired)
            .count();
        assert_eq!(fired, 1);
    })
    .await;
}

#[tokio::test]
async fn test_restart_with_nothing_open() {
    let env = test_env();
    assert_eq!(env.restart().await.unwrap(), 0);
}

static USE_NEW_CODE: AtomicBool = AtomicBool::new(false);

/// Changing workflow code under a running execution fails it on replay.
#[tokio::test]
async fn test_code_change_is_determinism_violation() {
    with_timeout("test_code_change_is_determinism_violation", async {
        let env = test_env();
        env.register_workflow_fn("changing-workflow", |ctx, _input| async move {
            if USE_NEW_CODE.load(Ordering::SeqCst) {
                ctx.schedule_raw("record-total", json!(1)).await?;
            } else {
                ctx.schedule_raw("uppercase", json!("old")).await?;
            }
            ctx.wait_signal_raw("go").await
        })
        .unwrap();

        let handle = env
            .client()
            .start_workflow("changing-workflow", json!(null), StartWorkflowOptions::new())
            .await
            .unwrap();

        // Wait until the first version has scheduled its task
        loop {
            let history = handle.history().await.unwrap();
            if history
                .iter()
                .any(|e| e.event_type() == EventType::TaskScheduled)
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        USE_NEW_CODE.store(true, Ordering::SeqCst);
        // The task completion may already have replayed the new code
        let _ = handle.signal("go", json!(null)).await;

        let err = handle.result_raw().await.unwrap_err();
        match err {
            CairnError::WorkflowFailed(msg) => {
                assert!(msg.contains("Determinism violation"), "{}", msg)
            }
            other => panic!("expected determinism failure, got {:?}", other),
        }
        assert_eq!(
            handle.describe().await.unwrap().status,
            WorkflowStatus::Failed
        );
    })
    .await;
}
