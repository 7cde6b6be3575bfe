//! Timer E2E tests
//!
//! These run on tokio's paused clock, which jumps ahead whenever every task
//! is idle, so durable timers fire without real waiting.

use crate::fixtures::workflows::MY_UPDATE;
use crate::{test_env, with_timeout};
use cairn_sdk::client::StartWorkflowOptions;
use cairn_sdk::error::CairnError;
use cairn_sdk::workflow::event::EventType;
use cairn_sdk::WorkflowStatus;
use serde_json::json;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_durable_timer_sleep() {
    with_timeout("test_durable_timer_sleep", async {
        let env = test_env();
        let started = tokio::time::Instant::now();
        let handle = env
            .client()
            .start_workflow(
                "timer-workflow",
                json!({"sleepMs": 2000}),
                StartWorkflowOptions::new(),
            )
            .await
            .unwrap();

        let output = handle.result_raw().await.unwrap();
        assert_eq!(output, json!({"sleptMs": 2000}));
        assert!(started.elapsed() >= Duration::from_millis(2000));

        let types: Vec<EventType> = handle
            .history()
            .await
            .unwrap()
            .iter()
            .map(|e| e.event_type())
            .collect();
        assert!(types.contains(&EventType::TimerStarted));
        assert!(types.contains(&EventType::TimerFired));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_timer_advanced_by_time_controller() {
    let env = test_env();
    let handle = env
        .client()
        .start_workflow(
            "timer-workflow",
            json!({"sleepMs": 60_000}),
            StartWorkflowOptions::new(),
        )
        .await
        .unwrap();

    // Let the first workflow task run and arm its timer
    let time = env.time_controller();
    time.advance(Duration::ZERO).await;

    time.advance(Duration::from_secs(61)).await;
    assert!(time.elapsed() >= Duration::from_secs(61));
    assert_eq!(handle.result_raw().await.unwrap(), json!({"sleptMs": 60000}));
}

/// The condition times out when no update arrives in time.
#[tokio::test(start_paused = true)]
async fn test_condition_times_out() {
    with_timeout("test_condition_times_out", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow(
                "update-or-timeout-workflow",
                json!({"timeoutMs": 500}),
                StartWorkflowOptions::new(),
            )
            .await
            .unwrap();

        let output = handle.result_raw().await.unwrap();
        assert_eq!(output, json!({"updated": false, "state": ""}));
    })
    .await;
}

/// An update arriving before the timer fires satisfies the condition.
#[tokio::test(start_paused = true)]
async fn test_condition_satisfied_by_update_before_timeout() {
    with_timeout("test_condition_satisfied_by_update_before_timeout", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow(
                "update-or-timeout-workflow",
                json!({"timeoutMs": 60_000}),
                StartWorkflowOptions::new(),
            )
            .await
            .unwrap();

        let result = handle
            .execute_update(&MY_UPDATE, "in-time".to_string())
            .await
            .unwrap();
        assert_eq!(result, "update-result");

        let output = handle.result_raw().await.unwrap();
        assert_eq!(output, json!({"updated": true, "state": "in-time"}));
    })
    .await;
}

/// `Duration::MAX` keeps the workflow asleep instead of wrapping to zero.
#[tokio::test(start_paused = true)]
async fn test_sleep_forever_stays_asleep() {
    let env = test_env();
    let handle = env
        .client()
        .start_workflow("sleep-forever-workflow", (), StartWorkflowOptions::new())
        .await
        .unwrap();

    let time = env.time_controller();
    time.advance(Duration::ZERO).await;
    time.advance(Duration::from_secs(3600)).await;

    assert_eq!(
        handle.describe().await.unwrap().status,
        WorkflowStatus::Suspended
    );
    let history = handle.history().await.unwrap();
    let started = history
        .iter()
        .find(|e| e.event_type() == EventType::TimerStarted)
        .unwrap();
    assert_eq!(started.get_i64("durationMs"), Some(i64::MAX));
    assert!(!history
        .iter()
        .any(|e| e.event_type() == EventType::TimerFired));

    handle.cancel("done waiting").await.unwrap();
    let err = handle.result_raw().await.unwrap_err();
    assert!(matches!(err, CairnError::WorkflowCancelled(_)), "{:?}", err);
}
