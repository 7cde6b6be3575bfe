//! Signal E2E tests

use crate::fixtures::workflows::FAN_OUT;
use crate::{test_env, with_timeout};
use cairn_sdk::client::StartWorkflowOptions;
use cairn_sdk::error::CairnError;
use cairn_sdk::workflow::event::EventType;
use serde_json::json;

#[tokio::test]
async fn test_signal_completes_waiting_workflow() {
    with_timeout("test_signal_completes_waiting_workflow", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("greeting-workflow", json!({}), StartWorkflowOptions::new())
            .await
            .unwrap();

        handle.signal("name", "Ada").await.unwrap();
        let output = handle.result_raw().await.unwrap();
        assert_eq!(output, json!({"greeting": "Hello, Ada!"}));
    })
    .await;
}

/// Signals sent before the workflow reaches its wait are not lost.
#[tokio::test]
async fn test_signals_with_tasks() {
    with_timeout("test_signals_with_tasks", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow(
                "signal-task-workflow",
                json!({"count": 3}),
                StartWorkflowOptions::new().with_workflow_id("signals-and-tasks"),
            )
            .await
            .unwrap();

        for item in ["alpha", "beta", "gamma"] {
            handle.signal("item", item).await.unwrap();
        }

        let output = handle.result_raw().await.unwrap();
        assert_eq!(output, json!({"processed": ["ALPHA", "BETA", "GAMMA"]}));

        let history = handle.history().await.unwrap();
        let scheduled = history
            .iter()
            .filter(|e| e.event_type() == EventType::TaskScheduled)
            .count();
        assert_eq!(scheduled, 3);
    })
    .await;
}

/// One signal fans out to a batch of concurrent tasks.
#[tokio::test]
async fn test_signal_fans_out_to_tasks() {
    with_timeout("test_signal_fans_out_to_tasks", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow(
                "signal-fan-out-workflow",
                (),
                StartWorkflowOptions::new().with_workflow_id("signal-fan-out"),
            )
            .await
            .unwrap();

        handle.signal("mySignal", ()).await.unwrap();
        assert_eq!(handle.result::<i64>().await.unwrap(), 6 * FAN_OUT as i64);

        let history = handle.history().await.unwrap();
        let count = |t: EventType| history.iter().filter(|e| e.event_type() == t).count();
        assert_eq!(count(EventType::TaskScheduled), FAN_OUT);
        assert_eq!(count(EventType::TaskCompleted), FAN_OUT);

        // The whole batch is scheduled in one workflow task
        let first = history
            .iter()
            .position(|e| e.event_type() == EventType::TaskScheduled)
            .unwrap();
        assert!(history[first..first + FAN_OUT]
            .iter()
            .all(|e| e.event_type() == EventType::TaskScheduled));
    })
    .await;
}

#[tokio::test]
async fn test_signal_closed_workflow() {
    with_timeout("test_signal_closed_workflow", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("greeting-workflow", json!({}), StartWorkflowOptions::new())
            .await
            .unwrap();
        handle.signal("name", "Grace").await.unwrap();
        handle.result_raw().await.unwrap();

        let err = handle.signal("name", "late").await.unwrap_err();
        assert!(matches!(err, CairnError::WorkflowClosed(_)));
    })
    .await;
}
