//! Cancellation E2E tests

use crate::{test_env, with_timeout};
use cairn_sdk::client::StartWorkflowOptions;
use cairn_sdk::error::CairnError;
use cairn_sdk::workflow::event::EventType;
use cairn_sdk::WorkflowStatus;
use serde_json::json;

#[tokio::test]
async fn test_cancel_waiting_workflow() {
    with_timeout("test_cancel_waiting_workflow", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("wait-forever-workflow", json!({}), StartWorkflowOptions::new())
            .await
            .unwrap();

        handle.cancel("operator request").await.unwrap();
        // A second request before the workflow notices is a no-op
        handle.cancel("operator request").await.unwrap();

        let err = handle.result_raw().await.unwrap_err();
        assert!(
            matches!(err, CairnError::WorkflowCancelled(ref reason) if reason == "operator request"),
            "{:?}",
            err
        );
        assert_eq!(
            handle.describe().await.unwrap().status,
            WorkflowStatus::Cancelled
        );

        let history = handle.history().await.unwrap();
        let requested = history
            .iter()
            .filter(|e| e.event_type() == EventType::CancellationRequested)
            .count();
        assert_eq!(requested, 1);
        assert_eq!(
            history.last().map(|e| e.event_type()),
            Some(EventType::WorkflowCancelled)
        );

        let err = handle.cancel("again").await.unwrap_err();
        assert!(matches!(err, CairnError::WorkflowClosed(_)));
    })
    .await;
}

#[tokio::test]
async fn test_uncancellable_workflow() {
    with_timeout("test_uncancellable_workflow", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("uncancellable-workflow", json!({}), StartWorkflowOptions::new())
            .await
            .unwrap();

        let err = handle.cancel("please").await.unwrap_err();
        assert!(matches!(err, CairnError::InvalidInput(_)));
        assert!(!handle.describe().await.unwrap().status.is_terminal());
    })
    .await;
}

#[tokio::test]
async fn test_duplicate_workflow_id_while_running() {
    with_timeout("test_duplicate_workflow_id_while_running", async {
        let env = test_env();
        let options = StartWorkflowOptions::new().with_workflow_id("only-one");
        env.client()
            .start_workflow("wait-forever-workflow", json!({}), options.clone())
            .await
            .unwrap();

        let err = env
            .client()
            .start_workflow("wait-forever-workflow", json!({}), options)
            .await
            .unwrap_err();
        assert!(matches!(err, CairnError::WorkflowAlreadyStarted(_)));
    })
    .await;
}
