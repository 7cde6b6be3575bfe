//! Update E2E tests
//!
//! Updates are validated, accepted into history and answered exactly once.

use crate::fixtures::workflows::{SelfUpdateWorkflow, INCREMENT, MY_UPDATE};
use crate::{test_env, with_timeout};
use cairn_sdk::client::{StartWorkflowOptions, UpdateOptions};
use cairn_sdk::engine::WORKFLOW_CLOSED;
use cairn_sdk::error::CairnError;
use cairn_sdk::workflow::event::EventType;
use cairn_sdk::WorkflowStatus;
use serde_json::{json, Value};

fn count_events(history: &[cairn_sdk::ReplayEvent], event_type: EventType) -> usize {
    history.iter().filter(|e| e.event_type() == event_type).count()
}

/// A rejected update leaves no trace in history; an accepted one sets the
/// state the workflow is waiting on.
#[tokio::test]
async fn test_update_rejected_then_accepted() {
    with_timeout("test_update_rejected_then_accepted", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("update-workflow", (), StartWorkflowOptions::new())
            .await
            .unwrap();

        let err = handle
            .execute_update(&MY_UPDATE, "reject-me".to_string())
            .await
            .unwrap_err();
        assert!(err.is_update_failure());
        match err {
            CairnError::UpdateRejected { name, reason, .. } => {
                assert_eq!(name, "myUpdate");
                assert_eq!(reason, "Invalid Update argument");
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        let result = handle
            .execute_update(&MY_UPDATE, "update-arg".to_string())
            .await
            .unwrap();
        assert_eq!(result, "update-result");

        let output: String = handle.result().await.unwrap();
        assert_eq!(output, "update-arg");

        let history = handle.history().await.unwrap();
        assert_eq!(count_events(&history, EventType::UpdateAccepted), 1);
        assert_eq!(count_events(&history, EventType::UpdateCompleted), 1);
        let accepted = history
            .iter()
            .find(|e| e.event_type() == EventType::UpdateAccepted)
            .unwrap();
        assert_eq!(accepted.get("args"), Some(&json!("update-arg")));
        assert_eq!(
            handle.describe().await.unwrap().status,
            WorkflowStatus::Completed
        );
    })
    .await;
}

/// `start_update` returns after admission; the result is awaited separately.
#[tokio::test]
async fn test_start_update_then_await_result() {
    with_timeout("test_start_update_then_await_result", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("update-workflow", (), StartWorkflowOptions::new())
            .await
            .unwrap();

        let update = handle
            .start_update(
                &MY_UPDATE,
                "async-arg".to_string(),
                UpdateOptions::new().with_update_id("async-1"),
            )
            .await
            .unwrap();
        assert_eq!(update.update_id(), "async-1");

        assert_eq!(update.result().await.unwrap(), "update-result");
        assert_eq!(handle.result::<String>().await.unwrap(), "async-arg");
    })
    .await;
}

/// A task sends an update to the workflow that scheduled it.
#[tokio::test]
async fn test_update_sent_from_task() {
    with_timeout("test_update_sent_from_task", async {
        let env = test_env();
        env.register_workflow(SelfUpdateWorkflow).unwrap();

        let client = env.client();
        env.register_task_fn("send-self-update", move |_ctx, input| {
            let client = client.clone();
            async move {
                let workflow_id = input["workflowId"].as_str().unwrap_or_default().to_string();
                let result = client
                    .workflow_handle(workflow_id)
                    .execute_update(&MY_UPDATE, "from-task".to_string())
                    .await?;
                Ok(json!(result))
            }
        })
        .unwrap();

        let handle = env
            .client()
            .start_workflow("self-update-workflow", (), StartWorkflowOptions::new())
            .await
            .unwrap();
        let output: Value = handle.result().await.unwrap();
        assert_eq!(
            output,
            json!({"taskResult": "update-result", "state": "from-task"})
        );
    })
    .await;
}

/// Requests sharing an update ID resolve to one outcome and one history entry.
#[tokio::test]
async fn test_duplicate_update_id_runs_once() {
    with_timeout("test_duplicate_update_id_runs_once", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow(
                "counter-workflow",
                json!({"target": 10}),
                StartWorkflowOptions::new(),
            )
            .await
            .unwrap();

        let options = UpdateOptions::new().with_update_id("inc-1");
        let first = handle
            .start_update(&INCREMENT, 4, options.clone())
            .await
            .unwrap();
        let second = handle.start_update(&INCREMENT, 4, options).await.unwrap();
        assert_eq!(first.result().await.unwrap(), 4);
        assert_eq!(second.result().await.unwrap(), 4);

        // Asking again after completion returns the recorded outcome
        let again = handle
            .start_update(&INCREMENT, 4, UpdateOptions::new().with_update_id("inc-1"))
            .await
            .unwrap();
        assert_eq!(again.result().await.unwrap(), 4);

        assert_eq!(handle.execute_update(&INCREMENT, 6).await.unwrap(), 10);
        let output: Value = handle.result().await.unwrap();
        assert_eq!(output["total"], json!(10));

        let history = handle.history().await.unwrap();
        assert_eq!(count_events(&history, EventType::UpdateAccepted), 2);
    })
    .await;
}

#[tokio::test]
async fn test_unknown_update_name() {
    with_timeout("test_unknown_update_name", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("update-workflow", (), StartWorkflowOptions::new())
            .await
            .unwrap();

        let err = handle
            .execute_update_raw("noSuchUpdate", json!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CairnError::UnknownUpdate(name) if name == "noSuchUpdate"));

        // The workflow is unaffected
        handle
            .execute_update(&MY_UPDATE, "still-alive".to_string())
            .await
            .unwrap();
        assert_eq!(handle.result::<String>().await.unwrap(), "still-alive");
    })
    .await;
}

/// A failing handler fails the update, not the workflow.
#[tokio::test]
async fn test_handler_failure_fails_update_only() {
    with_timeout("test_handler_failure_fails_update_only", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("fallible-update-workflow", json!({}), StartWorkflowOptions::new())
            .await
            .unwrap();

        let err = handle
            .execute_update_raw("finish", json!({"fail": true}))
            .await
            .unwrap_err();
        match err {
            CairnError::UpdateFailed { error, .. } => {
                assert!(error.contains("handler refused to finish"), "{}", error)
            }
            other => panic!("expected handler failure, got {:?}", other),
        }

        let result = handle
            .execute_update_raw("finish", json!({"fail": false}))
            .await
            .unwrap();
        assert_eq!(result, json!("finished"));
        assert_eq!(handle.result_raw().await.unwrap(), json!({"done": true}));

        let history = handle.history().await.unwrap();
        assert_eq!(count_events(&history, EventType::UpdateAccepted), 2);
        assert_eq!(count_events(&history, EventType::UpdateFailed), 1);
        assert_eq!(count_events(&history, EventType::UpdateCompleted), 1);
    })
    .await;
}

/// Validation failures are rejections and are not recorded.
#[tokio::test]
async fn test_validator_rejects_bad_increment() {
    with_timeout("test_validator_rejects_bad_increment", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow(
                "counter-workflow",
                json!({"target": 2}),
                StartWorkflowOptions::new(),
            )
            .await
            .unwrap();

        let err = handle.execute_update(&INCREMENT, -5).await.unwrap_err();
        assert!(matches!(
            err,
            CairnError::UpdateRejected { ref reason, .. } if reason == "increment must be positive"
        ));

        // Arguments of the wrong type never reach the handler
        let err = handle
            .execute_update_raw("increment", json!("three"))
            .await
            .unwrap_err();
        assert!(matches!(err, CairnError::UpdateRejected { .. }));

        assert_eq!(handle.execute_update(&INCREMENT, 2).await.unwrap(), 2);
        let output: Value = handle.result().await.unwrap();
        assert_eq!(output["total"], json!(2));
        assert_eq!(output["recorded"]["total"], json!(2));

        let history = handle.history().await.unwrap();
        assert_eq!(count_events(&history, EventType::UpdateAccepted), 1);
    })
    .await;
}

#[tokio::test]
async fn test_update_after_completion_is_rejected() {
    with_timeout("test_update_after_completion_is_rejected", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("update-workflow", (), StartWorkflowOptions::new())
            .await
            .unwrap();
        handle
            .execute_update(&MY_UPDATE, "done".to_string())
            .await
            .unwrap();
        handle.result::<String>().await.unwrap();

        let err = handle
            .execute_update(&MY_UPDATE, "late".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CairnError::UpdateRejected { ref reason, .. } if reason == WORKFLOW_CLOSED
        ));
    })
    .await;
}

/// Two updates queued before the first workflow task: the condition holds
/// after the first, so the workflow completes and the second is rejected.
#[tokio::test]
async fn test_queued_update_rejected_when_workflow_completes() {
    with_timeout("test_queued_update_rejected_when_workflow_completes", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow(
                "update-workflow",
                (),
                StartWorkflowOptions::new().with_workflow_id("queued-updates"),
            )
            .await
            .unwrap();

        // The current-thread runtime has not yet run the dispatcher
        let first = handle
            .start_update(&MY_UPDATE, "first".to_string(), UpdateOptions::new())
            .await
            .unwrap();
        let second = handle
            .start_update(&MY_UPDATE, "second".to_string(), UpdateOptions::new())
            .await
            .unwrap();

        assert_eq!(first.result().await.unwrap(), "update-result");
        let err = second.result().await.unwrap_err();
        assert!(matches!(
            err,
            CairnError::UpdateRejected { ref reason, .. }
                if reason == cairn_sdk::engine::CLOSED_BEFORE_DELIVERY
        ));
        assert_eq!(handle.result::<String>().await.unwrap(), "first");
    })
    .await;
}

#[tokio::test]
async fn test_update_to_unknown_workflow() {
    let env = test_env();
    let err = env
        .client()
        .workflow_handle("does-not-exist")
        .execute_update(&MY_UPDATE, "x".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, CairnError::WorkflowNotFound(_)));
}
