//! Payload encoding E2E tests

use crate::fixtures::workflows::DEADBEEF;
use crate::{test_env, with_timeout};
use cairn_sdk::client::StartWorkflowOptions;
use cairn_sdk::payload::{Binary, ENCODING_BINARY};
use cairn_sdk::workflow::event::EventType;
use serde_json::json;

#[tokio::test]
async fn test_binary_output_round_trips() {
    with_timeout("test_binary_output_round_trips", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("binary-output-workflow", json!(null), StartWorkflowOptions::new())
            .await
            .unwrap();

        let bytes: Binary = handle.result().await.unwrap();
        assert_eq!(bytes.into_inner(), DEADBEEF.to_vec());

        let payload = handle.result_payload().await.unwrap();
        assert_eq!(payload.encoding(), Some(ENCODING_BINARY));
        assert_eq!(payload.data, DEADBEEF.to_vec());

        let history = handle.history().await.unwrap();
        let completed = history.last().unwrap();
        assert_eq!(completed.event_type(), EventType::WorkflowCompleted);
        assert_eq!(
            completed.get("output").cloned().unwrap(),
            json!({"metadata": {"encoding": "binary/plain"}, "data": "3q2+7w=="})
        );
    })
    .await;
}

#[tokio::test]
async fn test_json_output_reads_as_json_payload() {
    with_timeout("test_json_output_reads_as_json_payload", async {
        let env = test_env();
        let handle = env
            .client()
            .start_workflow("greeting-workflow", json!({"name": "Ada"}), StartWorkflowOptions::new())
            .await
            .unwrap();
        handle.signal("name", "Ada").await.unwrap();

        let payload = handle.result_payload().await.unwrap();
        assert!(!payload.is_binary());
        assert_eq!(payload.decode_json().unwrap(), json!({"greeting": "Hello, Ada!"}));
        assert_eq!(payload.decode_json().unwrap(), handle.result_raw().await.unwrap());
    })
    .await;
}
