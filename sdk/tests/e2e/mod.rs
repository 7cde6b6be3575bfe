//! End-to-end tests for cairn-sdk
//!
//! Every test drives a real in-process engine through the client, using the
//! `testing` feature's [`TestWorkflowEnvironment`].
//!
//! ```bash
//! RUST_LOG=cairn_sdk=debug cargo test --test e2e -p cairn-sdk
//! ```

mod cancellation_tests;
mod data_converter_tests;
mod fixtures;
mod replay_tests;
mod signal_tests;
mod timer_tests;
mod update_tests;

use cairn_sdk::testing::TestWorkflowEnvironment;
use fixtures::tasks::{RecordTotalTask, SixTask, UppercaseTask};
use fixtures::workflows::{
    BinaryOutputWorkflow, CounterWorkflow, FallibleUpdateWorkflow, GreetingWorkflow, SignalFanOutWorkflow,
    SignalTaskWorkflow, SleepForeverWorkflow, TimerWorkflow, UpdateOrTimeoutWorkflow,
    UpdateWorkflow, WaitForeverWorkflow,
};
use std::future::Future;
use std::time::Duration;

/// Upper bound for a single test
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

static TRACING_INITIALIZED: std::sync::Once = std::sync::Once::new();

fn init_tracing() {
    TRACING_INITIALIZED.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_test_writer()
            .try_init();
    });
}

/// Environment with every fixture registered
pub fn test_env() -> TestWorkflowEnvironment {
    init_tracing();

    let env = TestWorkflowEnvironment::new().expect("default config is valid");
    env.register_workflow(UpdateWorkflow).unwrap();
    env.register_workflow(BinaryOutputWorkflow).unwrap();
    env.register_workflow(CounterWorkflow).unwrap();
    env.register_workflow(FallibleUpdateWorkflow).unwrap();
    env.register_workflow(GreetingWorkflow).unwrap();
    env.register_workflow(SignalTaskWorkflow).unwrap();
    env.register_workflow(SignalFanOutWorkflow).unwrap();
    env.register_workflow(SleepForeverWorkflow).unwrap();
    env.register_workflow(TimerWorkflow).unwrap();
    env.register_workflow(UpdateOrTimeoutWorkflow).unwrap();
    env.register_workflow(WaitForeverWorkflow { cancellable: true }).unwrap();
    env.register_workflow(WaitForeverWorkflow { cancellable: false }).unwrap();
    env.register_task(UppercaseTask).unwrap();
    env.register_task(RecordTotalTask).unwrap();
    env.register_task(SixTask).unwrap();
    env
}

/// Run a test body with a timeout so a stuck workflow fails loudly
pub async fn with_timeout<F, T>(name: &str, future: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, future).await {
        Ok(result) => result,
        Err(_) => panic!("Test '{}' timed out after {:?}", name, TEST_TIMEOUT),
    }
}
