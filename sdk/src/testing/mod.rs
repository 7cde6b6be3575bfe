//! Testing utilities
//!
//! [`TestWorkflowEnvironment`] runs a real [`WorkflowEngine`](crate::engine::WorkflowEngine)
//! over an in-memory store, so tests exercise the same replay and update paths
//! as production code. [`TimeController`] drives tokio's paused clock to fire
//! durable timers without waiting.

mod test_environment;
mod time_controller;

pub use test_environment::TestWorkflowEnvironment;
pub use time_controller::TimeController;
