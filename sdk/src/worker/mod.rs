//! Workflow task execution and the registry of workflow kinds

pub mod executor;
pub mod registry;

pub use executor::{ExecutionOptions, WorkflowExecutor, WorkflowStatus, WorkflowTaskResult};
pub use registry::{RegisteredWorkflow, WorkflowRegistry};
