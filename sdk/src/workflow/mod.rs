//! Workflow types and execution

pub mod context;
pub mod context_impl;
pub mod definition;
pub mod update;

pub use cairn_core::workflow::command;
pub use cairn_core::workflow::event;
pub use cairn_core::workflow::recorder;

pub use context::{WorkflowContext, WorkflowContextExt};
pub use context_impl::WorkflowContextImpl;
pub use definition::{DynamicWorkflow, WorkflowDefinition};
pub use update::{UpdateDefinition, UpdateHandler};
