//! Tasks: side-effecting work scheduled by workflows

pub mod context;
pub mod context_impl;
pub mod definition;
pub mod registry;

pub use context::{LogLevel, TaskContext};
pub use context_impl::TaskContextImpl;
pub use definition::{DynamicTask, RetryConfig, TaskDefinition};
pub use registry::{RegisteredTask, TaskMetadata, TaskRegistry};
