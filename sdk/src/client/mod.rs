//! Client handles for starting workflows and talking to running ones

pub mod options;
pub mod update_handle;
pub mod workflow_client;
pub mod workflow_handle;

pub use options::{StartWorkflowOptions, UpdateOptions};
pub use update_handle::UpdateHandle;
pub use workflow_client::WorkflowClient;
pub use workflow_handle::WorkflowHandle;
