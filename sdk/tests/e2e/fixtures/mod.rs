//! Workflow and task definitions shared by the e2e tests

pub mod tasks;

#[allow(unused_imports)]
pub use tasks::*;
#[allow(unused_imports)]
pub use workflows::*;
