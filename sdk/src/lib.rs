//! Cairn SDK for Rust
//!
//! Durable workflows that survive restarts by replaying their code against an
//! event history. Workflows schedule tasks, sleep on durable timers, wait for
//! signals and accept updates: synchronous requests that are validated,
//! recorded and answered exactly once.
//!
//! The SDK ships an in-process engine ([`engine::WorkflowEngine`]) that
//! persists history through a [`engine::HistoryStore`], and a client
//! ([`client::WorkflowClient`]) to start workflows and send them updates.

#![allow(clippy::result_large_err)]

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod payload;
pub mod task;
pub mod worker;
pub mod workflow;

/// Testing utilities for workflows and tasks.
/// Available only with the `testing` feature enabled.
#[cfg(feature = "testing")]
pub mod testing;

pub use error::{CairnError, DeterminismViolationError, Result};

pub use payload::{Binary, Payload};

pub use config::{ConfigError, EngineConfig, TaskExecutorConfig, WorkflowExecutorConfig};

pub use client::{
    StartWorkflowOptions, UpdateHandle, UpdateOptions, WorkflowClient, WorkflowHandle,
};
pub use engine::{ExecutionRecord, HistoryStore, InMemoryHistoryStore, WorkflowEngine};

pub use workflow::command::WorkflowCommand;
pub use workflow::context::{WorkflowContext, WorkflowContextExt};
pub use workflow::context_impl::WorkflowContextImpl;
pub use workflow::definition::{DynamicWorkflow, WorkflowDefinition};
pub use workflow::event::{EventType, ReplayEvent};
pub use workflow::recorder::{CommandCollector, CommandRecorder, ValidatingCommandRecorder};
pub use workflow::update::{UpdateDefinition, UpdateHandler};

pub use task::context::{LogLevel, TaskContext};
pub use task::context_impl::TaskContextImpl;
pub use task::definition::{DynamicTask, RetryConfig, TaskDefinition};
pub use task::registry::{RegisteredTask, TaskMetadata, TaskRegistry};

pub use worker::executor::{ExecutionOptions, WorkflowExecutor, WorkflowStatus, WorkflowTaskResult};
pub use worker::registry::{RegisteredWorkflow, WorkflowRegistry};

pub use cairn_core::{
    DeterminismValidator, RejectionKind, UpdateOutcome, UpdateRequest, UpdateStage,
    WorkflowMetadata,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{
        StartWorkflowOptions, UpdateHandle, UpdateOptions, WorkflowClient, WorkflowHandle,
    };
    pub use crate::config::EngineConfig;
    pub use crate::engine::{InMemoryHistoryStore, WorkflowEngine};
    pub use crate::error::{CairnError, Result};
    pub use crate::task::context::{LogLevel, TaskContext};
    pub use crate::task::definition::{DynamicTask, RetryConfig, TaskDefinition};
    pub use crate::task::registry::TaskRegistry;
    pub use crate::worker::executor::WorkflowStatus;
    pub use crate::worker::registry::WorkflowRegistry;
    pub use crate::workflow::context::{WorkflowContext, WorkflowContextExt};
    pub use crate::workflow::definition::{DynamicWorkflow, WorkflowDefinition};
    pub use crate::workflow::event::{EventType, ReplayEvent};
    pub use crate::workflow::update::{UpdateDefinition, UpdateHandler};
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{json, Map, Value};
    pub use uuid::Uuid;
}
