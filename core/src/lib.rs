//! # Cairn Core
//!
//! Language-agnostic building blocks for durable workflow execution.
//!
//! A workflow runs by replaying its code against an append-only event history.
//! Every workflow task turns the code's calls into [`WorkflowCommand`]s; the
//! runtime persists them as [`ReplayEvent`]s. This crate holds the pieces that
//! do not depend on a particular SDK:
//!
//! - [`workflow`] - events, commands, the replay engine and update protocol types
//! - [`worker`] - determinism validation
//! - [`task`] - task results and retry backoff
//! - [`error`] - core error types

pub mod error;
pub mod task;
pub mod worker;
pub mod workflow;

pub use error::{CoreError, CoreResult, DeterminismViolationError};

pub use task::{calculate_backoff, should_retry, BackoffConfig, TaskExecutionResult};

pub use worker::{DeterminismValidationResult, DeterminismValidator};

pub use workflow::{
    CommandCollector, CommandRecorder, DeterministicRandom, EventLookup, EventType, RejectionKind,
    ReplayEngine, ReplayEvent, SeededRandom, UpdateOutcome, UpdateRequest, UpdateStage,
    ValidatingCommandRecorder, WorkflowCommand, WorkflowMetadata,
};
