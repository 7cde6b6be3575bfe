//! Workflow module - commands, events, replay and the update protocol

pub mod command;
pub mod event;
pub mod execution;
pub mod recorder;
pub mod replay_engine;
pub mod update;

pub use command::WorkflowCommand;
pub use event::{EventType, ReplayEvent};
pub use execution::{DeterministicRandom, EventLookup, SeededRandom, WorkflowMetadata};
pub use recorder::{CommandCollector, CommandRecorder, ValidatingCommandRecorder};
pub use replay_engine::ReplayEngine;
pub use update::{RejectionKind, UpdateOutcome, UpdateRequest, UpdateStage};
