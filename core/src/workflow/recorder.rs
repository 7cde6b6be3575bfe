//! Command recording during a workflow task

use crate::error::DeterminismViolationError;
use crate::worker::determinism::DeterminismValidator;
use crate::workflow::command::WorkflowCommand;
use crate::workflow::event::ReplayEvent;

/// Sink for the commands a workflow task produces.
///
/// Only new calls are recorded. Calls that replay history are passed to
/// [`CommandRecorder::check_replayed`] together with their matching event.
pub trait CommandRecorder: Send + Sync {
    fn record_command(&mut self, command: WorkflowCommand)
        -> Result<(), DeterminismViolationError>;

    fn get_commands(&self) -> Vec<WorkflowCommand>;

    /// Drain the recorded commands
    fn take_commands(&mut self) -> Vec<WorkflowCommand>;

    fn command_count(&self) -> usize {
        self.get_commands().len()
    }

    fn check_replayed(
        &self,
        _command: &WorkflowCommand,
        _event: &ReplayEvent,
    ) -> Result<(), DeterminismViolationError> {
        Ok(())
    }
}

/// Records everything and checks nothing.
#[derive(Debug, Default)]
pub struct CommandCollector {
    commands: Vec<WorkflowCommand>,
}

impl CommandCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandRecorder for CommandCollector {
    fn record_command(
        &mut self,
        command: WorkflowCommand,
    ) -> Result<(), DeterminismViolationError> {
        self.commands.push(command);
        Ok(())
    }

    fn get_commands(&self) -> Vec<WorkflowCommand> {
        self.commands.clone()
    }

    fn take_commands(&mut self) -> Vec<WorkflowCommand> {
        std::mem::take(&mut self.commands)
    }

    fn command_count(&self) -> usize {
        self.commands.len()
    }
}

/// A [`CommandCollector`] that also validates replayed calls.
#[derive(Debug, Default)]
pub struct ValidatingCommandRecorder {
    validator: DeterminismValidator,
    inner: CommandCollector,
}

impl ValidatingCommandRecorder {
    pub fn new(validator: DeterminismValidator) -> Self {
        Self {
            validator,
            inner: CommandCollector::new(),
        }
    }
}

impl CommandRecorder for ValidatingCommandRecorder {
    fn record_command(
        &mut self,
        command: WorkflowCommand,
    ) -> Result<(), DeterminismViolationError> {
        self.inner.record_command(command)
    }

    fn get_commands(&self) -> Vec<WorkflowCommand> {
        self.inner.get_commands()
    }

    fn take_commands(&mut self) -> Vec<WorkflowCommand> {
        self.inner.take_commands()
    }

    fn command_count(&self) -> usize {
        self.inner.command_count()
    }

    fn check_replayed(
        &self,
        command: &WorkflowCommand,
        event: &ReplayEvent,
    ) -> Result<(), DeterminismViolationError> {
        self.validator.validate_command(command, Some(event))
    }
}
