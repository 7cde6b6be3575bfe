//! Determinism validation for workflow replay

use crate::error::DeterminismViolationError;
use crate::workflow::command::WorkflowCommand;
use crate::workflow::event::{EventType, ReplayEvent};

/// Result of validating a whole run against history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeterminismValidationResult {
    /// Every command matched its history event
    Valid,
    /// The first mismatch found
    Violation(DeterminismViolationError),
}

impl DeterminismValidationResult {
    /// Check if the result is valid
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Compares commands regenerated during replay with recorded history.
#[derive(Debug, Clone, Default)]
pub struct DeterminismValidator;

impl DeterminismValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a command against the event at the same per-type position.
    ///
    /// A missing event means the command is new and always passes.
    pub fn validate_command(
        &self,
        command: &WorkflowCommand,
        event: Option<&ReplayEvent>,
    ) -> Result<(), DeterminismViolationError> {
        let Some(event) = event else {
            return Ok(());
        };
        let Some(expected_type) = command.event_type() else {
            return Ok(());
        };

        let sequence = event.sequence_number();
        if event.event_type() != expected_type {
            return Err(DeterminismViolationError::TypeMismatch {
                sequence,
                expected: event.event_type(),
                actual: expected_type,
            });
        }

        let recorded = |key: &str| event.get_string(key).unwrap_or_default().to_string();

        match command {
            WorkflowCommand::RecordOperation { operation_name, .. } => {
                let expected = recorded("operationName");
                if &expected != operation_name {
                    return Err(DeterminismViolationError::OperationNameMismatch {
                        sequence,
                        expected,
                        actual: operation_name.clone(),
                    });
                }
            }
            WorkflowCommand::ScheduleTask { kind, .. } => {
                let expected = recorded("kind");
                if &expected != kind {
                    return Err(DeterminismViolationError::TaskTypeMismatch {
                        sequence,
                        expected,
                        actual: kind.clone(),
                    });
                }
            }
            WorkflowCommand::StartTimer { timer_id, .. } => {
                let expected = recorded("timerId");
                if &expected != timer_id {
                    return Err(DeterminismViolationError::TimerIdMismatch {
                        sequence,
                        expected,
                        actual: timer_id.clone(),
                    });
                }
            }
            WorkflowCommand::SetState { key, .. } | WorkflowCommand::ClearState { key, .. } => {
                let expected = recorded("key");
                if &expected != key {
                    return Err(DeterminismViolationError::StateKeyMismatch {
                        sequence,
                        expected,
                        actual: key.clone(),
                    });
                }
            }
            WorkflowCommand::AcceptUpdate {
                update_id,
                update_name,
                ..
            } => {
                let expected = recorded("updateName");
                if &expected != update_name {
                    return Err(DeterminismViolationError::UpdateNameMismatch {
                        sequence,
                        expected,
                        actual: update_name.clone(),
                    });
                }
                let expected = recorded("updateId");
                if &expected != update_id {
                    return Err(DeterminismViolationError::UpdateIdMismatch {
                        sequence,
                        expected,
                        actual: update_id.clone(),
                    });
                }
            }
            WorkflowCommand::CompleteUpdate { update_id, .. }
            | WorkflowCommand::FailUpdate { update_id, .. } => {
                let expected = recorded("updateId");
                if &expected != update_id {
                    return Err(DeterminismViolationError::UpdateIdMismatch {
                        sequence,
                        expected,
                        actual: update_id.clone(),
                    });
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Validate a full command list against history.
    ///
    /// Commands are paired in order with command-generated events; suspension
    /// markers on either side are skipped. Commands beyond history are new.
    pub fn validate_history(
        &self,
        commands: &[WorkflowCommand],
        events: &[ReplayEvent],
    ) -> DeterminismValidationResult {
        let mut recorded = events
            .iter()
            .filter(|e| e.event_type().is_command_generated());

        for command in commands {
            match command.event_type() {
                None | Some(EventType::WorkflowSuspended) => continue,
                Some(_) => {}
            }
            let event = recorded.next();
            if let Err(violation) = self.validate_command(command, event) {
                return DeterminismValidationResult::Violation(violation);
            }
        }

        DeterminismValidationResult::Valid
    }
}
