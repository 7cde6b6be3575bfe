//! TaskContextImpl - context for one task attempt

use crate::error::{CairnError, Result};
use crate::task::context::{LogLevel, TaskContext};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Concrete [`TaskContext`]. The cancellation flag is shared with the engine.
pub struct TaskContextImpl {
    task_execution_id: String,
    workflow_id: String,
    attempt: u32,
    cancelled: Arc<AtomicBool>,
}

impl TaskContextImpl {
    pub fn new(
        task_execution_id: impl Into<String>,
        workflow_id: impl Into<String>,
        attempt: u32,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            task_execution_id: task_execution_id.into(),
            workflow_id: workflow_id.into(),
            attempt,
            cancelled,
        }
    }
}

#[async_trait]
impl TaskContext for TaskContextImpl {
    fn task_execution_id(&self) -> &str {
        &self.task_execution_id
    }

    fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    fn attempt(&self) -> u32 {
        self.attempt
    }

    fn log(&self, level: LogLevel, message: &str) {
        let id = &self.task_execution_id;
        let attempt = self.attempt;
        match level {
            LogLevel::Debug => debug!(task_execution_id = %id, attempt, "{}", message),
            LogLevel::Info => info!(task_execution_id = %id, attempt, "{}", message),
            LogLevel::Warn => warn!(task_execution_id = %id, attempt, "{}", message),
            LogLevel::Error => error!(task_execution_id = %id, attempt, "{}", message),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn check_cancellation(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CairnError::TaskCancelled)
        } else {
            Ok(())
        }
    }
}
