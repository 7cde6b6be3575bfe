//! UpdateHandle - a pending update's outcome

use crate::error::{CairnError, Result};
use cairn_core::{RejectionKind, UpdateOutcome};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Handle to an admitted update.
///
/// Returned by [`WorkflowHandle::start_update`](super::WorkflowHandle::start_update)
/// once the engine has queued the update. [`result`](Self::result) waits for
/// the workflow to validate and run it.
pub struct UpdateHandle<O> {
    update_id: String,
    name: String,
    timeout: Duration,
    outcome_rx: oneshot::Receiver<UpdateOutcome>,
    _output: PhantomData<fn() -> O>,
}

impl<O> UpdateHandle<O> {
    pub(crate) fn new(
        update_id: String,
        name: String,
        timeout: Duration,
        outcome_rx: oneshot::Receiver<UpdateOutcome>,
    ) -> Self {
        Self {
            update_id,
            name,
            timeout,
            outcome_rx,
            _output: PhantomData,
        }
    }

    pub fn update_id(&self) -> &str {
        &self.update_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the raw result
    pub async fn result_raw(self) -> Result<Value> {
        let outcome = match tokio::time::timeout(self.timeout, self.outcome_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                return Err(CairnError::Other(format!(
                    "Engine stopped before update '{}' finished",
                    self.update_id
                )))
            }
            Err(_) => {
                return Err(CairnError::Timeout(format!(
                    "Update '{}' ({}) did not finish within {:?}",
                    self.name, self.update_id, self.timeout
                )))
            }
        };
        debug!(update_id = %self.update_id, outcome = outcome.label(), "Update finished");
        outcome_into_result(&self.update_id, &self.name, outcome)
    }
}

impl<O: DeserializeOwned> UpdateHandle<O> {
    /// Wait for the typed result
    pub async fn result(self) -> Result<O> {
        let value = self.result_raw().await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl<O> fmt::Debug for UpdateHandle<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHandle")
            .field("update_id", &self.update_id)
            .field("name", &self.name)
            .finish()
    }
}

/// Map an engine outcome to what the caller sees
pub(crate) fn outcome_into_result(
    update_id: &str,
    name: &str,
    outcome: UpdateOutcome,
) -> Result<Value> {
    match outcome {
        UpdateOutcome::Completed(value) => Ok(value),
        UpdateOutcome::Failed(error) => Err(CairnError::UpdateFailed {
            update_id: update_id.to_string(),
            name: name.to_string(),
            error,
        }),
        UpdateOutcome::Rejected {
            kind: RejectionKind::UnknownUpdate,
            ..
        } => Err(CairnError::UnknownUpdate(name.to_string())),
        UpdateOutcome::Rejected { reason, .. } => Err(CairnError::UpdateRejected {
            update_id: update_id.to_string(),
            name: name.to_string(),
            reason,
        }),
    }
}
