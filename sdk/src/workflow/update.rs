//! Update definitions and handlers
//!
//! An [`UpdateDefinition`] names an update and fixes its argument and result
//! types. The same constant is used by the workflow to install a handler and by
//! the client to send the update:
//!
//! ```ignore
//! const MY_UPDATE: UpdateDefinition<String, String> = UpdateDefinition::new("myUpdate");
//!
//! // workflow side
//! ctx.set_update_handler_with_validator(&MY_UPDATE, handler, validator);
//!
//! // client side
//! let result = handle.execute_update(&MY_UPDATE, "update-arg".to_string()).await?;
//! ```

use crate::error::{CairnError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Erased update handler. Runs synchronously against in-memory workflow state.
pub type UpdateFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Erased update validator. Must not mutate workflow state.
pub type ValidatorFn = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

/// Typed name of an update.
pub struct UpdateDefinition<I, O> {
    name: &'static str,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> UpdateDefinition<I, O> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _types: PhantomData,
        }
    }

    /// The update name as registered on the workflow
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<I, O> Clone for UpdateDefinition<I, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, O> Copy for UpdateDefinition<I, O> {}

impl<I, O> fmt::Debug for UpdateDefinition<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateDefinition")
            .field("name", &self.name)
            .finish()
    }
}

/// A handler plus its optional validator, as installed on a workflow.
#[derive(Clone)]
pub struct UpdateHandler {
    handler: UpdateFn,
    args_check: Option<ValidatorFn>,
    validator: Option<ValidatorFn>,
}

impl UpdateHandler {
    /// Handler over raw JSON arguments
    pub fn new_raw<F>(handler: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            args_check: None,
            validator: None,
        }
    }

    /// Handler over typed arguments.
    ///
    /// Arguments that do not deserialize into `I` are rejected at validation.
    pub fn typed<I, O, F>(handler: F) -> Self
    where
        I: DeserializeOwned + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> Result<O> + Send + Sync + 'static,
    {
        let handler: UpdateFn = Arc::new(move |args: Value| {
            let input: I = serde_json::from_value(args)?;
            let output = handler(input)?;
            Ok(serde_json::to_value(output)?)
        });
        let args_check: ValidatorFn = Arc::new(|args: &Value| {
            serde_json::from_value::<I>(args.clone())
                .map(|_| ())
                .map_err(|e| CairnError::InvalidInput(e.to_string()))
        });
        Self {
            handler,
            args_check: Some(args_check),
            validator: None,
        }
    }

    /// Attach a validator over raw JSON arguments
    pub fn with_validator_raw<V>(mut self, validator: V) -> Self
    where
        V: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Attach a validator over typed arguments
    pub fn with_validator<I, V>(mut self, validator: V) -> Self
    where
        I: DeserializeOwned + 'static,
        V: Fn(&I) -> Result<()> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(move |args: &Value| {
            let input: I = serde_json::from_value(args.clone())
                .map_err(|e| CairnError::InvalidInput(e.to_string()))?;
            validator(&input)
        }));
        self
    }

    /// Whether a user validator is installed
    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    /// Run admission checks. An error means the update is rejected.
    pub fn validate(&self, args: &Value) -> Result<()> {
        if let Some(check) = &self.args_check {
            check(args)?;
        }
        match &self.validator {
            Some(validator) => validator(args),
            None => Ok(()),
        }
    }

    /// Run the handler
    pub fn handle(&self, args: Value) -> Result<Value> {
        (self.handler)(args)
    }
}

impl fmt::Debug for UpdateHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHandler")
            .field("handler", &"<function>")
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}
