//! Workflow definitions: typed, and untyped over JSON objects

use crate::error::Result;
use crate::workflow::context::WorkflowContext;
use async_trait::async_trait;
use cairn_core::WorkflowMetadata;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// A workflow kind with typed input and output.
///
/// `execute` is re-run from the start on every workflow task. For the same
/// history it must make the same context calls in the same order; anything
/// else is reported as a determinism violation.
#[async_trait]
pub trait WorkflowDefinition: Send + Sync {
    type Input: Serialize + DeserializeOwned + JsonSchema + Send;
    type Output: Serialize + DeserializeOwned + JsonSchema + Send;

    /// Registry key, used by `start_workflow`
    fn kind(&self) -> &str;

    async fn execute(&self, ctx: &dyn WorkflowContext, input: Self::Input) -> Result<Self::Output>;

    fn name(&self) -> &str {
        self.kind()
    }

    fn description(&self) -> Option<&str> {
        None
    }

    /// Uncancellable workflows refuse `cancel` and run to completion
    fn cancellable(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Option<Value> {
        Some(generate_schema::<Self::Input>())
    }

    fn output_schema(&self) -> Option<Value> {
        Some(generate_schema::<Self::Output>())
    }

    fn metadata(&self) -> WorkflowMetadata {
        let metadata = WorkflowMetadata::new(self.kind())
            .with_name(self.name())
            .with_cancellable(self.cancellable());
        match self.description() {
            Some(description) => metadata.with_description(description),
            None => metadata,
        }
    }
}

/// JSON Schema for `T`; `Null` if the schema does not serialize.
pub fn generate_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

pub type DynamicInput = Map<String, Value>;
pub type DynamicOutput = Map<String, Value>;

/// Workflow over plain JSON objects. Implementing it also implements
/// [`WorkflowDefinition`], without schemas unless overridden.
#[async_trait]
pub trait DynamicWorkflow: Send + Sync {
    fn kind(&self) -> &str;

    async fn execute(
        &self,
        ctx: &dyn WorkflowContext,
        input: DynamicInput,
    ) -> Result<DynamicOutput>;

    fn name(&self) -> &str {
        self.kind()
    }

    fn description(&self) -> Option<&str> {
        None
    }

    fn cancellable(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Option<Value> {
        None
    }

    fn output_schema(&self) -> Option<Value> {
        None
    }
}

#[async_trait]
impl<T: DynamicWorkflow> WorkflowDefinition for T {
    type Input = DynamicInput;
    type Output = DynamicOutput;

    fn kind(&self) -> &str {
        DynamicWorkflow::kind(self)
    }

    async fn execute(&self, ctx: &dyn WorkflowContext, input: Self::Input) -> Result<Self::Output> {
        DynamicWorkflow::execute(self, ctx, input).await
    }

    fn name(&self) -> &str {
        DynamicWorkflow::name(self)
    }

    fn description(&self) -> Option<&str> {
        DynamicWorkflow::description(self)
    }

    fn cancellable(&self) -> bool {
        DynamicWorkflow::cancellable(self)
    }

    fn input_schema(&self) -> Option<Value> {
        DynamicWorkflow::input_schema(self)
    }

    fn output_schema(&self) -> Option<Value> {
        DynamicWorkflow::output_schema(self)
    }
}
