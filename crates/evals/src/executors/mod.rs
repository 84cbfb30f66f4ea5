//! Executors turn a dataset input into an output the evaluators can score.

mod multi_turn;
mod single_turn;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use toolrun_model::ModelProvider;

use crate::EvalError;
pub use multi_turn::{
    DEFAULT_MAX_STEPS, MultiTurnExecutor, MultiTurnResult, StepRecord,
    ToolResultRecord,
};
pub use single_turn::{SingleTurnExecutor, SingleTurnResult};

/// Runs the input of one case.
#[async_trait]
pub trait Executor: Send + Sync {
    /// The case input.
    type Data: Send + Sync;
    /// What the evaluators receive.
    type Output: Send + Sync;

    /// Runs one case.
    async fn execute(
        &self,
        data: &Self::Data,
    ) -> Result<Self::Output, EvalError>;
}

/// Creates the model provider for a case.
///
/// `model` is the model the case asks for, if any. Closures of the form
/// `Fn(Option<&str>) -> P` are factories.
pub trait ProviderFactory: Send + Sync {
    /// The provider type.
    type Provider: ModelProvider + 'static;

    /// Creates a provider.
    fn create(&self, model: Option<&str>) -> Self::Provider;
}

impl<F, P> ProviderFactory for F
where
    F: Fn(Option<&str>) -> P + Send + Sync,
    P: ModelProvider + 'static,
{
    type Provider = P;

    #[inline]
    fn create(&self, model: Option<&str>) -> P {
        self(model)
    }
}

/// A tool call as the model requested it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    /// The tool name.
    pub tool_name: String,
    /// The arguments.
    pub args: Value,
}
