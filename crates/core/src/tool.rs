//! Tool call supports.

pub(crate) mod catalog;
mod dispatcher;
mod error;
mod object;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use catalog::{Catalog, ToolDefinition};
pub use error::{Error, ErrorKind, ToolFault};
pub(crate) use object::{AnyTool, ToolObject};

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as the working directory. To do
/// this, make the context an immutable state of the tool, which can be set
/// during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    ///
    /// Arguments from the model are deserialized into this type before
    /// [`Tool::execute`] is called. If that fails, the model receives an
    /// invalid input error and the tool is not run.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    ///
    /// Errors of kind [`ErrorKind::InvalidInput`] and
    /// [`ErrorKind::ExecutionError`] are shown to the model, errors of kind
    /// [`ErrorKind::Internal`] abort the agent run.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}
