use thiserror::Error;
use toolrun_model::{ErrorKind as ModelErrorKind, ModelProviderError};

use crate::tool::ToolFault;

/// An error that aborts an agent run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model request failed, or its stream broke before producing
    /// anything usable.
    #[error("model request failed: {0}")]
    Model(Box<dyn ModelProviderError>),
    /// A tool hit an internal fault it could not report in-band.
    #[error(transparent)]
    Tool(#[from] ToolFault),
}

impl AgentError {
    /// Returns the model error kind if this error came from the model.
    pub fn model_error_kind(&self) -> Option<ModelErrorKind> {
        match self {
            AgentError::Model(err) => Some(err.kind()),
            AgentError::Tool(_) => None,
        }
    }
}

/// An error in the agent configuration, reported by
/// [`AgentBuilder::build`](crate::AgentBuilder::build).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Two tools were registered with the same name.
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),
}
