use std::path::PathBuf;

use thiserror::Error;
use toolrun_core::{AgentError, CatalogError};

/// Anything that stops a case, or the whole eval run.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The dataset file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The dataset path.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The dataset is not valid JSON of the expected shape.
    #[error("invalid dataset: {0}")]
    Dataset(#[from] serde_json::Error),

    /// A case can't be turned into a conversation.
    #[error("invalid case: {0}")]
    InvalidCase(String),

    /// The eval run is not set up correctly.
    #[error("configuration error: {0}")]
    Config(String),

    /// The tools of a case clash.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The agent run failed.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The judge answered with something that is not a verdict.
    #[error("unusable judge reply: {0}")]
    Judge(String),
}
