//! Core logic of the agent: tool catalog, tool dispatch and the agent loop.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod error;
mod model_client;
pub mod tool;

pub use agent::{Agent, AgentBuilder, AgentCallbacks, FALLBACK_RESPONSE};
pub use error::{AgentError, CatalogError};
pub use tool::{Tool, ToolResult};
