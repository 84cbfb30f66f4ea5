use std::sync::Arc;

use toolrun_model::{ModelProvider, ModelTool};

use super::{Agent, AgentConfig};
use crate::CatalogError;
use crate::model_client::ModelClient;
use crate::tool::catalog::Executor;
use crate::tool::{AnyTool, Catalog, Tool};

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    system_prompt: String,
    tools: Vec<Executor>,
    max_steps: Option<usize>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: String::new(),
            tools: vec![],
            max_steps: None,
        }
    }

    /// Sets the system prompt that starts every run.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Registers a tool executed locally.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Executor::Local(Box::new(AnyTool(tool))));
        self
    }

    /// Declares a tool the model provider executes by itself. The agent
    /// only tells the model about it.
    #[inline]
    pub fn with_provider_tool(mut self, tool: ModelTool) -> Self {
        self.tools.push(Executor::Provider(tool));
        self
    }

    /// Limits the number of model requests in one run.
    ///
    /// Tool calls of the last allowed turn are still executed, then the
    /// run ends without asking the model again. A limit of 0 behaves
    /// like 1.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps.max(1));
        self
    }

    /// Builds the agent.
    ///
    /// Fails if two tools share a name.
    pub fn build(self) -> Result<Agent, CatalogError> {
        let catalog = Catalog::new(self.tools)?;
        debug!("agent built with tools: {catalog:?}");
        Ok(Agent {
            config: Arc::new(AgentConfig {
                model_client: self.model_client,
                catalog,
                system_prompt: self.system_prompt,
                max_steps: self.max_steps,
            }),
        })
    }
}
