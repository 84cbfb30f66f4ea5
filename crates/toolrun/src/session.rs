use toolrun_core::{
    Agent, AgentBuilder, AgentCallbacks, AgentError, CatalogError,
};
use toolrun_model::{ModelMessage, ModelProvider};

use crate::tools::*;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self { agent_builder }
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Limits the number of model requests for each message.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.agent_builder = self.agent_builder.with_max_steps(max_steps);
        self
    }

    /// Builds a new session with all the built-in tools.
    pub fn build(self) -> Result<Session, CatalogError> {
        let agent = self
            .agent_builder
            .with_tool(GetDateTimeTool::new())
            .with_tool(ReadFileTool::new())
            .with_tool(WriteFileTool::new())
            .with_tool(ListFilesTool::new())
            .with_tool(DeleteFileTool::new())
            .with_tool(RunCommandTool::new())
            .with_tool(ExecuteCodeTool::new())
            .with_tool(WebSearchTool::new())
            .build()?;

        Ok(Session {
            agent,
            history: vec![],
        })
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session holds a fully configured agent and the conversation so far.
/// It is basically a wrapper around [`Agent`] that carries the history from
/// one message to the next.
pub struct Session {
    agent: Agent,
    history: Vec<ModelMessage>,
}

impl Session {
    /// Sends a message and runs the agent until it answers.
    ///
    /// When the run fails, the history is left as it was before the
    /// message, so the user can simply try again.
    pub async fn send_message<C>(
        &mut self,
        message: &str,
        callbacks: &mut C,
    ) -> Result<(), AgentError>
    where
        C: AgentCallbacks + ?Sized,
    {
        let history = self.history.clone();
        self.history = self.agent.run(message, history, callbacks).await?;
        Ok(())
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn history(&self) -> &[ModelMessage] {
        &self.history
    }

    /// Forgets the conversation.
    #[inline]
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}
