mod builder;
mod callbacks;
mod run;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use toolrun_model::ModelMessage;
use tracing::Instrument;

use crate::AgentError;
use crate::model_client::ModelClient;
use crate::tool::Catalog;
pub use builder::AgentBuilder;
pub use callbacks::AgentCallbacks;

/// The text shown to the user when the model produced an empty turn.
pub const FALLBACK_RESPONSE: &str = "I apologize, but I wasn't able to \
    generate a response. Could you please try rephrasing your message?";

struct AgentConfig {
    model_client: ModelClient,
    catalog: Catalog,
    system_prompt: String,
    max_steps: Option<usize>,
}

/// An agent configuration: the model, the tool catalog and the system
/// prompt, fixed at build time.
///
/// The agent holds no conversation state, each call to [`Agent::run`]
/// owns its history. Cloning is cheap, and clones can run concurrently.
#[derive(Clone)]
pub struct Agent {
    config: Arc<AgentConfig>,
}

impl Agent {
    /// Runs one user turn to completion.
    ///
    /// `history` holds the messages of previous turns. Messages the current
    /// model can't replay are dropped from it before the run starts. On
    /// success, the returned list is the complete conversation including
    /// the system prompt, ready to be passed as `history` of the next turn.
    ///
    /// Streamed text and tool activity are reported through `callbacks`.
    /// [`AgentCallbacks::on_complete`] is called exactly once when the run
    /// succeeds, and never when it fails.
    pub async fn run<C>(
        &self,
        user_message: impl Into<String>,
        history: Vec<ModelMessage>,
        callbacks: &mut C,
    ) -> Result<Vec<ModelMessage>, AgentError>
    where
        C: AgentCallbacks + ?Sized,
    {
        run::run_loop(&self.config, user_message.into(), history, callbacks)
            .instrument(debug_span!("agent run"))
            .await
    }

    /// Returns the tool catalog.
    #[inline]
    pub fn catalog(&self) -> &Catalog {
        &self.config.catalog
    }

    /// Returns the step ceiling, if any.
    #[inline]
    pub fn max_steps(&self) -> Option<usize> {
        self.config.max_steps
    }
}
