//! Conversation-related types.

use toolrun_model::{ModelMessage, ModelRequest, ModelTool};

/// Drops the messages of `history` that should not be replayed.
///
/// System messages are removed since every run seeds its own prompt.
/// Assistant messages without text carry nothing, and opaque messages that
/// `is_compatible` rejects came from a provider that can't be talked to
/// anymore.
pub fn filter_compatible<F>(
    history: Vec<ModelMessage>,
    is_compatible: F,
) -> Vec<ModelMessage>
where
    F: Fn(&ModelMessage) -> bool,
{
    history
        .into_iter()
        .filter(|msg| match msg {
            ModelMessage::System(_) => false,
            ModelMessage::Assistant(text) => !text.trim().is_empty(),
            ModelMessage::Opaque(_) => is_compatible(msg),
            ModelMessage::User(_) | ModelMessage::Tool(_) => true,
        })
        .collect()
}

/// The working message list of one agent run.
#[derive(Clone, Default, Debug)]
pub(crate) struct Conversation {
    messages: Vec<ModelMessage>,
}

impl Conversation {
    /// Starts a conversation: the system prompt (if any), the filtered
    /// history and the new user message.
    pub fn seed<F>(
        system_prompt: &str,
        history: Vec<ModelMessage>,
        user_message: String,
        is_compatible: F,
    ) -> Self
    where
        F: Fn(&ModelMessage) -> bool,
    {
        let history = filter_compatible(history, is_compatible);
        let mut messages = Vec::with_capacity(history.len() + 2);
        if !system_prompt.is_empty() {
            messages.push(ModelMessage::System(system_prompt.to_owned()));
        }
        messages.extend(history);
        messages.push(ModelMessage::User(user_message));
        Self { messages }
    }

    #[inline]
    pub fn push(&mut self, msg: ModelMessage) {
        self.messages.push(msg);
    }

    pub fn to_request(&self, tools: &[ModelTool]) -> ModelRequest {
        ModelRequest {
            messages: self.messages.clone(),
            tools: tools.to_vec(),
        }
    }

    #[inline]
    pub fn into_messages(self) -> Vec<ModelMessage> {
        self.messages
    }
}
