use serde_json::Value;

use crate::OpaqueMessage;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The conversation so far, oldest first.
    pub messages: Vec<ModelMessage>,
    /// Tools that the model may request.
    pub tools: Vec<ModelTool>,
}

/// One turn in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// A plain assistant text.
    Assistant(String),
    /// A tool call result.
    Tool(ToolCallResult),
    /// A provider-specific message, usually a full assistant turn that
    /// must be replayed verbatim.
    Opaque(OpaqueMessage),
}

impl ModelMessage {
    /// Returns the role name of this message as the chat APIs spell it.
    ///
    /// Opaque messages always come from the model, so they report
    /// `"assistant"`.
    pub fn role(&self) -> &'static str {
        match self {
            ModelMessage::System(_) => "system",
            ModelMessage::User(_) => "user",
            ModelMessage::Assistant(_) | ModelMessage::Opaque(_) => {
                "assistant"
            }
            ModelMessage::Tool(_) => "tool",
        }
    }
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallResult {
    /// The id of the tool call request this result answers.
    pub id: String,
    /// The name of the tool that was called.
    pub name: String,
    /// The text output of the tool.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}
