use serde::{Deserialize, Serialize};
use toolrun_model::{ErrorKind, ModelFinishReason, ToolCallRequest};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
    /// Breaks the stream with an error of this kind. Events after it are
    /// never delivered.
    #[serde(rename = "fault")]
    Fault(ErrorKind),
}

/// The preset response for one assistant turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// Overrides the finish reason. By default it is inferred from the
    /// events: `ToolCalls` if any tool call is present, `Stop` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<ModelFinishReason>,
    /// If set, the request itself fails before any event is streamed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<ErrorKind>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            ..Default::default()
        }
    }

    /// Creates a response made of a single text fragment.
    #[inline]
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Forces the finish reason reported at the end of the stream.
    #[inline]
    pub fn with_finish_reason(mut self, reason: ModelFinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    /// Makes the request fail with `kind` instead of streaming.
    #[inline]
    pub fn rejected(kind: ErrorKind) -> Self {
        Self {
            rejection: Some(kind),
            ..Default::default()
        }
    }

    pub(crate) fn inferred_finish_reason(&self) -> ModelFinishReason {
        if let Some(reason) = self.finish_reason {
            return reason;
        }
        let has_tool_call = self
            .events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCall(_)));
        if has_tool_call {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        }
    }
}

/// Shorthand for a tool call event.
pub fn tool_call(
    id: impl Into<String>,
    name: impl Into<String>,
    arguments: serde_json::Value,
) -> PresetEvent {
    PresetEvent::ToolCall(ToolCallRequest {
        id: id.into(),
        name: name.into(),
        arguments,
    })
}
