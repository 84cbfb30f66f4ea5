use std::future::poll_fn;
use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpaqueMessage;
use crate::provider::ModelProviderError;

/// A streamed response from the model provider.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next event. Implementations will ensure that the current
    ///   task will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the response has an event
    ///   to deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   processing the response. No more events will be produced.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;

    /// Makes an [`OpaqueMessage`] that represents the whole message in
    /// this response, to be appended to the history verbatim.
    ///
    /// Call this after all events are polled. Implementations should
    /// return the same message every time for one response, and may
    /// return `None` if the response did not complete.
    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        None
    }
}

/// Waits for the next event of a pinned response.
#[inline]
pub async fn next_event<R: ModelResponse>(
    mut resp: Pin<&mut R>,
) -> Result<Option<ModelResponseEvent>, R::Error> {
    poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await
}

/// The reason why a model response has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFinishReason {
    /// The model needs to call tools.
    ToolCalls,
    /// The model has finished generating text.
    Stop,
    /// The model hit its output token limit.
    Length,
}

/// Describes a tool call request from the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments object, shaped by the tool's parameter schema.
    pub arguments: Value,
}

/// The event from a model response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// The response has been completed.
    Completed(ModelFinishReason),
    /// Received a text fragment.
    MessageDelta(String),
    /// Received a tool call request.
    ToolCall(ToolCallRequest),
}
