use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use serde_json::{Map, Value};
use toolrun_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest,
};

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, FunctionToolCall, Message, ToolCall};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    content: String,
    reasoning_content: Option<String>,
    tool_calls: Vec<ToolCall>,
    // Tool calls are only complete once the stream is done, so they are
    // emitted afterwards, in index order.
    emitted_tool_calls: usize,
    finish_reason: Option<ModelFinishReason>,
    saw_chunk: bool,
    stream_done: bool,
    completed: bool,
}

impl PartialState {
    fn new(sse: Sse) -> Self {
        Self {
            sse,
            id: None,
            content: String::new(),
            reasoning_content: None,
            tool_calls: vec![],
            emitted_tool_calls: 0,
            finish_reason: None,
            saw_chunk: false,
            stream_done: false,
            completed: false,
        }
    }

    fn finish(self) -> Option<(String, Message)> {
        let content = if self.content.is_empty() && !self.tool_calls.is_empty()
        {
            None
        } else {
            Some(self.content)
        };
        let tool_calls = if self.tool_calls.is_empty() {
            None
        } else {
            let tool_calls = self
                .tool_calls
                .into_iter()
                .map(|mut call| {
                    call.r#type.get_or_insert_with(|| "function".to_owned());
                    call
                })
                .collect();
            Some(tool_calls)
        };
        Some((
            self.id?,
            Message::Assistant {
                content,
                tool_calls,
                reasoning_content: self.reasoning_content,
            },
        ))
    }

    fn merge_tool_call(&mut self, tool_call: ToolCall) {
        let existing = tool_call.index.and_then(|index| {
            self.tool_calls.iter_mut().find(|t| t.index == Some(index))
        });
        let Some(partial) = existing else {
            self.tool_calls.push(tool_call);
            return;
        };

        if partial.id.is_none() {
            partial.id = tool_call.id;
        }
        if partial.r#type.is_none() {
            partial.r#type = tool_call.r#type;
        }
        let Some(function) = tool_call.function else {
            return;
        };
        let partial_func =
            partial.function.get_or_insert_with(|| FunctionToolCall {
                name: None,
                arguments: None,
            });
        if let Some(name) = function.name {
            partial_func.name.get_or_insert_default().push_str(&name);
        }
        if let Some(arguments) = function.arguments {
            partial_func
                .arguments
                .get_or_insert_default()
                .push_str(&arguments);
        }
    }

    fn inferred_finish_reason(&self) -> ModelFinishReason {
        match self.finish_reason {
            Some(reason) => reason,
            None if !self.tool_calls.is_empty() => ModelFinishReason::ToolCalls,
            None => ModelFinishReason::Stop,
        }
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Message)>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState::new(sse);
        Self {
            next_event_fut: Some(Box::pin(next_event(partial_state))),
            full_msg: None,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, partial_state)) => {
                    *this.next_event_fut = None;
                    *this.full_msg = partial_state.finish();
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        *this.next_event_fut = Some(Box::pin(next_event(partial_state)));
        Poll::Ready(Ok(Some(event)))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id, msg.clone()))
    }
}

fn map_finish_reason(reason: &str) -> Result<ModelFinishReason, Error> {
    match reason {
        "tool_calls" | "function_call" => Ok(ModelFinishReason::ToolCalls),
        "length" => Ok(ModelFinishReason::Length),
        "content_filter" => Err(Error::new(
            "response blocked by content filter",
            ErrorKind::Moderated,
        )),
        _ => Ok(ModelFinishReason::Stop),
    }
}

fn parse_arguments(raw: Option<&str>) -> Value {
    let raw = raw.unwrap_or_default();
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|err| {
        debug!("tool call arguments are not valid JSON: {err}");
        Value::String(raw.to_owned())
    })
}

fn to_request(tool_call: &ToolCall) -> ToolCallRequest {
    let function = tool_call.function.as_ref();
    ToolCallRequest {
        id: tool_call.id.clone().unwrap_or_default(),
        name: function.and_then(|f| f.name.clone()).unwrap_or_default(),
        arguments: parse_arguments(
            function.and_then(|f| f.arguments.as_deref()),
        ),
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    loop {
        if partial_state.stream_done {
            if !partial_state.saw_chunk {
                return Err(Error::new(
                    "stream ended without any chunk",
                    ErrorKind::NoOutput,
                ));
            }

            // Text deltas are already out; emit tool calls, then completion.
            let idx = partial_state.emitted_tool_calls;
            if let Some(tool_call) = partial_state.tool_calls.get(idx) {
                let req = to_request(tool_call);
                partial_state.emitted_tool_calls += 1;
                return Ok((Some(ModelResponseEvent::ToolCall(req)), partial_state));
            }
            if !partial_state.completed {
                partial_state.completed = true;
                let reason = partial_state.inferred_finish_reason();
                return Ok((
                    Some(ModelResponseEvent::Completed(reason)),
                    partial_state,
                ));
            }
            return Ok((None, partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                partial_state.stream_done = true;
                continue;
            }
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            partial_state.stream_done = true;
            continue;
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        partial_state.saw_chunk = true;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        }

        // The trailing usage chunk carries no choices.
        let mut message_delta = String::new();
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                message_delta.push_str(&content);
            }
            if let Some(reasoning_content) = choice.delta.reasoning_content {
                partial_state
                    .reasoning_content
                    .get_or_insert_default()
                    .push_str(&reasoning_content);
            }
            for tool_call in choice.delta.tool_calls.into_iter().flatten() {
                partial_state.merge_tool_call(tool_call);
            }
            if let Some(finish_reason) = choice.finish_reason {
                partial_state.finish_reason =
                    Some(map_finish_reason(&finish_reason)?);
                partial_state.stream_done = true;
            }
        }

        if !message_delta.is_empty() {
            partial_state.content.push_str(&message_delta);
            return Ok((
                Some(ModelResponseEvent::MessageDelta(message_delta)),
                partial_state,
            ));
        }
    }
}
