use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::{Pin, pin};
use std::task::{self, Poll};

use serde_json::json;
use toolrun_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest, next_event,
};

#[derive(Debug)]
struct EchoError(ErrorKind);

impl Display for EchoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "echo failed: {}", self.0)
    }
}

impl Error for EchoError {}

impl ModelProviderError for EchoError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes the last user message word by word, and asks for the `echo`
/// tool when the message starts with `!`.
struct EchoResponse {
    events: VecDeque<ModelResponseEvent>,
    turn: usize,
    done: bool,
}

impl ModelResponse for EchoResponse {
    type Error = EchoError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        let event = this.events.pop_front();
        if event.is_none() {
            this.done = true;
        }
        Poll::Ready(Ok(event))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.done
            .then(|| OpaqueMessage::new(format!("echo:{}", self.turn), ()))
    }
}

struct EchoProvider;

impl ModelProvider for EchoProvider {
    type Error = EchoError;
    type Response = EchoResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let last_user = req.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::User(text) => Some(text.clone()),
            _ => None,
        });
        let result = match last_user {
            None => Err(EchoError(ErrorKind::NoOutput)),
            Some(text) => {
                let mut events: VecDeque<_> = text
                    .split_inclusive(' ')
                    .map(|word| ModelResponseEvent::MessageDelta(word.into()))
                    .collect();
                let reason = if let Some(arg) = text.strip_prefix('!') {
                    events.push_back(ModelResponseEvent::ToolCall(
                        ToolCallRequest {
                            id: "call:0".to_owned(),
                            name: "echo".to_owned(),
                            arguments: json!({ "text": arg }),
                        },
                    ));
                    ModelFinishReason::ToolCalls
                } else {
                    ModelFinishReason::Stop
                };
                events.push_back(ModelResponseEvent::Completed(reason));
                Ok(EchoResponse {
                    events,
                    turn: req.messages.len(),
                    done: false,
                })
            }
        };
        ready(result)
    }

    fn is_compatible(&self, msg: &ModelMessage) -> bool {
        match msg {
            ModelMessage::Opaque(opaque) => opaque.id().starts_with("echo:"),
            _ => true,
        }
    }
}

async fn collect(
    resp: EchoResponse,
) -> (String, Vec<ToolCallRequest>, Option<ModelFinishReason>, OpaqueMessage)
{
    let mut resp = pin!(resp);
    let mut text = String::new();
    let mut calls = Vec::new();
    let mut reason = None;
    while let Some(event) = next_event(resp.as_mut()).await.unwrap() {
        match event {
            ModelResponseEvent::MessageDelta(delta) => text.push_str(&delta),
            ModelResponseEvent::ToolCall(req) => calls.push(req),
            ModelResponseEvent::Completed(r) => reason = Some(r),
        }
    }
    (text, calls, reason, resp.make_opaque_message().unwrap())
}

#[tokio::test]
async fn test_text_turn() {
    let req = ModelRequest {
        messages: vec![
            ModelMessage::System("Be brief.".to_owned()),
            ModelMessage::User("good morning agent".to_owned()),
        ],
        tools: vec![],
    };
    let resp = EchoProvider.send_request(&req).await.unwrap();
    let (text, calls, reason, opaque) = collect(resp).await;
    assert_eq!(text, "good morning agent");
    assert!(calls.is_empty());
    assert_eq!(reason, Some(ModelFinishReason::Stop));
    assert_eq!(opaque.id(), "echo:2");
}

#[tokio::test]
async fn test_tool_call_turn() {
    let req = ModelRequest {
        messages: vec![ModelMessage::User("!ping".to_owned())],
        tools: vec![],
    };
    let resp = EchoProvider.send_request(&req).await.unwrap();
    let (_, calls, reason, _) = collect(resp).await;
    assert_eq!(reason, Some(ModelFinishReason::ToolCalls));
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].arguments, json!({ "text": "ping" }));
}

#[tokio::test]
async fn test_error_kind() {
    let req = ModelRequest {
        messages: vec![],
        tools: vec![],
    };
    let err = EchoProvider.send_request(&req).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NoOutput);
    assert_eq!(err.to_string(), "echo failed: no output generated");
}

#[test]
fn test_compatibility() {
    let ours = ModelMessage::Opaque(OpaqueMessage::new("echo:3", ()));
    let theirs = ModelMessage::Opaque(OpaqueMessage::new("other:3", ()));
    assert!(EchoProvider.is_compatible(&ours));
    assert!(!EchoProvider.is_compatible(&theirs));
    assert!(EchoProvider.is_compatible(&ModelMessage::User("hi".into())));
    assert_eq!(theirs.role(), "assistant");
}
