//! A scripted fake model for tests and offline eval runs.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use toolrun_model::{
    ErrorKind, ModelMessage, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, OpaqueMessage, ToolCallRequest,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// The raw value inside opaque messages produced by [`TestModelProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

pub struct TestModelResponse {
    preset: PresetResponse,
    step_idx: usize,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
    completed: bool,
    faulted: bool,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.completed || this.faulted {
            return Poll::Ready(Ok(None));
        }

        let delay = this.delay;
        let timer = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(timer.as_mut().poll(cx));
        this.sleep = None;

        let events = &this.preset.events;
        let idx = this.event_idx;
        this.event_idx += 1;

        if idx < events.len() {
            let event = match &events[idx] {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg.clone())
                }
                PresetEvent::ToolCall(req) => {
                    ModelResponseEvent::ToolCall(req.clone())
                }
                PresetEvent::Fault(kind) => {
                    this.faulted = true;
                    return Poll::Ready(Err(Error::new(
                        format!("scripted fault at event {idx}"),
                        *kind,
                    )));
                }
            };
            Poll::Ready(Ok(Some(event)))
        } else if idx == events.len() {
            Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                this.preset.inferred_finish_reason(),
            ))))
        } else {
            this.completed = true;
            Poll::Ready(Ok(None))
        }
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        if !self.completed {
            return None;
        }
        let mut turn = RecordedTurn {
            text: String::new(),
            tool_calls: vec![],
        };
        for event in &self.preset.events {
            match event {
                PresetEvent::MessageDelta(msg) => turn.text.push_str(msg),
                PresetEvent::ToolCall(req) => turn.tool_calls.push(req.clone()),
                PresetEvent::Fault(_) => {}
            }
        }
        Some(OpaqueMessage::new(format!("msg:{}", self.step_idx), turn))
    }
}

/// A local fake model for testing purpose.
///
/// The script is a list of assistant turns. Each request is answered with
/// the turn whose index equals the number of assistant messages already in
/// the request, so a fresh conversation gets turn 0, the follow-up after
/// tool results gets turn 1, and so on. If the script runs out, the
/// request fails.
///
/// Every request is recorded and can be inspected with
/// [`TestModelProvider::requests`]. Clones share the same record.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Vec<PresetResponse>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl TestModelProvider {
    /// Creates a provider from a complete script.
    #[inline]
    pub fn with_script(script: impl Into<Vec<PresetResponse>>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn add_assistant_turn(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn assistant_turns(req: &ModelRequest) -> usize {
    req.messages
        .iter()
        .filter(|msg| {
            matches!(msg, ModelMessage::Assistant(_) | ModelMessage::Opaque(_))
        })
        .count()
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req.clone());

        let step_idx = assistant_turns(req);
        let result = match self.script.get(step_idx) {
            None => Err(Error::new(
                format!("no scripted turn at index {step_idx}"),
                ErrorKind::Other,
            )),
            Some(PresetResponse {
                rejection: Some(kind),
                ..
            }) => Err(Error::new("scripted rejection", *kind)),
            Some(preset) => Ok(TestModelResponse {
                preset: preset.clone(),
                step_idx,
                event_idx: 0,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                sleep: None,
                completed: false,
                faulted: false,
            }),
        };
        future::ready(result)
    }

    fn is_compatible(&self, msg: &ModelMessage) -> bool {
        match msg {
            ModelMessage::Opaque(opaque) => opaque.is::<RecordedTurn>(),
            _ => true,
        }
    }
}
