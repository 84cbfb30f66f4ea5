use std::fmt::{self, Debug};
use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use toolrun_model::{
    ModelMessage, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, OpaqueMessage,
};
use tracing::Instrument;

type BoxedError = Box<dyn ModelProviderError>;
type SendRequestResult = Result<ModelClientStream, BoxedError>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type SendRequestFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;
type IsCompatibleFn = Arc<dyn Fn(&ModelMessage) -> bool + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    send_request_fn: SendRequestFn,
    is_compatible_fn: IsCompatibleFn,
}

impl ModelClient {
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // `ModelClient` must not carry the provider type, so both entries
        // share the provider through closures.
        let provider = Arc::new(provider);
        let send_request_fn: SendRequestFn = {
            let provider = Arc::clone(&provider);
            Arc::new(move |req: ModelRequest| {
                let fut = provider.send_request(&req);
                let fut: BoxedSendRequestFuture = Box::pin(
                    async move {
                        trace!("sending a request: {req:?}");
                        match fut.await {
                            Ok(resp) => Ok(ModelClientStream {
                                inner: Box::pin(resp),
                            }),
                            Err(err) => {
                                error!("request failed: {err}");
                                Err(Box::new(err) as BoxedError)
                            }
                        }
                    }
                    .instrument(trace_span!("model client req")),
                );
                fut
            })
        };
        let is_compatible_fn: IsCompatibleFn =
            Arc::new(move |msg: &ModelMessage| provider.is_compatible(msg));
        Self {
            send_request_fn,
            is_compatible_fn,
        }
    }

    /// Sends a request and returns the event stream of the response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the returned stream stops the
    /// response from streaming further events.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.send_request_fn)(req).await
    }

    /// Returns whether the provider can replay `msg`.
    #[inline]
    pub fn is_compatible(&self, msg: &ModelMessage) -> bool {
        (self.is_compatible_fn)(msg)
    }
}

impl Debug for ModelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClient").finish_non_exhaustive()
    }
}

trait ErasedResponse: Send {
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, BoxedError>>;

    fn make_opaque_message(&self) -> Option<OpaqueMessage>;
}

impl<R: ModelResponse> ErasedResponse for R {
    #[inline]
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, BoxedError>> {
        ModelResponse::poll_next_event(self, cx)
            .map_err(|err| Box::new(err) as BoxedError)
    }

    #[inline]
    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        ModelResponse::make_opaque_message(self)
    }
}

/// The event stream of one model response.
pub struct ModelClientStream {
    inner: Pin<Box<dyn ErasedResponse>>,
}

impl ModelClientStream {
    /// Waits for the next event. `Ok(None)` means the response completed.
    #[inline]
    pub async fn next_event(
        &mut self,
    ) -> Result<Option<ModelResponseEvent>, BoxedError> {
        poll_fn(|cx| self.inner.as_mut().poll_next_event(cx)).await
    }

    /// Returns the whole response as a message to keep in the history.
    #[inline]
    pub fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.inner.make_opaque_message()
    }
}

#[cfg(test)]
mod tests {
    use toolrun_model::{ErrorKind, ModelFinishReason};
    use toolrun_test_model::{
        PresetEvent, PresetResponse, RecordedTurn, TestModelProvider,
    };

    use super::*;

    fn user_request(text: &str) -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User(text.to_owned())],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let provider = TestModelProvider::with_script([
            PresetResponse::with_events([
                PresetEvent::MessageDelta("How ".to_owned()),
                PresetEvent::MessageDelta("are ".to_owned()),
                PresetEvent::MessageDelta("you?".to_owned()),
            ]),
        ]);
        let model_client = ModelClient::new(provider);

        // The client is reusable, and every fresh request gets turn 0.
        for _ in 0..3 {
            let mut stream =
                model_client.send_request(user_request("Hi")).await.unwrap();
            let mut transcript = String::new();
            let mut finish_reason = None;
            while let Some(event) = stream.next_event().await.unwrap() {
                match event {
                    ModelResponseEvent::MessageDelta(delta) => {
                        transcript.push_str(&delta)
                    }
                    ModelResponseEvent::Completed(reason) => {
                        finish_reason = Some(reason)
                    }
                    ModelResponseEvent::ToolCall(_) => unreachable!(),
                }
            }
            assert_eq!(transcript, "How are you?");
            assert_eq!(finish_reason, Some(ModelFinishReason::Stop));
            assert!(stream.make_opaque_message().is_some());
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_client = ModelClient::new(TestModelProvider::default());
        let err = model_client
            .send_request(user_request("Hi"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_is_compatible() {
        let model_client = ModelClient::new(TestModelProvider::default());
        let ours = OpaqueMessage::new(
            "msg:0",
            RecordedTurn {
                text: "Hi".to_owned(),
                tool_calls: vec![],
            },
        );
        assert!(model_client.is_compatible(&ModelMessage::Opaque(ours)));
        assert!(!model_client.is_compatible(&ModelMessage::Opaque(
            OpaqueMessage::new("foreign", 1u32)
        )));
    }
}
