//! A model provider for OpenAI-compatible chat completion APIs.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};
use toolrun_model::{
    ErrorKind, ModelMessage, ModelProvider, ModelProviderError, ModelRequest,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use io::{Chunks, Sse};
use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
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
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

fn status_error_kind(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        _ => ErrorKind::Other,
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    pub fn new(config: OpenAIConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!("falling back to a default HTTP client: {err}");
                Client::new()
            });
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let resp_fut = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "text/event-stream")
            .json(&openai_req)
            .send();

        async move {
            let resp = match resp_fut.await.and_then(Response::error_for_status)
            {
                Ok(resp) => resp,
                Err(err) => {
                    let kind =
                        err.status().map_or(ErrorKind::Other, status_error_kind);
                    return Err(Error::new(format!("{err}"), kind));
                }
            };

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_event_stream {
                return Err(Error::new(
                    format!("unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            debug!("response stream opened");
            let sse = Sse::new(Chunks::from_response(resp));
            Ok(OpenAIResponse::from_sse(sse))
        }
    }

    fn is_compatible(&self, msg: &ModelMessage) -> bool {
        match msg {
            ModelMessage::Opaque(opaque) => opaque.is::<proto::Message>(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use toolrun_model::OpaqueMessage;

    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_error_kind(StatusCode::TOO_MANY_REQUESTS),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(
            status_error_kind(StatusCode::INTERNAL_SERVER_ERROR),
            ErrorKind::Other
        );
    }

    #[test]
    fn test_foreign_history_is_incompatible() {
        let provider = OpenAIProvider::new(
            OpenAIConfigBuilder::with_api_key("xxx").build(),
        );
        let ours = ModelMessage::Opaque(OpaqueMessage::new(
            "chatcmpl-1",
            proto::Message::User {
                content: "hi".to_owned(),
            },
        ));
        let theirs = ModelMessage::Opaque(OpaqueMessage::new("x", "raw"));
        assert!(provider.is_compatible(&ours));
        assert!(!provider.is_compatible(&theirs));
        assert!(provider.is_compatible(&ModelMessage::User("hi".to_owned())));
    }
}
