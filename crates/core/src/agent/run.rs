use toolrun_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelRequest,
    ModelResponseEvent, OpaqueMessage, ToolCallRequest, ToolCallResult,
};

use super::{AgentCallbacks, AgentConfig, FALLBACK_RESPONSE};
use crate::AgentError;
use crate::conversation::Conversation;
use crate::model_client::ModelClient;

/// One assistant turn as received from the model.
#[derive(Default)]
struct Turn {
    text: String,
    tool_calls: Vec<ToolCallRequest>,
    finish_reason: Option<ModelFinishReason>,
    opaque_msg: Option<OpaqueMessage>,
}

impl Turn {
    #[inline]
    fn is_empty(&self) -> bool {
        self.text.is_empty() && self.tool_calls.is_empty()
    }

    #[inline]
    fn wants_tools(&self) -> bool {
        self.finish_reason == Some(ModelFinishReason::ToolCalls)
            && !self.tool_calls.is_empty()
    }

    /// The message to keep in the history. Providers without a native
    /// message format get a plain text message, and so does a final turn
    /// with tool calls that will never be dispatched: every call replayed
    /// to a provider must have a result.
    fn history_message(&mut self) -> ModelMessage {
        if !self.wants_tools() && !self.tool_calls.is_empty() {
            return ModelMessage::Assistant(self.text.clone());
        }
        match self.opaque_msg.take() {
            Some(opaque_msg) => ModelMessage::Opaque(opaque_msg),
            None => ModelMessage::Assistant(self.text.clone()),
        }
    }
}

pub(super) async fn run_loop<C>(
    config: &AgentConfig,
    user_message: String,
    history: Vec<ModelMessage>,
    callbacks: &mut C,
) -> Result<Vec<ModelMessage>, AgentError>
where
    C: AgentCallbacks + ?Sized,
{
    let model_client = &config.model_client;
    let mut conversation = Conversation::seed(
        &config.system_prompt,
        history,
        user_message,
        |msg| model_client.is_compatible(msg),
    );
    let tools = config.catalog.definitions();
    let mut full_text = String::new();
    let mut step = 0;

    loop {
        step += 1;
        debug!("requesting step {step}");
        let request = conversation.to_request(&tools);
        let mut turn = stream_turn(model_client, request, callbacks).await?;

        if turn.is_empty() {
            info!("model produced an empty turn at step {step}");
            full_text = FALLBACK_RESPONSE.to_owned();
            callbacks.on_token(FALLBACK_RESPONSE);
            break;
        }
        full_text.push_str(&turn.text);
        callbacks.on_step_end(step, &turn.text);

        conversation.push(turn.history_message());
        if !turn.wants_tools() {
            trace!("finished with {:?}", turn.finish_reason);
            break;
        }

        for call in turn.tool_calls {
            let result =
                config.catalog.dispatch(&call.name, call.arguments).await?;
            callbacks.on_tool_call_end(&call.name, &result);
            conversation.push(ModelMessage::Tool(ToolCallResult {
                id: call.id,
                name: call.name,
                content: result,
            }));
        }

        if config.max_steps.is_some_and(|max_steps| step >= max_steps) {
            info!("reached the step limit ({step})");
            break;
        }
    }

    callbacks.on_complete(&full_text);
    Ok(conversation.into_messages())
}

async fn stream_turn<C>(
    model_client: &ModelClient,
    request: ModelRequest,
    callbacks: &mut C,
) -> Result<Turn, AgentError>
where
    C: AgentCallbacks + ?Sized,
{
    let mut stream = model_client
        .send_request(request)
        .await
        .map_err(AgentError::Model)?;
    let mut turn = Turn::default();

    loop {
        let event = match stream.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                turn.opaque_msg = stream.make_opaque_message();
                break;
            }
            Err(err) if err.kind() == ErrorKind::NoOutput
                && !turn.text.is_empty() =>
            {
                // Keep what was streamed and treat the turn as final.
                warn!("stream ended early, keeping partial text: {err}");
                turn.finish_reason = None;
                break;
            }
            Err(err) => {
                error!("stream failed: {err}");
                return Err(AgentError::Model(err));
            }
        };

        trace!("got an event: {event:?}");
        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                callbacks.on_token(&delta);
                turn.text.push_str(&delta);
            }
            ModelResponseEvent::ToolCall(req) => {
                callbacks.on_tool_call_start(&req.name, &req.arguments);
                turn.tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                turn.finish_reason = Some(reason);
            }
        }
    }

    Ok(turn)
}
