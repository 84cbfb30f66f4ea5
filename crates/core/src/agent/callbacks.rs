use serde_json::Value;

/// Receives progress of an agent run.
///
/// Every method has an empty default, so implementors only override what
/// they need. `()` ignores everything.
pub trait AgentCallbacks {
    /// A text fragment streamed from the model.
    fn on_token(&mut self, text: &str) {
        let _ = text;
    }

    /// The model requested a tool call. Called as soon as the request
    /// arrives, before the turn is complete.
    fn on_tool_call_start(&mut self, name: &str, arguments: &Value) {
        let _ = (name, arguments);
    }

    /// A tool call has finished, `result` is the text sent to the model.
    fn on_tool_call_end(&mut self, name: &str, result: &str) {
        let _ = (name, result);
    }

    /// A model turn has finished streaming. `step` counts model requests
    /// of this run starting from 1, `text` is the text of that turn.
    fn on_step_end(&mut self, step: usize, text: &str) {
        let _ = (step, text);
    }

    /// The run has finished with `full_text` as the final response.
    fn on_complete(&mut self, full_text: &str) {
        let _ = full_text;
    }
}

impl AgentCallbacks for () {}
