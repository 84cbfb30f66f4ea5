use std::future;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use toolrun_core::tool::{Tool, ToolResult};
use toolrun_core::{AgentBuilder, AgentCallbacks, FALLBACK_RESPONSE};

use super::{Executor, ProviderFactory, ToolCallRecord};
use crate::EvalError;
use crate::dataset::{MockToolDefinition, MultiTurnEvalData};

/// The step ceiling used when neither the case nor the caller sets one.
pub const DEFAULT_MAX_STEPS: usize = 20;

/// A tool output as the model received it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultRecord {
    /// The tool name.
    pub tool_name: String,
    /// The result text.
    pub result: String,
}

/// One model request and the tool calls it led to.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// Calls requested in this step.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Results returned for them.
    pub tool_results: Vec<ToolResultRecord>,
    /// The text of this step, if any.
    pub text: Option<String>,
}

/// The transcript of a whole agent run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTurnResult {
    /// The text of the last step, or the fallback reply when the model
    /// went silent.
    pub text: String,
    /// Every step in order.
    pub steps: Vec<StepRecord>,
    /// Every tool call in order, repeats included.
    pub tool_call_order: Vec<String>,
    /// Distinct tools in order of first use.
    pub tools_used: Vec<String>,
}

/// A tool that answers every call with the same text.
struct MockTool {
    name: String,
    description: String,
    parameters: Value,
    result: String,
}

impl MockTool {
    fn new(name: &str, def: &MockToolDefinition) -> Self {
        let result = match &def.result {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self {
            name: name.to_owned(),
            description: def.description.clone(),
            parameters: def.parameters.clone().unwrap_or_else(
                || json!({ "type": "object", "properties": {} }),
            ),
            result,
        }
    }
}

impl Tool for MockTool {
    type Input = Value;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameters
    }

    fn execute(
        &self,
        _input: Value,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        future::ready(Ok(self.result.clone()))
    }
}

/// Runs the full agent loop against mocked tools.
pub struct MultiTurnExecutor<F> {
    factory: F,
    system_prompt: String,
    max_steps: usize,
}

impl<F: ProviderFactory> MultiTurnExecutor<F> {
    /// Creates an executor with the default step ceiling.
    pub fn new(factory: F, system_prompt: impl Into<String>) -> Self {
        Self {
            factory,
            system_prompt: system_prompt.into(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Sets the step ceiling for cases that don't set their own.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

#[derive(Default)]
struct Transcript {
    steps: Vec<StepRecord>,
    pending_calls: Vec<ToolCallRecord>,
    tool_call_order: Vec<String>,
    text: String,
}

impl AgentCallbacks for Transcript {
    fn on_tool_call_start(&mut self, name: &str, arguments: &Value) {
        self.tool_call_order.push(name.to_owned());
        self.pending_calls.push(ToolCallRecord {
            tool_name: name.to_owned(),
            args: arguments.clone(),
        });
    }

    fn on_step_end(&mut self, _step: usize, text: &str) {
        self.text = text.to_owned();
        self.steps.push(StepRecord {
            tool_calls: std::mem::take(&mut self.pending_calls),
            tool_results: vec![],
            text: (!text.is_empty()).then(|| text.to_owned()),
        });
    }

    fn on_tool_call_end(&mut self, name: &str, result: &str) {
        if let Some(step) = self.steps.last_mut() {
            step.tool_results.push(ToolResultRecord {
                tool_name: name.to_owned(),
                result: result.to_owned(),
            });
        }
    }

    fn on_complete(&mut self, full_text: &str) {
        if full_text == FALLBACK_RESPONSE {
            self.text = full_text.to_owned();
        }
    }
}

impl Transcript {
    fn into_result(self) -> MultiTurnResult {
        let mut tools_used: Vec<String> = vec![];
        for name in &self.tool_call_order {
            if !tools_used.contains(name) {
                tools_used.push(name.clone());
            }
        }
        MultiTurnResult {
            text: self.text,
            steps: self.steps,
            tool_call_order: self.tool_call_order,
            tools_used,
        }
    }
}

#[async_trait]
impl<F: ProviderFactory> Executor for MultiTurnExecutor<F> {
    type Data = MultiTurnEvalData;
    type Output = MultiTurnResult;

    async fn execute(
        &self,
        data: &MultiTurnEvalData,
    ) -> Result<MultiTurnResult, EvalError> {
        let config = data.config.clone().unwrap_or_default();
        let max_steps = config.max_steps.unwrap_or(self.max_steps);
        let mut builder = AgentBuilder::with_model_provider(
            self.factory.create(config.model.as_deref()),
        )
        .with_system_prompt(self.system_prompt.as_str())
        .with_max_steps(max_steps);
        for (name, def) in &data.mock_tools {
            builder = builder.with_tool(MockTool::new(name, def));
        }
        let agent = builder.build()?;

        let (history, message) = data.input.to_conversation()?;
        let mut transcript = Transcript::default();
        agent.run(message, history, &mut transcript).await?;

        let result = transcript.into_result();
        debug!(
            "finished in {} steps, calls: {:?}",
            result.steps.len(),
            result.tool_call_order
        );
        Ok(result)
    }
}
