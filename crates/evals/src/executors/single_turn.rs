use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use toolrun::tools::*;
use toolrun_core::tool::Tool;
use toolrun_core::{AgentBuilder, AgentCallbacks};
use toolrun_model::ModelTool;

use super::{Executor, ProviderFactory, ToolCallRecord};
use crate::EvalError;
use crate::dataset::EvalData;

/// What the model picked in its first turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleTurnResult {
    /// Requested calls with their arguments.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Requested tool names, in request order.
    pub tool_names: Vec<String>,
    /// Whether any tool was requested.
    pub selected_any: bool,
}

fn describe<T: Tool>(tool: T) -> ModelTool {
    ModelTool {
        name: tool.name().to_owned(),
        description: tool.description().trim().to_owned(),
        parameters: tool.parameter_schema().clone(),
    }
}

fn builtin_tools() -> Vec<ModelTool> {
    vec![
        describe(GetDateTimeTool::new()),
        describe(ReadFileTool::new()),
        describe(WriteFileTool::new()),
        describe(ListFilesTool::new()),
        describe(DeleteFileTool::new()),
        describe(RunCommandTool::new()),
        describe(ExecuteCodeTool::new()),
        describe(WebSearchTool::new()),
    ]
}

/// Asks the model once and records which tools it would call.
///
/// The offered tools are declared to the model but never executed, so a
/// case has no side effects.
pub struct SingleTurnExecutor<F> {
    factory: F,
    system_prompt: String,
    tools: Vec<ModelTool>,
}

impl<F: ProviderFactory> SingleTurnExecutor<F> {
    /// Creates an executor offering the built-in tools.
    pub fn new(factory: F, system_prompt: impl Into<String>) -> Self {
        Self {
            factory,
            system_prompt: system_prompt.into(),
            tools: builtin_tools(),
        }
    }
}

#[derive(Default)]
struct Picks {
    tool_calls: Vec<ToolCallRecord>,
}

impl AgentCallbacks for Picks {
    fn on_tool_call_start(&mut self, name: &str, arguments: &Value) {
        self.tool_calls.push(ToolCallRecord {
            tool_name: name.to_owned(),
            args: arguments.clone(),
        });
    }
}

#[async_trait]
impl<F: ProviderFactory> Executor for SingleTurnExecutor<F> {
    type Data = EvalData;
    type Output = SingleTurnResult;

    async fn execute(
        &self,
        data: &EvalData,
    ) -> Result<SingleTurnResult, EvalError> {
        let model = data
            .config
            .as_ref()
            .and_then(|config| config.model.as_deref());
        let mut builder =
            AgentBuilder::with_model_provider(self.factory.create(model))
                .with_system_prompt(self.system_prompt.as_str())
                .with_max_steps(1);
        for name in &data.tools {
            match self.tools.iter().find(|tool| tool.name == *name) {
                Some(tool) => {
                    builder = builder.with_provider_tool(tool.clone());
                }
                None => warn!("skipping unknown tool: {name}"),
            }
        }
        let agent = builder.build()?;

        let (history, message) = data.input.to_conversation()?;
        let mut picks = Picks::default();
        agent.run(message, history, &mut picks).await?;

        let tool_names: Vec<_> = picks
            .tool_calls
            .iter()
            .map(|call| call.tool_name.clone())
            .collect();
        debug!("model picked {tool_names:?}");
        Ok(SingleTurnResult {
            selected_any: !tool_names.is_empty(),
            tool_names,
            tool_calls: picks.tool_calls,
        })
    }
}
