use std::time::Duration;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;
use toolrun_core::tool::{Error as ToolError, Tool, ToolResult};

use super::shell::format_output;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Bash,
}

impl Language {
    fn command(self, code: &str) -> Command {
        let (program, flag) = match self {
            Language::Python => ("python3", "-c"),
            Language::Javascript => ("node", "-e"),
            Language::Bash => ("bash", "-c"),
        };
        let mut command = Command::new(program);
        command.arg(flag).arg(code);
        command
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct ExecuteCodeParameters {
    #[schemars(description = "Language of the snippet.")]
    language: Language,
    #[schemars(description = "The source code to run.")]
    code: String,
    #[schemars(description = "Seconds to wait before giving up, default to 30.")]
    timeout_secs: Option<u64>,
}

/// A tool for running short code snippets with a local interpreter.
pub struct ExecuteCodeTool {
    parameter_schema: Value,
}

impl ExecuteCodeTool {
    /// Creates a new execute code tool.
    #[inline]
    pub fn new() -> Self {
        ExecuteCodeTool {
            parameter_schema: schema_for!(ExecuteCodeParameters).to_value(),
        }
    }
}

impl Default for ExecuteCodeTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for ExecuteCodeTool {
    type Input = ExecuteCodeParameters;

    fn name(&self) -> &str {
        "executeCode"
    }

    fn description(&self) -> &str {
        r#"
Runs a Python, JavaScript or Bash snippet and returns what it printed.
Use it for calculations and quick data processing. The snippet is killed when the timeout expires."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ExecuteCodeParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            let secs = input.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
            debug!("executing {:?} snippet, timeout {secs}s", input.language);
            let child = input
                .language
                .command(&input.code)
                .kill_on_drop(true)
                .output();
            let output = timeout(Duration::from_secs(secs), child)
                .await
                .map_err(|_| {
                    ToolError::execution_error().with_reason(format!(
                        "Execution timed out after {secs} seconds"
                    ))
                })?
                .map_err(|err| {
                    ToolError::execution_error().with_reason(format!(
                        "Could not start the {:?} interpreter: {err}",
                        input.language
                    ))
                })?;
            Ok(format_output(&output))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bash(code: &str, timeout_secs: Option<u64>) -> ExecuteCodeParameters {
        ExecuteCodeParameters {
            language: Language::Bash,
            code: code.to_owned(),
            timeout_secs,
        }
    }

    #[tokio::test]
    async fn test_execute_bash() {
        let result = ExecuteCodeTool::new()
            .execute(bash("echo $((6 * 7))", None))
            .await
            .unwrap();
        assert_eq!(result, "42\n");
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = ExecuteCodeTool::new()
            .execute(bash("sleep 5", Some(1)))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "Execution timed out after 1 seconds");
    }

    #[test]
    fn test_language_names() {
        let input: ExecuteCodeParameters = serde_json::from_value(
            serde_json::json!({ "language": "javascript", "code": "1" }),
        )
        .unwrap();
        assert_eq!(input.language, Language::Javascript);
    }
}
