use std::env;
use std::process::Output;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use toolrun_core::tool::{Error as ToolError, Tool, ToolResult};

#[derive(Deserialize, JsonSchema)]
pub struct RunCommandParameters {
    #[schemars(description = "The shell command to execute.")]
    command: String,
}

/// A tool for running shell commands.
pub struct RunCommandTool {
    parameter_schema: Value,
}

impl RunCommandTool {
    /// Creates a new run command tool.
    #[inline]
    pub fn new() -> Self {
        RunCommandTool {
            parameter_schema: schema_for!(RunCommandParameters).to_value(),
        }
    }
}

impl Default for RunCommandTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for RunCommandTool {
    type Input = RunCommandParameters;

    fn name(&self) -> &str {
        "runCommand"
    }

    fn description(&self) -> &str {
        r#"
Executes a shell command and returns its output. Use this for system operations, running scripts or interacting with the OS.
Output collected from stdout and stderr is returned."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: RunCommandParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            debug!("running command: {}", input.command);
            let output = create_command_with_inferred_shell()
                .arg("-c")
                .arg(&input.command)
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|err| {
                    ToolError::execution_error()
                        .with_reason(format!("Could not start the shell: {err}"))
                })?;
            Ok(format_output(&output))
        }
    }
}

#[inline]
fn create_command_with_inferred_shell() -> Command {
    let Some(shell) = env::var_os("SHELL") else {
        return Command::new("/bin/sh");
    };
    Command::new(shell)
}

/// Renders a finished process the way the model sees it: stdout followed by
/// stderr, prefixed with the exit code when the process failed.
pub(super) fn format_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map_or_else(|| "unknown".to_owned(), |code| code.to_string());
        return format!("Command failed with exit code {code}.\n{text}");
    }
    if text.is_empty() {
        return "Command completed successfully with no output".to_owned();
    }
    text
}
