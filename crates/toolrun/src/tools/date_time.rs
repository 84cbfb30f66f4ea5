use chrono::{SecondsFormat, Utc};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use toolrun_core::tool::{Tool, ToolResult};

#[derive(Deserialize, JsonSchema)]
pub struct GetDateTimeParameters {}

/// A tool that tells the model the current date and time.
pub struct GetDateTimeTool {
    parameter_schema: Value,
}

impl GetDateTimeTool {
    /// Creates a new date time tool.
    #[inline]
    pub fn new() -> Self {
        GetDateTimeTool {
            parameter_schema: schema_for!(GetDateTimeParameters).to_value(),
        }
    }
}

impl Default for GetDateTimeTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for GetDateTimeTool {
    type Input = GetDateTimeParameters;

    fn name(&self) -> &str {
        "getDateTime"
    }

    fn description(&self) -> &str {
        "Get the current date and time as an ISO 8601 string (UTC)."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _input: GetDateTimeParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            Ok(format!("Current date & time in ISO format is: {now}"))
        }
    }
}
