use serde_json::Value;
use tracing::Instrument;

use super::catalog::Executor;
use super::{Catalog, ErrorKind, ToolFault};

impl Catalog {
    /// Runs the named tool and normalizes the outcome to the text shown to
    /// the model.
    ///
    /// Unknown names, provider-executed tools and the tool's own failures
    /// all produce text. Only [`ErrorKind::Internal`] failures return a
    /// [`ToolFault`].
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<String, ToolFault> {
        let tool = match self.executor(name) {
            None => {
                warn!("tool not found: {name}");
                return Ok(format!("Unknown tool: {name}"));
            }
            Some(Executor::Provider(_)) => {
                debug!("skipping provider tool: {name}");
                return Ok(format!(
                    "Provider tool {name} - executed by model provider"
                ));
            }
            Some(Executor::Local(tool)) => tool,
        };

        trace!("running tool {name} with args: {arguments:?}");
        let result = tool
            .execute(arguments)
            .instrument(debug_span!("tool dispatch", tool = name))
            .await;
        match result {
            Ok(output) => Ok(output),
            Err(err) if err.kind() == ErrorKind::Internal => {
                error!("tool {name} failed internally: {}", err.reason());
                Err(ToolFault {
                    name: name.to_owned(),
                    reason: err.reason().into_owned(),
                })
            }
            Err(err) => {
                debug!("tool {name} reported an error: {}", err.reason());
                Ok(format!("Error: {}", err.reason()))
            }
        }
    }
}
