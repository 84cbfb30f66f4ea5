use std::time::Duration;

use reqwest::Client;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use toolrun_core::tool::{Error as ToolError, Tool, ToolResult};

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/?q=";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; toolrun/0.0)";
const DEFAULT_NUM_RESULTS: usize = 5;

#[derive(Deserialize, JsonSchema)]
pub struct WebSearchParameters {
    #[schemars(description = "The search query.")]
    query: String,
    #[schemars(description = "Maximum number of results, default to 5.")]
    num_results: Option<usize>,
}

/// A tool for searching the web through DuckDuckGo's HTML endpoint.
pub struct WebSearchTool {
    client: Client,
    parameter_schema: Value,
}

impl WebSearchTool {
    /// Creates a new web search tool.
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|err| {
                warn!("failed to build the search client: {err}");
                Client::new()
            });
        WebSearchTool {
            client,
            parameter_schema: schema_for!(WebSearchParameters).to_value(),
        }
    }
}

impl Default for WebSearchTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for WebSearchTool {
    type Input = WebSearchParameters;

    fn name(&self) -> &str {
        "webSearch"
    }

    fn description(&self) -> &str {
        r#"
Searches the web and returns results with titles, snippets and URLs.
Use it for current information or documentation that is not available locally."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WebSearchParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        async move {
            let url =
                format!("{SEARCH_URL}{}", urlencoding::encode(&input.query));
            debug!("searching the web: {}", input.query);

            let html = async { client.get(&url).send().await?.text().await }
                .await
                .map_err(|err| {
                    ToolError::execution_error()
                        .with_reason(format!("Search request failed: {err}"))
                })?;

            let limit = input.num_results.unwrap_or(DEFAULT_NUM_RESULTS);
            let results = extract_results(&html, limit);
            if results.is_empty() {
                return Ok(format!("No results found for: {}", input.query));
            }
            Ok(results.join("\n\n"))
        }
    }
}

/// Text between the first `>` and the next `<` after `class="{class}"`.
fn class_text<'a>(chunk: &'a str, class: &str) -> Option<&'a str> {
    let marker = format!("class=\"{class}\"");
    let rest = chunk.split_once(marker.as_str())?.1;
    let text = rest.split_once('>')?.1;
    text.split('<').next().map(str::trim)
}

fn extract_results(html: &str, limit: usize) -> Vec<String> {
    html.split("class=\"result__body\"")
        .skip(1)
        .filter_map(|chunk| {
            let title =
                class_text(chunk, "result__a").filter(|t| !t.is_empty())?;
            let snippet =
                class_text(chunk, "result__snippet").unwrap_or_default();
            let url = class_text(chunk, "result__url").unwrap_or_default();
            Some(format!(
                "**{}**\n{}\nURL: {}",
                decode_entities(title),
                decode_entities(snippet),
                url
            ))
        })
        .take(limit)
        .collect()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
