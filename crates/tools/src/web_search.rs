//! Web search tool backed by the Brave Search API.
//!
//! Without an API key the tool degrades to a helpful message with a manual
//! search URL rather than failing the turn.

use async_trait::async_trait;
use pincer_core::error::ToolError;
use pincer_core::tool::{Tool, ToolContext};
use serde::Deserialize;

const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
const MAX_RESULTS: usize = 20;

pub struct WebSearchTool {
    http: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

fn format_results(query: &str, results: &[BraveResult]) -> String {
    if results.is_empty() {
        return format!("No results for '{query}'.");
    }
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}\n   {}\n   {}", i + 1, r.title, r.url, r.description))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn manual_search_url(query: &str) -> String {
    format!("https://search.brave.com/search?q={}", query.replace(' ', "+"))
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns result titles, URLs, and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "count": {
                    "type": "integer",
                    "description": "Number of results to return"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let api_key = &ctx.settings.web_search_api_key;
        if api_key.is_empty() {
            return Ok(format!(
                "Web search is not configured (no Brave Search API key). \
                 You can search manually: {}",
                manual_search_url(query)
            ));
        }

        let count = arguments["count"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(ctx.settings.web_search_max_results)
            .min(MAX_RESULTS);

        let count_param = count.to_string();
        let response = self
            .http
            .get(BRAVE_ENDPOINT)
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", count_param.as_str())])
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_search".into(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Ok(format!(
                "Search failed with HTTP {}. Try manually: {}",
                response.status().as_u16(),
                manual_search_url(query)
            ));
        }

        let body: BraveResponse =
            response.json().await.map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_search".into(),
                reason: format!("bad response body: {e}"),
            })?;

        let results = body.web.map(|w| w.results).unwrap_or_default();
        Ok(format_results(query, &results))
    }
}
