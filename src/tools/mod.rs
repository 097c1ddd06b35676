//! Tool trait and registry
//!
//! Tools are the external collaborators the agents call during their
//! reasoning loops. Dispatch never raises: unknown tool names and tool
//! failures both degrade to a structured error `ToolOutput`, so the
//! reasoning service can observe what went wrong and adapt.

use crate::error::OrchestrationError;
use crate::models::{ToolCall, ToolOutput};
use crate::Result;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub mod disclosures;
pub use disclosures::DisclosureIndex;

/// Function declaration handed to the reasoning service when binding a
/// tool subset.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the accepted arguments.
    fn parameters(&self) -> Value;
    async fn execute(&self, arguments: &Value) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Declarations for a named subset, in the order given. Unknown names
    /// are skipped; each agent binds only its own subset.
    pub fn definitions_for(&self, names: &[&str]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|n| self.tools.get(*n))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// Execute one requested call. Infallible by contract: failures come
    /// back as `ToolOutput { success: false, .. }`.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolOutput {
        match self.tools.get(&call.name) {
            Some(tool) => match tool.execute(&call.arguments).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool execution failed");
                    ToolOutput::failure(format!("Tool {} failed: {}", call.name, e))
                }
            },
            None => {
                warn!(tool = %call.name, "Unknown tool requested");
                ToolOutput::failure(format!("Unknown tool: {}", call.name))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            OrchestrationError::InvalidToolInput(format!("Expected non-empty '{}' argument", key))
        })
}

fn string_param(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

// =============================
// Search API client
// =============================

/// Shared HTTP client for the news / web search backend.
#[derive(Clone)]
struct SearchApiClient {
    client: Client,
    base_url: String,
}

impl SearchApiClient {
    fn from_env() -> Option<Self> {
        let base_url = env::var("SEARCH_API_BASE_URL").ok()?;

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .ok()?;

        Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                OrchestrationError::ToolError(format!("Search API request failed for {}: {}", path, e))
            })?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| OrchestrationError::ToolError(format!("Invalid JSON response: {}", e)))?;

        if !status.is_success() {
            return Err(OrchestrationError::ToolError(format!(
                "Search API returned {} for {}: {}",
                status, path, body
            )));
        }

        Ok(body)
    }
}

// =============================
// Market data
// =============================

/// Market snapshot and credit-relevant ratios for a ticker.
pub struct MarketDataTool;

#[async_trait::async_trait]
impl Tool for MarketDataTool {
    fn name(&self) -> &'static str {
        "get_market_data"
    }

    fn description(&self) -> &'static str {
        "Fetch market snapshot, financial ratios, and credit signals for a stock ticker"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": string_param("Stock ticker symbol, e.g. 'AAPL'"),
            },
            "required": ["ticker"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let ticker = require_str(arguments, "ticker")?.to_uppercase();

        // Reference dataset; a market-data provider slots in behind the
        // same payload shape.
        let (company, price, pe, debt_to_equity, current_ratio) = match ticker.as_str() {
            "AAPL" => ("Apple Inc.", 229.35, 34.8, 154.5, 0.95),
            "MSFT" => ("Microsoft Corporation", 428.10, 36.2, 36.9, 1.28),
            "TSLA" => ("Tesla, Inc.", 243.90, 68.1, 17.4, 1.84),
            _ => {
                return Ok(ToolOutput::failure(format!(
                    "No market data available for {}",
                    ticker
                )))
            }
        };

        Ok(ToolOutput::ok(json!({
            "ticker": ticker,
            "company": company,
            "market_snapshot": {
                "current_price": price,
                "currency": "USD",
            },
            "financial_ratios": {
                "pe_ratio": pe,
                "debt_to_equity": debt_to_equity,
                "current_ratio": current_ratio,
            },
            "credit_signals": {
                "recommendation": "hold",
            },
        })))
    }
}

// =============================
// News / web search
// =============================

pub struct NewsSearchTool {
    api: Option<SearchApiClient>,
}

#[async_trait::async_trait]
impl Tool for NewsSearchTool {
    fn name(&self) -> &'static str {
        "search_geopolitical_news"
    }

    fn description(&self) -> &'static str {
        "Search recent geopolitical and macro-economic news articles"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": string_param("News search query"),
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let query = require_str(arguments, "query")?;
        let api = self.api.as_ref().ok_or_else(|| {
            OrchestrationError::ToolError("SEARCH_API_BASE_URL is not configured".to_string())
        })?;

        let body = api.get_json("/news", &[("q", query), ("max_results", "8")]).await?;
        let articles = body.get("articles").cloned().unwrap_or_else(|| json!([]));

        Ok(ToolOutput::ok(json!({
            "query": query,
            "num_results": articles.as_array().map(Vec::len).unwrap_or(0),
            "articles": articles,
        })))
    }
}

pub struct WebSearchTool {
    api: Option<SearchApiClient>,
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "search_web_general"
    }

    fn description(&self) -> &'static str {
        "General web search for background research and context"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": string_param("Web search query"),
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let query = require_str(arguments, "query")?;
        let api = self.api.as_ref().ok_or_else(|| {
            OrchestrationError::ToolError("SEARCH_API_BASE_URL is not configured".to_string())
        })?;

        let body = api.get_json("/search", &[("q", query), ("max_results", "5")]).await?;
        let results = body.get("results").cloned().unwrap_or_else(|| json!([]));

        Ok(ToolOutput::ok(json!({
            "query": query,
            "num_results": results.as_array().map(Vec::len).unwrap_or(0),
            "results": results,
        })))
    }
}

// =============================
// Corporate disclosures
// =============================

pub struct DisclosureSearchTool {
    index: Arc<DisclosureIndex>,
}

impl DisclosureSearchTool {
    pub fn new(index: Arc<DisclosureIndex>) -> Self {
        Self { index }
    }
}

#[async_trait::async_trait]
impl Tool for DisclosureSearchTool {
    fn name(&self) -> &'static str {
        "search_corporate_disclosures"
    }

    fn description(&self) -> &'static str {
        "Semantic search over corporate filings, annual reports, and rating commentary"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": string_param("Retrieval query"),
                "company": string_param("Optional company name filter"),
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let query = require_str(arguments, "query")?;
        let company = arguments.get("company").and_then(Value::as_str);

        let hits = self.index.search(query, company, 4).await;

        Ok(ToolOutput::ok(json!({
            "query": query,
            "num_results": hits.len(),
            "documents": hits,
        })))
    }
}

/// Create the default registry with every tool the pipeline's agents may
/// bind. The disclosure index is injected so all runs share one
/// read-only corpus.
pub fn create_default_registry(index: Arc<DisclosureIndex>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let search_api = SearchApiClient::from_env();

    registry.register(Arc::new(MarketDataTool));
    registry.register(Arc::new(NewsSearchTool { api: search_api.clone() }));
    registry.register(Arc::new(WebSearchTool { api: search_api }));
    registry.register(Arc::new(DisclosureSearchTool::new(index)));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        create_default_registry(Arc::new(DisclosureIndex::new()))
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall { id: "call-1".into(), name: name.into(), arguments }
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_returns_structured_error() {
        let registry = registry();
        let output = registry.dispatch(&call("foo", json!({}))).await;
        assert!(!output.success);
        assert!(output.error.as_deref().unwrap_or("").contains("Unknown tool: foo"));
    }

    #[tokio::test]
    async fn dispatch_invalid_input_returns_structured_error() {
        let registry = registry();
        let output = registry.dispatch(&call("get_market_data", json!({}))).await;
        assert!(!output.success);
        assert!(output.error.is_some());
    }

    #[tokio::test]
    async fn market_data_payload_shape() {
        let registry = registry();
        let output = registry
            .dispatch(&call("get_market_data", json!({ "ticker": "aapl" })))
            .await;
        assert!(output.success);
        assert_eq!(output.data["ticker"], "AAPL");
        assert!(output.data["market_snapshot"]["current_price"].is_number());
        assert!(output.data["financial_ratios"]["debt_to_equity"].is_number());
    }

    #[tokio::test]
    async fn disclosure_search_returns_documents() {
        let registry = registry();
        let output = registry
            .dispatch(&call(
                "search_corporate_disclosures",
                json!({ "query": "semiconductor supply chain" }),
            ))
            .await;
        assert!(output.success);
        assert!(output.data["documents"].as_array().map(Vec::len).unwrap_or(0) > 0);
    }

    #[tokio::test]
    async fn news_search_unconfigured_degrades_to_error_output() {
        // SEARCH_API_BASE_URL is not set in the test environment.
        let registry = registry();
        let output = registry
            .dispatch(&call("search_geopolitical_news", json!({ "query": "tariffs" })))
            .await;
        assert!(!output.success);
        assert!(output.data.get("error").is_some());
    }

    #[test]
    fn definitions_follow_requested_subset() {
        let registry = registry();
        let defs = registry.definitions_for(&[
            "search_geopolitical_news",
            "search_web_general",
            "search_corporate_disclosures",
        ]);
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].name, "search_geopolitical_news");
        assert!(defs.iter().all(|d| d.parameters.get("properties").is_some()));

        // Unknown names are skipped rather than erroring.
        let defs = registry.definitions_for(&["get_market_data", "nope"]);
        assert_eq!(defs.len(), 1);
    }
}
