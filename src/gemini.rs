//! Gemini API client — the fallible upstream reasoning service
//!
//! Wraps the generateContent REST endpoint with function calling. Uses a
//! long-lived reqwest::Client for connection pooling. HTTP 429 and
//! RESOURCE_EXHAUSTED responses map to `OrchestrationError::RateLimited`
//! so the resilience wrapper can classify them.

use crate::error::OrchestrationError;
use crate::models::{ChatMessage, ContentBlock, MessageRole, ToolCall};
use crate::tools::ToolDefinition;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// One reasoning-service response: typed content blocks plus zero or more
/// tool-call requests carrying stable call identifiers.
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub blocks: Vec<ContentBlock>,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            blocks: vec![ContentBlock::Text(content.into())],
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            blocks: vec![ContentBlock::Text(content.into())],
            tool_calls,
        }
    }
}

/// Seam between the orchestration layers and the upstream LLM. The graph,
/// supervisor, and reasoning loop only ever see this trait.
#[async_trait::async_trait]
pub trait ReasoningService: Send + Sync {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        temperature: f32,
    ) -> crate::Result<ModelResponse>;
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent".to_string(),
        }
    }

    fn build_request(
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        temperature: f32,
    ) -> GeminiRequest {
        // System entries become the systemInstruction; everything else is
        // replayed as alternating user/model turns.
        let system_text: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let mut contents = Vec::new();
        for msg in messages {
            match msg.role {
                MessageRole::System => {}
                MessageRole::User => contents.push(Content {
                    role: "user".into(),
                    parts: vec![Part::text(&msg.content)],
                }),
                MessageRole::Assistant => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(Part::text(&msg.content));
                    }
                    for call in &msg.tool_calls {
                        parts.push(Part::function_call(&call.name, call.arguments.clone()));
                    }
                    if !parts.is_empty() {
                        contents.push(Content { role: "model".into(), parts });
                    }
                }
                MessageRole::Tool => {
                    let name = msg.tool_name.as_deref().unwrap_or("unknown");
                    let response: Value = serde_json::from_str(&msg.content)
                        .unwrap_or_else(|_| json!({ "content": msg.content }));
                    contents.push(Content {
                        role: "user".into(),
                        parts: vec![Part::function_response(name, response)],
                    });
                }
            }
        }

        let tool_decls = if tools.is_empty() {
            None
        } else {
            Some(vec![ToolDeclarations {
                function_declarations: tools
                    .iter()
                    .map(|t| FunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    })
                    .collect(),
            }])
        };

        GeminiRequest {
            contents,
            tools: tool_decls,
            generation_config: GenerationConfig {
                temperature,
                top_p: 0.9,
                max_output_tokens: 8192,
            },
            system_instruction: if system_text.is_empty() {
                None
            } else {
                Some(SystemInstruction {
                    parts: vec![Part::text(&system_text.join("\n\n"))],
                })
            },
        }
    }

    fn parse_response(response: GeminiResponse) -> crate::Result<ModelResponse> {
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            OrchestrationError::LlmError("No candidates in Gemini response".to_string())
        })?;

        let mut blocks = Vec::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.parts {
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall {
                    id: format!("call-{}", Uuid::new_v4()),
                    name: call.name,
                    arguments: call.args,
                });
            } else if let Some(text) = part.text {
                if part.thought {
                    blocks.push(ContentBlock::Thought(text));
                } else {
                    blocks.push(ContentBlock::Text(text));
                }
            }
        }

        Ok(ModelResponse { blocks, tool_calls })
    }
}

#[async_trait::async_trait]
impl ReasoningService for GeminiClient {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        temperature: f32,
    ) -> crate::Result<ModelResponse> {
        if self.api_key.is_empty() {
            return Err(OrchestrationError::LlmError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);
        let request = Self::build_request(messages, tools, temperature);

        debug!(
            messages = messages.len(),
            tools = tools.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                OrchestrationError::LlmError(format!("Gemini API error: {}", e))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestrationError::RateLimited(format!("HTTP 429: {}", body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", body);
            if body.contains("RESOURCE_EXHAUSTED") || body.to_lowercase().contains("quota") {
                return Err(OrchestrationError::RateLimited(body));
            }
            return Err(OrchestrationError::LlmError(format!(
                "Gemini API returned {}: {}",
                status, body
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            OrchestrationError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let parsed = Self::parse_response(gemini_response)?;
        info!(
            blocks = parsed.blocks.len(),
            tool_calls = parsed.tool_calls.len(),
            "Gemini response received"
        );
        Ok(parsed)
    }
}

// =============================
// Wire format
// =============================

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDeclarations>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize)]
struct ToolDeclarations {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    thought: bool,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCallPart>,
    #[serde(rename = "functionResponse", skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponsePart>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self { text: Some(text.to_string()), ..Default::default() }
    }

    fn function_call(name: &str, args: Value) -> Self {
        Self {
            function_call: Some(FunctionCallPart { name: name.to_string(), args }),
            ..Default::default()
        }
    }

    fn function_response(name: &str, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponsePart {
                name: name.to_string(),
                response,
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCallPart {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponsePart {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

// =============================
// Scripted service
// =============================

/// Deterministic reasoning service for tests and offline demos. Pops a
/// queued response per call; once the script is exhausted, replays the
/// last response.
pub struct ScriptedService {
    script: std::sync::Mutex<std::collections::VecDeque<ModelResponse>>,
    last: std::sync::Mutex<Option<ModelResponse>>,
    calls: std::sync::atomic::AtomicUsize,
}

impl ScriptedService {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            script: std::sync::Mutex::new(responses.into_iter().collect()),
            last: std::sync::Mutex::new(None),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![ModelResponse::text(text)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReasoningService for ScriptedService {
    async fn invoke(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
        _temperature: f32,
    ) -> crate::Result<ModelResponse> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let mut script = self.script.lock().expect("script lock poisoned");
        match script.pop_front() {
            Some(response) => {
                *self.last.lock().expect("last lock poisoned") = Some(response.clone());
                Ok(response)
            }
            None => {
                let last = self.last.lock().expect("last lock poisoned");
                Ok(last.clone().unwrap_or_else(|| ModelResponse::text("Done.")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization_includes_tools_and_system() {
        let messages = vec![
            ChatMessage::system("You are an analyst"),
            ChatMessage::user("Assess AAPL"),
        ];
        let tools = vec![ToolDefinition {
            name: "get_market_data".into(),
            description: "Fetch market data".into(),
            parameters: json!({ "type": "object", "properties": {} }),
        }];

        let request = GeminiClient::build_request(&messages, &tools, 0.2);
        let serialized = serde_json::to_value(&request).unwrap();

        assert_eq!(serialized["contents"].as_array().unwrap().len(), 1);
        assert_eq!(serialized["contents"][0]["role"], "user");
        assert_eq!(
            serialized["tools"][0]["functionDeclarations"][0]["name"],
            "get_market_data"
        );
        assert!(serialized["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("analyst"));
    }

    #[test]
    fn tool_result_messages_become_function_responses() {
        let messages = vec![
            ChatMessage::user("q"),
            ChatMessage::assistant_with_calls(
                "",
                vec![ToolCall {
                    id: "call-1".into(),
                    name: "get_market_data".into(),
                    arguments: json!({ "ticker": "AAPL" }),
                }],
            ),
            ChatMessage::tool_result("call-1", "get_market_data", r#"{"success":true}"#),
        ];

        let request = GeminiClient::build_request(&messages, &[], 0.0);
        let serialized = serde_json::to_value(&request).unwrap();
        let contents = serialized["contents"].as_array().unwrap();

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "get_market_data");
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["success"],
            true
        );
    }

    #[test]
    fn response_parsing_separates_thought_and_text() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "internal reasoning", "thought": true },
                        { "text": "Visible answer" },
                        { "functionCall": { "name": "search_web_general", "args": { "query": "x" } } }
                    ]
                }
            }]
        });

        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        let parsed = GeminiClient::parse_response(response).unwrap();

        assert_eq!(parsed.blocks.len(), 2);
        assert!(matches!(parsed.blocks[0], ContentBlock::Thought(_)));
        assert!(matches!(parsed.blocks[1], ContentBlock::Text(_)));
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "search_web_general");
        assert!(parsed.tool_calls[0].id.starts_with("call-"));
    }

    #[tokio::test]
    async fn scripted_service_pops_then_repeats() {
        let service = ScriptedService::new(vec![
            ModelResponse::text("first"),
            ModelResponse::text("second"),
        ]);

        let a = service.invoke(&[], &[], 0.0).await.unwrap();
        let b = service.invoke(&[], &[], 0.0).await.unwrap();
        let c = service.invoke(&[], &[], 0.0).await.unwrap();

        assert_eq!(crate::models::visible_text(&a.blocks), "first");
        assert_eq!(crate::models::visible_text(&b.blocks), "second");
        assert_eq!(crate::models::visible_text(&c.blocks), "second");
        assert_eq!(service.calls(), 3);
    }
}
