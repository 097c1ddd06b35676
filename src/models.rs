//! Core data models for the multi-agent risk analysis pipeline
//!
//! `AgentState` is the single shared record threaded through every graph
//! step. Steps never mutate it directly; they return a `StateUpdate` that
//! the executor applies through `AgentState::apply`, which encodes the
//! per-field merge rules (append / overwrite / increment).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Routing =================
//

/// Routing decision produced by the supervisor. Agent nodes never produce
/// one; they always hand control back to the supervisor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    GeopoliticalAnalyst,
    CreditEvaluator,
    MarketSynthesizer,
    Terminate,
}

impl RouteDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteDecision::GeopoliticalAnalyst => "geopolitical_analyst",
            RouteDecision::CreditEvaluator => "credit_evaluator",
            RouteDecision::MarketSynthesizer => "market_synthesizer",
            RouteDecision::Terminate => "TERMINATE",
        }
    }

    pub fn parse(name: &str) -> Option<RouteDecision> {
        match name {
            "geopolitical_analyst" => Some(RouteDecision::GeopoliticalAnalyst),
            "credit_evaluator" => Some(RouteDecision::CreditEvaluator),
            "market_synthesizer" => Some(RouteDecision::MarketSynthesizer),
            "TERMINATE" | "terminate" | "FINISH" => Some(RouteDecision::Terminate),
            _ => None,
        }
    }
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= Transcript =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
}

/// One transcript entry. Entries are append-only: they are never removed
/// or reordered once applied to the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    /// Attribution for assistant messages produced by a named agent.
    pub agent: Option<String>,
    pub content: String,
    /// Pairs tool results with the call that requested them.
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced a tool-result entry.
    pub tool_name: Option<String>,
    /// Tool invocations requested by an assistant entry.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, None, content, None, None)
    }

    pub fn assistant(agent: Option<&str>, content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, agent.map(str::to_string), content, None, None)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, None, content, None, None)
    }

    pub fn tool_result(call_id: &str, tool_name: &str, content: impl Into<String>) -> Self {
        Self::new(
            MessageRole::Tool,
            None,
            content,
            Some(call_id.to_string()),
            Some(tool_name.to_string()),
        )
    }

    /// Assistant entry that requested tool invocations.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(MessageRole::Assistant, None, content, None, None);
        msg.tool_calls = calls;
        msg
    }

    fn new(
        role: MessageRole,
        agent: Option<String>,
        content: impl Into<String>,
        tool_call_id: Option<String>,
        tool_name: Option<String>,
    ) -> Self {
        Self {
            role,
            agent,
            content: content.into(),
            tool_call_id,
            tool_name,
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

//
// ================= Model content =================
//

/// A typed content block from the reasoning service. Gemini's thinking mode
/// interleaves internal deliberation with visible answer text; only `Text`
/// blocks may ever reach the final answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum ContentBlock {
    Text(String),
    Thought(String),
}

/// Concatenate the visible-answer portion of a block sequence, skipping
/// deliberation blocks and empty text.
pub fn visible_text(blocks: &[ContentBlock]) -> String {
    let parts: Vec<&str> = blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text(t) if !t.trim().is_empty() => Some(t.as_str()),
            _ => None,
        })
        .collect();
    parts.join("\n")
}

//
// ================= Tool I/O =================
//

/// A tool invocation requested by the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Structured tool result. Dispatch failures are encoded here rather than
/// raised, so the reasoning loop can always append an observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: serde_json::Value) -> Self {
        Self { success: true, data, error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            data: serde_json::json!({ "error": message }),
            error: Some(message),
        }
    }
}

//
// ================= Risk signals =================
//

/// Per-agent completion record; the "who has reported" ledger the
/// supervisor uses to enforce pipeline order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSignal {
    pub agent: String,
    pub analysis: String,
}

//
// ================= Shared state =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub transcript: Vec<ChatMessage>,
    pub next_agent: RouteDecision,
    pub risk_signals: Vec<RiskSignal>,
    pub final_report: String,
    pub iteration_count: u32,
}

impl AgentState {
    /// Fresh state for a new analysis run, seeded with the user query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            transcript: vec![ChatMessage::user(query)],
            next_agent: RouteDecision::Terminate,
            risk_signals: Vec::new(),
            final_report: String::new(),
            iteration_count: 0,
        }
    }

    /// True once the named agent has contributed a risk signal.
    pub fn has_reported(&self, agent: &str) -> bool {
        self.risk_signals.iter().any(|s| s.agent == agent)
    }

    /// Apply a partial update. Merge rules:
    /// - `transcript`, `risk_signals`: append
    /// - `next_agent`: overwrite
    /// - `final_report`: write-once (first non-empty value wins)
    /// - `iteration_count`: increment
    pub fn apply(&mut self, update: StateUpdate) {
        self.transcript.extend(update.messages);
        self.risk_signals.extend(update.risk_signals);
        if let Some(next) = update.next_agent {
            self.next_agent = next;
        }
        if let Some(report) = update.final_report {
            if self.final_report.is_empty() && !report.is_empty() {
                self.final_report = report;
            }
        }
        self.iteration_count += update.iteration_increment;
    }
}

/// Partial state update returned by a supervisor or agent-node step.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub messages: Vec<ChatMessage>,
    pub risk_signals: Vec<RiskSignal>,
    pub next_agent: Option<RouteDecision>,
    pub final_report: Option<String>,
    pub iteration_increment: u32,
}

impl StateUpdate {
    pub fn route(next: RouteDecision) -> Self {
        Self { next_agent: Some(next), ..Default::default() }
    }
}
