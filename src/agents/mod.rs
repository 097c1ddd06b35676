//! Analyst agent nodes.
//!
//! Each node pairs a system prompt with a tool subset and loop budget,
//! runs the ReAct executor over the shared transcript, and returns a
//! partial state update. Nodes never mutate shared state directly.

pub mod prompts;

use crate::models::{AgentState, ChatMessage, RiskSignal, StateUpdate};
use crate::react::ReactExecutor;
use crate::Result;
use chrono::Utc;
use tracing::info;

pub use prompts::REPORT_MARKER;

pub const GEOPOLITICAL_ANALYST: &str = "geopolitical_analyst";
pub const CREDIT_EVALUATOR: &str = "credit_evaluator";
pub const MARKET_SYNTHESIZER: &str = "market_synthesizer";

pub struct AgentNode {
    name: &'static str,
    label: &'static str,
    system_prompt: String,
    tools: Vec<&'static str>,
    max_iterations: u32,
    temperature: f32,
    terminal: bool,
}

impl AgentNode {
    pub fn geopolitical_analyst() -> Self {
        Self {
            name: GEOPOLITICAL_ANALYST,
            label: "[GEOPOLITICAL ANALYST]",
            system_prompt: prompts::GEOPOLITICAL_ANALYST_PROMPT.to_string(),
            tools: vec![
                "search_geopolitical_news",
                "search_web_general",
                "search_corporate_disclosures",
            ],
            max_iterations: 6,
            temperature: 0.2,
            terminal: false,
        }
    }

    pub fn credit_evaluator() -> Self {
        Self {
            name: CREDIT_EVALUATOR,
            label: "[CREDIT EVALUATOR]",
            system_prompt: prompts::CREDIT_EVALUATOR_PROMPT.to_string(),
            tools: vec![
                "get_market_data",
                "search_corporate_disclosures",
                "search_web_general",
            ],
            max_iterations: 6,
            temperature: 0.1,
            terminal: false,
        }
    }

    pub fn market_synthesizer() -> Self {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        Self {
            name: MARKET_SYNTHESIZER,
            label: "[MARKET SYNTHESIZER]",
            system_prompt: prompts::MARKET_SYNTHESIZER_PROMPT_TEMPLATE
                .replace("{today}", &today),
            tools: vec!["search_corporate_disclosures", "search_web_general"],
            max_iterations: 4,
            temperature: 0.15,
            terminal: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this node produces the final report.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Run the node's ReAct loop over the shared transcript and build the
    /// partial update the graph will apply.
    pub async fn run(&self, executor: &ReactExecutor, state: &AgentState) -> Result<StateUpdate> {
        info!(agent = self.name, "running agent node");

        let outcome = executor
            .run(
                &self.system_prompt,
                &state.transcript,
                &self.tools,
                self.max_iterations,
                self.temperature,
            )
            .await?;

        let text = if self.terminal {
            strip_preamble(&outcome.text)
        } else {
            outcome.text.clone()
        };

        let mut update = StateUpdate {
            messages: vec![ChatMessage::assistant(
                Some(self.name),
                format!("{}\n\n{}", self.label, text),
            )],
            risk_signals: vec![RiskSignal {
                agent: self.name.to_string(),
                analysis: text.clone(),
            }],
            iteration_increment: 1,
            ..StateUpdate::default()
        };
        if self.terminal {
            update.final_report = Some(text);
        }

        info!(
            agent = self.name,
            iterations = outcome.iterations,
            tool_calls = outcome.tool_calls_made,
            "agent node finished"
        );
        Ok(update)
    }
}

/// Drop any chatter ahead of the report divider. Reports without the
/// divider pass through unchanged.
fn strip_preamble(text: &str) -> String {
    match text.find(REPORT_MARKER) {
        Some(idx) => text[idx..].to_string(),
        None => text.to_string(),
    }
}
