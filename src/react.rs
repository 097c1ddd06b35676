//! ReAct reasoning loop - think, act, observe
//!
//! Runs one agent's bounded tool-use cycle against the reasoning service.
//! Every reasoning call goes through the retry wrapper; every tool call
//! requested in a response is dispatched concurrently and observed as a
//! structured result, in the original call order.

use crate::gemini::{ModelResponse, ReasoningService};
use crate::models::{visible_text, ChatMessage, MessageRole};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::tools::ToolRegistry;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Returned when no iteration produced usable text. The loop never fails
/// for lack of an answer.
pub const FALLBACK_ANSWER: &str = "Analysis could not be completed.";

/// Minimum length for a transcript entry to count as a substantive answer
/// when scanning backward for fallback text.
const MIN_SUBSTANTIVE_LEN: usize = 50;

pub struct ReactExecutor {
    service: Arc<dyn ReasoningService>,
    registry: Arc<ToolRegistry>,
    retry: RetryPolicy,
}

/// The result of one loop execution.
pub struct ReactOutcome {
    /// Candidate final answer (visible text only, never deliberation).
    pub text: String,
    /// The local working transcript, including tool results.
    pub transcript: Vec<ChatMessage>,
    pub iterations: u32,
    pub tool_calls_made: usize,
}

impl ReactExecutor {
    pub fn new(service: Arc<dyn ReasoningService>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            service,
            registry,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Execute the bounded loop: call the reasoning service, run any
    /// requested tools, feed the observations back, and stop on the first
    /// tool-free response or when the iteration budget runs out.
    pub async fn run(
        &self,
        system_prompt: &str,
        prior_messages: &[ChatMessage],
        tool_names: &[&str],
        max_iterations: u32,
        temperature: f32,
    ) -> Result<ReactOutcome> {
        let mut working: Vec<ChatMessage> = Vec::with_capacity(prior_messages.len() + 4);
        working.push(ChatMessage::system(system_prompt));
        working.extend_from_slice(prior_messages);

        let tool_defs = self.registry.definitions_for(tool_names);
        let mut last_response: Option<ModelResponse> = None;
        let mut iterations = 0u32;
        let mut tool_calls_made = 0usize;

        for iteration in 0..max_iterations {
            iterations = iteration + 1;
            debug!(iteration = iterations, "ReAct iteration");

            let response = retry_with_backoff(&self.retry, || {
                self.service.invoke(&working, &tool_defs, temperature)
            })
            .await?;

            let answer_text = visible_text(&response.blocks);
            working.push(ChatMessage::assistant_with_calls(
                answer_text,
                response.tool_calls.clone(),
            ));

            if response.tool_calls.is_empty() {
                last_response = Some(response);
                break;
            }

            // Dispatch every requested call concurrently; join_all yields
            // outputs in call order, so the transcript stays deterministic
            // even when execution completes out of order.
            let outputs = futures::future::join_all(
                response.tool_calls.iter().map(|call| self.registry.dispatch(call)),
            )
            .await;

            for (call, output) in response.tool_calls.iter().zip(outputs) {
                tool_calls_made += 1;
                let payload = serde_json::to_string(&output)?;
                working.push(ChatMessage::tool_result(&call.id, &call.name, payload));
            }

            last_response = Some(response);
        }

        if iterations == max_iterations && last_response.as_ref().is_some_and(|r| !r.tool_calls.is_empty()) {
            warn!(max_iterations, "ReAct loop exhausted its iteration budget");
        }

        let mut text = last_response
            .map(|r| visible_text(&r.blocks))
            .unwrap_or_default();

        // Thinking mode sometimes leaves the last response without visible
        // text; fall back to the most recent substantive answer.
        if text.trim().is_empty() {
            text = Self::scan_for_substantive(&working).unwrap_or_default();
        }

        if text.trim().is_empty() {
            text = FALLBACK_ANSWER.to_string();
        }

        info!(iterations, tool_calls_made, "ReAct loop completed");

        Ok(ReactOutcome {
            text,
            transcript: working,
            iterations,
            tool_calls_made,
        })
    }

    /// Backward scan over the working transcript (newest first, skipping
    /// the final entry whose text was already found empty) for the last
    /// assistant answer long enough to stand in as the result.
    fn scan_for_substantive(working: &[ChatMessage]) -> Option<String> {
        working
            .iter()
            .rev()
            .skip(1)
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.trim())
            .find(|c| c.len() > MIN_SUBSTANTIVE_LEN)
            .map(str::to_string)
    }
}
