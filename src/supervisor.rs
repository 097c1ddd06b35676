//! Supervisor routing.
//!
//! Two-phase decision: a deterministic pipeline phase that guarantees each
//! specialist reports at least once, then an adaptive phase where the
//! reasoning service picks the next step. A global iteration ceiling makes
//! termination unconditional.

use crate::agents::{CREDIT_EVALUATOR, GEOPOLITICAL_ANALYST, MARKET_SYNTHESIZER};
use crate::gemini::ReasoningService;
use crate::models::{visible_text, AgentState, ChatMessage, RouteDecision, StateUpdate};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Agents that must each report before adaptive routing begins, in the
/// order they are dispatched.
pub const REQUIRED_PIPELINE: [&str; 3] =
    [GEOPOLITICAL_ANALYST, CREDIT_EVALUATOR, MARKET_SYNTHESIZER];

/// Hard ceiling on agent dispatches per analysis.
pub const MAX_ITERATIONS: u32 = 10;

pub struct Supervisor {
    service: Arc<dyn ReasoningService>,
    retry: RetryPolicy,
}

impl Supervisor {
    pub fn new(service: Arc<dyn ReasoningService>) -> Self {
        Self {
            service,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Decide where the analysis goes next. Never fails on malformed
    /// routing output; only infrastructure errors propagate.
    pub async fn decide(&self, state: &AgentState) -> Result<StateUpdate> {
        if state.iteration_count >= MAX_ITERATIONS {
            warn!(
                iteration_count = state.iteration_count,
                "iteration ceiling reached, terminating"
            );
            return Ok(StateUpdate::route(RouteDecision::Terminate));
        }

        // Deterministic phase: first specialist that has not reported yet.
        for agent in REQUIRED_PIPELINE {
            if !state.has_reported(agent) {
                let decision = RouteDecision::parse(agent)
                    .unwrap_or(RouteDecision::Terminate);
                info!(next = %decision, "pipeline routing");
                return Ok(StateUpdate::route(decision));
            }
        }

        // Adaptive phase: ask the reasoning service.
        let mut messages =
            vec![ChatMessage::system(self.routing_context(state))];
        messages.extend_from_slice(&state.transcript);

        let response = retry_with_backoff(&self.retry, || {
            self.service.invoke(&messages, &[], 0.0)
        })
        .await?;

        let content = visible_text(&response.blocks);
        let decision = Self::parse_decision(&content);
        info!(next = %decision, "adaptive routing");
        Ok(StateUpdate::route(decision))
    }

    fn routing_context(&self, state: &AgentState) -> String {
        let reported: Vec<&str> = state
            .risk_signals
            .iter()
            .map(|s| s.agent.as_str())
            .collect();
        format!(
            "{}\n\nAgents that have already reported: [{}]. Dispatch {} of {} used.",
            crate::agents::prompts::SUPERVISOR_PROMPT,
            reported.join(", "),
            state.iteration_count,
            MAX_ITERATIONS,
        )
    }

    /// Permissive parse of the routing reply: embedded JSON first, then a
    /// case-insensitive substring scan, then terminate.
    fn parse_decision(content: &str) -> RouteDecision {
        if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
            if start < end {
                if let Ok(value) =
                    serde_json::from_str::<serde_json::Value>(&content[start..=end])
                {
                    if let Some(decision) =
                        value.get("next").and_then(|v| v.as_str()).and_then(RouteDecision::parse)
                    {
                        return decision;
                    }
                }
            }
        }

        let lowered = content.to_lowercase();
        for candidate in [
            RouteDecision::GeopoliticalAnalyst,
            RouteDecision::CreditEvaluator,
            RouteDecision::MarketSynthesizer,
        ] {
            if lowered.contains(candidate.as_str()) {
                return candidate;
            }
        }
        if lowered.contains("terminate") || lowered.contains("finish") {
            return RouteDecision::Terminate;
        }

        warn!(reply = %content, "unparseable routing reply, terminating");
        RouteDecision::Terminate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{ModelResponse, ScriptedService};
    use crate::models::{ChatMessage, RiskSignal};

    fn reported(state: &mut AgentState, agent: &str) {
        state.apply(StateUpdate {
            messages: vec![ChatMessage::assistant(Some(agent), "done")],
            risk_signals: vec![RiskSignal {
                agent: agent.to_string(),
                analysis: "done".into(),
            }],
            iteration_increment: 1,
            ..StateUpdate::default()
        });
    }

    fn supervisor(service: ScriptedService) -> Supervisor {
        Supervisor::new(Arc::new(service)).with_retry(RetryPolicy::fast())
    }

    #[tokio::test]
    async fn pipeline_runs_in_order_without_consulting_the_model() {
        let service = Arc::new(ScriptedService::new(vec![]));
        let sup = Supervisor::new(service.clone()).with_retry(RetryPolicy::fast());
        let mut state = AgentState::new("Assess AAPL");

        let first = sup.decide(&state).await.unwrap();
        assert_eq!(first.next_agent, Some(RouteDecision::GeopoliticalAnalyst));

        reported(&mut state, GEOPOLITICAL_ANALYST);
        let second = sup.decide(&state).await.unwrap();
        assert_eq!(second.next_agent, Some(RouteDecision::CreditEvaluator));

        reported(&mut state, CREDIT_EVALUATOR);
        let third = sup.decide(&state).await.unwrap();
        assert_eq!(third.next_agent, Some(RouteDecision::MarketSynthesizer));

        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn adaptive_phase_consults_the_model_after_full_pipeline() {
        let sup = supervisor(ScriptedService::single_text(r#"{"next": "TERMINATE"}"#));
        let mut state = AgentState::new("Assess AAPL");
        for agent in REQUIRED_PIPELINE {
            reported(&mut state, agent);
        }

        let update = sup.decide(&state).await.unwrap();
        assert_eq!(update.next_agent, Some(RouteDecision::Terminate));
    }

    #[tokio::test]
    async fn adaptive_phase_can_redispatch_an_agent() {
        let sup = supervisor(ScriptedService::single_text(
            r#"{"next": "credit_evaluator"}"#,
        ));
        let mut state = AgentState::new("Assess AAPL");
        for agent in REQUIRED_PIPELINE {
            reported(&mut state, agent);
        }

        let update = sup.decide(&state).await.unwrap();
        assert_eq!(update.next_agent, Some(RouteDecision::CreditEvaluator));
    }

    #[tokio::test]
    async fn ceiling_terminates_without_consulting_the_model() {
        let service = Arc::new(ScriptedService::new(vec![ModelResponse::text(
            r#"{"next": "credit_evaluator"}"#,
        )]));
        let sup = Supervisor::new(service.clone()).with_retry(RetryPolicy::fast());
        let mut state = AgentState::new("Assess AAPL");
        for agent in REQUIRED_PIPELINE {
            reported(&mut state, agent);
        }
        state.iteration_count = MAX_ITERATIONS;

        let update = sup.decide(&state).await.unwrap();
        assert_eq!(update.next_agent, Some(RouteDecision::Terminate));
        assert_eq!(service.calls(), 0);
    }

    #[test]
    fn parse_embedded_json() {
        assert_eq!(
            Supervisor::parse_decision(r#"Sure thing. {"next": "market_synthesizer"} done."#),
            RouteDecision::MarketSynthesizer
        );
    }

    #[test]
    fn parse_falls_back_to_substring_scan() {
        assert_eq!(
            Supervisor::parse_decision("not valid json credit_evaluator please"),
            RouteDecision::CreditEvaluator
        );
        assert_eq!(
            Supervisor::parse_decision("I think we should FINISH here"),
            RouteDecision::Terminate
        );
    }

    #[test]
    fn parse_garbage_terminates() {
        assert_eq!(
            Supervisor::parse_decision("no routable content at all"),
            RouteDecision::Terminate
        );
    }

    #[test]
    fn parse_json_with_unknown_agent_falls_through() {
        assert_eq!(
            Supervisor::parse_decision(r#"{"next": "astrologer"} maybe geopolitical_analyst"#),
            RouteDecision::GeopoliticalAnalyst
        );
    }
}
