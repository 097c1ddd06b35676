//! Analysis graph.
//!
//! Iterative driver over the supervisor and the agent nodes: decide,
//! dispatch, apply the update, checkpoint, repeat until the supervisor
//! terminates. Per-step traces record what ran and how long it took.

use crate::agents::AgentNode;
use crate::checkpoint::CheckpointStore;
use crate::gemini::ReasoningService;
use crate::models::{AgentState, RouteDecision};
use crate::react::ReactExecutor;
use crate::retry::RetryPolicy;
use crate::supervisor::{Supervisor, MAX_ITERATIONS};
use crate::tools::ToolRegistry;
use crate::{OrchestrationError, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Absolute bound on graph steps. Every agent dispatch is preceded by one
/// supervisor step, plus the final terminating decision.
const MAX_STEPS: usize = (MAX_ITERATIONS as usize) * 2 + 1;

/// One executed graph step.
#[derive(Debug, Clone)]
pub struct StepTrace {
    pub step: usize,
    pub node: String,
    pub decision: Option<RouteDecision>,
    pub elapsed_ms: u64,
}

/// Final state plus the step-by-step execution trace.
pub struct AnalysisRun {
    pub state: AgentState,
    pub trace: Vec<StepTrace>,
}

pub struct AnalysisGraph {
    supervisor: Supervisor,
    executor: ReactExecutor,
    nodes: Vec<AgentNode>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl AnalysisGraph {
    pub fn new(service: Arc<dyn ReasoningService>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            supervisor: Supervisor::new(service.clone()),
            executor: ReactExecutor::new(service, registry),
            nodes: vec![
                AgentNode::geopolitical_analyst(),
                AgentNode::credit_evaluator(),
                AgentNode::market_synthesizer(),
            ],
            checkpoints: None,
        }
    }

    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.supervisor = self.supervisor.with_retry(retry.clone());
        self.executor = self.executor.with_retry(retry);
        self
    }

    /// Run one analysis to completion, resuming from a checkpoint when one
    /// exists for the session.
    pub async fn run(&self, query: &str, session_id: Uuid) -> Result<AnalysisRun> {
        let mut state = match self.load_checkpoint(session_id).await? {
            Some(saved) => {
                info!(%session_id, iteration_count = saved.iteration_count, "resuming from checkpoint");
                saved
            }
            None => AgentState::new(query),
        };

        let mut trace = Vec::new();
        let mut step = 0usize;

        loop {
            if step >= MAX_STEPS {
                return Err(OrchestrationError::GraphError(format!(
                    "step bound {MAX_STEPS} exceeded for session {session_id}"
                )));
            }

            step += 1;
            let started = Instant::now();
            let update = self.supervisor.decide(&state).await?;
            let decision = update.next_agent;
            state.apply(update);
            self.save_checkpoint(session_id, &state).await;
            trace.push(StepTrace {
                step,
                node: "supervisor".to_string(),
                decision,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });

            let decision = decision.unwrap_or(RouteDecision::Terminate);
            if decision == RouteDecision::Terminate {
                break;
            }

            let node = self
                .nodes
                .iter()
                .find(|n| n.name() == decision.as_str())
                .ok_or_else(|| {
                    OrchestrationError::RoutingError(format!(
                        "no node registered for route {decision}"
                    ))
                })?;

            step += 1;
            let started = Instant::now();
            let update = node.run(&self.executor, &state).await?;
            state.apply(update);
            self.save_checkpoint(session_id, &state).await;
            trace.push(StepTrace {
                step,
                node: node.name().to_string(),
                decision: None,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        info!(
            %session_id,
            steps = trace.len(),
            iterations = state.iteration_count,
            "analysis complete"
        );
        Ok(AnalysisRun { state, trace })
    }

    async fn load_checkpoint(&self, session_id: Uuid) -> Result<Option<AgentState>> {
        match &self.checkpoints {
            Some(store) => store.load(session_id).await,
            None => Ok(None),
        }
    }

    /// Save failures degrade the run to best-effort persistence rather
    /// than aborting a live analysis.
    async fn save_checkpoint(&self, session_id: Uuid, state: &AgentState) {
        if let Some(store) = &self.checkpoints {
            if let Err(e) = store.save(session_id, state).await {
                warn!(%session_id, error = %e, "checkpoint save failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{CREDIT_EVALUATOR, GEOPOLITICAL_ANALYST, MARKET_SYNTHESIZER};
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::gemini::{ModelResponse, ScriptedService};
    use crate::tools::{create_default_registry, DisclosureIndex};

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(create_default_registry(Arc::new(DisclosureIndex::new())))
    }

    /// Script for a clean run: three agent replies, each consumed by one
    /// ReAct loop in pipeline order, then one adaptive supervisor reply.
    fn full_run_script() -> ScriptedService {
        ScriptedService::new(vec![
            ModelResponse::text("Geopolitical brief: exposure is MODERATE."),
            ModelResponse::text("Credit assessment: stance is ADEQUATE."),
            ModelResponse::text(
                "═══════\nINTEGRATED RISK REPORT\n═══════\nOVERALL RISK: MODERATE",
            ),
            ModelResponse::text(r#"{"next": "TERMINATE"}"#),
        ])
    }

    #[tokio::test]
    async fn full_pipeline_produces_report_and_trace() {
        let graph = AnalysisGraph::new(Arc::new(full_run_script()), registry())
            .with_retry(RetryPolicy::fast());

        let run = graph.run("Assess AAPL", Uuid::new_v4()).await.unwrap();

        assert!(run.state.final_report.contains("OVERALL RISK: MODERATE"));
        assert_eq!(run.state.iteration_count, 3);
        assert_eq!(run.state.risk_signals.len(), 3);

        let order: Vec<&str> = run.trace.iter().map(|t| t.node.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "supervisor",
                GEOPOLITICAL_ANALYST,
                "supervisor",
                CREDIT_EVALUATOR,
                "supervisor",
                MARKET_SYNTHESIZER,
                "supervisor",
            ]
        );
        assert_eq!(
            run.trace.last().unwrap().decision,
            Some(RouteDecision::Terminate)
        );
    }

    #[tokio::test]
    async fn checkpoints_are_written_every_step() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let graph = AnalysisGraph::new(Arc::new(full_run_script()), registry())
            .with_retry(RetryPolicy::fast())
            .with_checkpoints(store.clone());

        let session = Uuid::new_v4();
        let run = graph.run("Assess AAPL", session).await.unwrap();

        let saved = store.load(session).await.unwrap().expect("final checkpoint");
        assert_eq!(saved.final_report, run.state.final_report);
        assert_eq!(saved.iteration_count, run.state.iteration_count);
    }

    #[tokio::test]
    async fn resume_skips_agents_that_already_reported() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let session = Uuid::new_v4();

        // Checkpoint from an interrupted run: the first specialist has
        // already reported.
        let mut partial = AgentState::new("Assess AAPL");
        partial.apply(crate::models::StateUpdate {
            messages: vec![crate::models::ChatMessage::assistant(
                Some(GEOPOLITICAL_ANALYST),
                "[GEOPOLITICAL ANALYST]\n\nbrief",
            )],
            risk_signals: vec![crate::models::RiskSignal {
                agent: GEOPOLITICAL_ANALYST.to_string(),
                analysis: "brief".into(),
            }],
            iteration_increment: 1,
            ..Default::default()
        });
        store.save(session, &partial).await.unwrap();

        // Resumed run only needs the remaining two agents plus the
        // terminating decision.
        let service = Arc::new(ScriptedService::new(vec![
            ModelResponse::text("Credit assessment: ADEQUATE."),
            ModelResponse::text("═══════\nINTEGRATED RISK REPORT"),
            ModelResponse::text(r#"{"next": "TERMINATE"}"#),
        ]));
        let graph = AnalysisGraph::new(service.clone(), registry())
            .with_retry(RetryPolicy::fast())
            .with_checkpoints(store.clone());

        let run = graph.run("ignored on resume", session).await.unwrap();

        assert_eq!(service.calls(), 3);
        assert_eq!(run.state.iteration_count, 3);
        let order: Vec<&str> = run
            .trace
            .iter()
            .filter(|t| t.node != "supervisor")
            .map(|t| t.node.as_str())
            .collect();
        assert_eq!(order, vec![CREDIT_EVALUATOR, MARKET_SYNTHESIZER]);
    }

    #[tokio::test]
    async fn model_that_never_terminates_hits_the_iteration_ceiling() {
        // Adaptive supervisor always redispatches; agents always answer.
        // The ceiling must stop the run regardless.
        let service = Arc::new(AlternatingService::default());
        let graph = AnalysisGraph::new(service, registry()).with_retry(RetryPolicy::fast());

        let run = graph.run("Assess AAPL", Uuid::new_v4()).await.unwrap();
        assert_eq!(run.state.iteration_count, MAX_ITERATIONS);
    }

    /// Routing replies for supervisor calls, analysis text for agent
    /// calls, distinguished by whether tool declarations were passed.
    #[derive(Default)]
    struct AlternatingService {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ReasoningService for AlternatingService {
        async fn invoke(
            &self,
            messages: &[crate::models::ChatMessage],
            _tools: &[crate::tools::ToolDefinition],
            _temperature: f32,
        ) -> Result<ModelResponse> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let system = messages
                .first()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            if system.contains("supervisor of a financial risk analysis team") {
                Ok(ModelResponse::text(r#"{"next": "credit_evaluator"}"#))
            } else {
                Ok(ModelResponse::text("Another pass over the credit picture."))
            }
        }
    }
}
