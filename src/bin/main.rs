use risk_agent_orchestrator::{
    gemini::{GeminiClient, ModelResponse, ReasoningService, ScriptedService},
    graph::AnalysisGraph,
    provenance,
    tools::{create_default_registry, DisclosureIndex},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Canned replies so the demo runs end to end without an API key: one per
/// pipeline agent, then the terminating routing decision.
fn demo_service() -> ScriptedService {
    ScriptedService::new(vec![
        ModelResponse::text(
            "Geopolitical brief: supply chain exposure to East Asia remains the dominant \
             factor. Recent export-control expansion raises component sourcing risk. \
             Risk rating: MODERATE.",
        ),
        ModelResponse::text(
            "Credit assessment: leverage is manageable (debt-to-equity 1.95) and \
             liquidity adequate (current ratio 0.99). Valuation is rich but supported. \
             Credit stance: ADEQUATE.",
        ),
        ModelResponse::text(
            "═══════════════════════════════════\n\
             INTEGRATED RISK REPORT\n\
             ═══════════════════════════════════\n\n\
             SUBJECT: Apple Inc. (AAPL)\n\n\
             OVERALL RISK: MODERATE\n\n\
             GEOPOLITICAL SUMMARY:\n\
             Concentrated East Asian supply chain under widening export controls.\n\n\
             CREDIT SUMMARY:\n\
             Adequate liquidity and manageable leverage; valuation leaves little margin.\n\n\
             KEY RISK DRIVERS:\n\
             - Export-control expansion\n\
             - Supplier concentration\n\
             - Premium valuation\n\n\
             RECOMMENDATION:\n\
             Maintain position with hedged supply-chain exposure; review quarterly.",
        ),
        ModelResponse::text(r#"{"next": "TERMINATE"}"#),
    ])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Assess the overall risk profile of Apple Inc. (AAPL)".to_string());

    let service: Arc<dyn ReasoningService> = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => Arc::new(GeminiClient::new(key)),
        _ => {
            eprintln!("⚠️  GEMINI_API_KEY not set, running with canned replies");
            Arc::new(demo_service())
        }
    };

    let registry = Arc::new(create_default_registry(Arc::new(DisclosureIndex::new())));
    let graph = AnalysisGraph::new(service, registry);

    let session_id = Uuid::new_v4();
    info!(%session_id, %query, "Running analysis");

    let run = graph.run(&query, session_id).await?;

    println!("\n=== EXECUTION TRACE ===");
    for step in &run.trace {
        match step.decision {
            Some(decision) => println!(
                "  {}: {} → {} ({} ms)",
                step.step, step.node, decision, step.elapsed_ms
            ),
            None => println!("  {}: {} ({} ms)", step.step, step.node, step.elapsed_ms),
        }
    }

    println!("\n=== FINAL REPORT ===");
    println!("{}", provenance::final_report(&run.state));

    let sources = provenance::extract_sources(&run.state);
    if !sources.is_empty() {
        println!("\n=== SOURCES CONSULTED ===");
        println!("{}", serde_json::to_string_pretty(&sources)?);
    }

    Ok(())
}
