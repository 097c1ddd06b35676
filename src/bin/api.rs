use risk_agent_orchestrator::{
    api::start_server,
    checkpoint::{CheckpointStore, InMemoryCheckpointStore, PostgresCheckpointStore},
    gemini::GeminiClient,
    graph::AnalysisGraph,
    tools::{create_default_registry, DisclosureIndex},
};
use std::sync::Arc;
use tracing::{info, warn};

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

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
        eprintln!("⚠️  GEMINI_API_KEY not set in .env");
        eprintln!("📌 See .env.example for setup instructions");
        "mock_key".to_string()
    });

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Risk Agent Orchestrator - API Server");
    info!("📍 Port: {}", api_port);

    // Durable checkpoints when a database is configured, volatile otherwise
    let checkpoints: Arc<dyn CheckpointStore> = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => match PostgresCheckpointStore::connect(&url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, "Postgres unavailable, falling back to in-memory checkpoints");
                Arc::new(InMemoryCheckpointStore::new())
            }
        },
        _ => Arc::new(InMemoryCheckpointStore::new()),
    };

    let service = Arc::new(GeminiClient::new(gemini_api_key));
    let registry = Arc::new(create_default_registry(Arc::new(DisclosureIndex::new())));
    let graph = Arc::new(AnalysisGraph::new(service, registry).with_checkpoints(checkpoints));

    info!("✅ Analysis graph initialized");
    info!("📡 Starting API server...");

    // Start API server
    start_server(graph, api_port).await?;

    Ok(())
}
