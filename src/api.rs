//! REST API server for the risk analysis orchestrator
//!
//! Exposes the analysis graph via HTTP endpoints
//! Integrates with frontend UI

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::graph::AnalysisGraph;
use crate::provenance;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalyzeRequest {
    pub query: String,
    /// Optional session handle; reuse it to resume a checkpointed run.
    pub session_id: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub graph: Arc<AnalysisGraph>,
}

/// =============================
/// Helpers — Session Ids
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

fn resolve_session_id(value: Option<&str>) -> uuid::Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            uuid::Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => uuid::Uuid::new_v4(),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Analysis Endpoint
/// =============================

async fn run_analysis(
    State(state): State<ApiState>,
    Json(req): Json<AnalyzeRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Query must not be empty".into())),
        );
    }

    let session_id = resolve_session_id(req.session_id.as_deref());
    info!(%session_id, "Received analysis request: {}", req.query);

    match state.graph.run(&req.query, session_id).await {
        Ok(run) => {
            let report = provenance::final_report(&run.state);
            let sources = provenance::extract_sources(&run.state);
            let trace: Vec<serde_json::Value> = run
                .trace
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "step": t.step,
                        "node": t.node,
                        "decision": t.decision.map(|d| d.to_string()),
                        "elapsed_ms": t.elapsed_ms,
                    })
                })
                .collect();

            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "session_id": session_id.to_string(),
                    "report": report,
                    "risk_signals": run.state.risk_signals,
                    "iterations": run.state.iteration_count,
                    "sources": sources,
                    "trace": trace,
                }))),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Analysis failed: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(graph: Arc<AnalysisGraph>) -> Router {
    let state = ApiState { graph };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/analyze", post(run_analysis))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    graph: Arc<AnalysisGraph>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(graph);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_uuid_is_deterministic_and_valid() {
        let a = stable_uuid_from_string("session-alpha");
        let b = stable_uuid_from_string("session-alpha");
        let c = stable_uuid_from_string("session-beta");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.get_version_num(), 4);
    }

    #[test]
    fn resolve_session_id_accepts_uuids_and_hashes_the_rest() {
        let literal = uuid::Uuid::new_v4();
        assert_eq!(resolve_session_id(Some(&literal.to_string())), literal);

        let hashed = resolve_session_id(Some("my-session"));
        assert_eq!(hashed, stable_uuid_from_string("my-session"));

        // Blank input gets a fresh session.
        assert_ne!(resolve_session_id(None), resolve_session_id(None));
    }
}
