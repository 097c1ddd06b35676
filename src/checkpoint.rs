//! Checkpoint persistence for analysis state.
//!
//! The graph saves the full state after every applied update, keyed by
//! session id, so an interrupted analysis can resume. Backends: an
//! in-process map for tests and single-node runs, and Postgres for
//! durable sessions.

use crate::models::AgentState;
use crate::{OrchestrationError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, session_id: Uuid, state: &AgentState) -> Result<()>;
    async fn load(&self, session_id: Uuid) -> Result<Option<AgentState>>;
}

/// Volatile store backed by a shared map. Later saves for the same
/// session replace earlier ones.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    states: Arc<RwLock<HashMap<Uuid, AgentState>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, session_id: Uuid, state: &AgentState) -> Result<()> {
        self.states.write().await.insert(session_id, state.clone());
        debug!(%session_id, "checkpoint saved (memory)");
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<AgentState>> {
        Ok(self.states.read().await.get(&session_id).cloned())
    }
}

/// Durable store over Postgres. State is serialized as JSON text and
/// upserted per session.
pub struct PostgresCheckpointStore {
    pool: sqlx::PgPool,
}

impl PostgresCheckpointStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analysis_checkpoints (
                session_id UUID PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!("connected checkpoint store to Postgres");
        Ok(Self { pool })
    }
}

#[async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    async fn save(&self, session_id: Uuid, state: &AgentState) -> Result<()> {
        let payload = serde_json::to_string(state)?;
        sqlx::query(
            r#"
            INSERT INTO analysis_checkpoints (session_id, state, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (session_id)
            DO UPDATE SET state = EXCLUDED.state, updated_at = now()
            "#,
        )
        .bind(session_id)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        debug!(%session_id, "checkpoint saved (postgres)");
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<AgentState>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT state FROM analysis_checkpoints WHERE session_id = $1")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((payload,)) => {
                let state = serde_json::from_str(&payload).map_err(|e| {
                    OrchestrationError::CheckpointError(format!(
                        "corrupt checkpoint for session {session_id}: {e}"
                    ))
                })?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }
}
