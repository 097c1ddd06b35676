//! Error types for the risk agent orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Routing error: {0}")]
    RoutingError(String),

    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    #[error("Graph execution error: {0}")]
    GraphError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OrchestrationError {
    /// Whether this error is a transient rate-limit / quota condition that
    /// the resilience wrapper may retry. Anything else is terminal for the
    /// call that produced it.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            OrchestrationError::RateLimited(_) => true,
            other => {
                let text = other.to_string().to_lowercase();
                ["429", "resource_exhausted", "rate limit", "too many requests", "quota"]
                    .iter()
                    .any(|kw| text.contains(kw))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_variant_is_rate_limit() {
        assert!(OrchestrationError::RateLimited("quota exceeded".into()).is_rate_limit());
    }

    #[test]
    fn keyword_classification_on_other_variants() {
        assert!(OrchestrationError::LlmError("HTTP 429 Too Many Requests".into()).is_rate_limit());
        assert!(OrchestrationError::LlmError("RESOURCE_EXHAUSTED: quota".into()).is_rate_limit());
        assert!(!OrchestrationError::LlmError("connection refused".into()).is_rate_limit());
        assert!(!OrchestrationError::ToolError("bad input".into()).is_rate_limit());
    }
}
