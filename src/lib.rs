//! Risk Agent Orchestrator
//!
//! A multi-agent financial risk analysis pipeline that:
//! - Routes work between specialist agents via a supervisor state machine
//! - Runs each agent as a bounded think/act/observe tool loop
//! - Shares one explicit state object with deterministic merge rules
//! - Retries rate-limited model calls with jittered exponential backoff
//! - Checkpoints state per step so sessions can resume
//!
//! ANALYSIS LOOP:
//! QUERY → ROUTE → AGENT (ReAct) → MERGE → CHECKPOINT → ROUTE? → REPORT

pub mod agents;
pub mod api;
pub mod checkpoint;
pub mod error;
pub mod gemini;
pub mod graph;
pub mod models;
pub mod provenance;
pub mod react;
pub mod retry;
pub mod supervisor;
pub mod tools;

pub use error::{OrchestrationError, Result};

// Re-export common types
pub use graph::{AnalysisGraph, AnalysisRun};
pub use models::*;
pub use supervisor::{Supervisor, MAX_ITERATIONS};
