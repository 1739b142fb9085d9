//! Error types for the scenario engine.
//!
//! Every variant aborts the remaining steps of the iteration that produced
//! it. A stop that times out is not an error and never shows up here.

use thiserror::Error;

use crate::runtime::RuntimeError;

/// Errors raised by scenario steps.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The broker failed to start
    #[error("Spawn failed for node {node_id}: {source}")]
    Spawn {
        node_id: String,
        #[source]
        source: RuntimeError,
    },

    /// The broker failed to stop cleanly
    #[error("Stop failed for node {node_id}: {source}")]
    Stop {
        node_id: String,
        #[source]
        source: RuntimeError,
    },

    /// A stop step ran before any broker was started
    #[error("No broker running for node {node_id}")]
    NotStarted { node_id: String },

    /// A spawn step ran on a context that was never initialized
    #[error("No runner attached to context for node {node_id}")]
    NoRunner { node_id: String },
}

impl EngineError {
    /// Node identifier the failing step was working on
    pub fn node_id(&self) -> &str {
        match self {
            EngineError::Spawn { node_id, .. }
            | EngineError::Stop { node_id, .. }
            | EngineError::NotStarted { node_id }
            | EngineError::NoRunner { node_id } => node_id,
        }
    }
}
