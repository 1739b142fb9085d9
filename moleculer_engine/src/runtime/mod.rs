//! Seam between the engine and the Moleculer runner.
//!
//! The engine never manages processes itself. A [`RunnerFactory`] hands each
//! iteration its own [`BrokerRunner`]; starting it yields a [`Broker`] that
//! the `stop` step later shuts down.

pub mod process;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use process::{ProcessRunner, ProcessRunnerFactory, ProcessRunnerOptions};

/// Runner options keyed by flag name (`config`, `services`, ...).
pub type RunnerArgs = BTreeMap<String, Value>;

/// Failures reported by the runtime under test.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runner process could not be launched at all
    #[error("Failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The broker exited before reporting readiness
    #[error("Broker exited before becoming ready ({status})")]
    Exited { status: String },

    /// The broker died on its own before the stop step reached it
    #[error("Broker had already exited before stop ({status})")]
    AlreadyExited { status: String },

    /// The broker did not report readiness in time
    #[error("Broker not ready after {0:?}")]
    NotReady(std::time::Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Starts broker instances. One runner belongs to exactly one iteration.
#[async_trait]
pub trait BrokerRunner: Send {
    /// Start a broker with runner-style arguments (`--key value ...`).
    async fn start(
        &mut self,
        argv: Vec<String>,
        node_id: &str,
    ) -> Result<Box<dyn Broker>, RuntimeError>;
}

/// A started broker instance.
#[async_trait]
pub trait Broker: Send {
    async fn stop(&mut self) -> Result<(), RuntimeError>;
}

/// Creates a fresh runner for every scenario iteration.
pub trait RunnerFactory: Send + Sync {
    fn create(&self) -> Box<dyn BrokerRunner>;
}
