//! Moleculer load-test driver: CLI, virtual-user harness and metrics.

pub mod cli;
pub mod harness;
pub mod metrics;
