// Metrics module
// Collects engine events and virtual-user outcomes, prints reports

pub mod collector;
pub mod reporter;
pub mod types;

pub use collector::{LatencyStats, MetricsCollector};
