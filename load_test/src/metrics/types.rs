//! Metric types

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct UserMetrics {
    pub launched: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_flight: usize,
}

/// Distinct error codes kept individually; node ids are unique per
/// iteration, so a long failing run would otherwise grow without bound.
pub const MAX_ERROR_CODES: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Iterations initialized by the engine
    pub started: usize,
    /// Error events keyed by code (the node identifier), first
    /// `MAX_ERROR_CODES` codes only
    pub errors: BTreeMap<String, usize>,
    /// Errors whose code arrived after the map was full
    pub other_errors: usize,
}

impl EngineMetrics {
    pub fn record_error(&mut self, code: String) {
        if let Some(count) = self.errors.get_mut(&code) {
            *count += 1;
        } else if self.errors.len() < MAX_ERROR_CODES {
            self.errors.insert(code, 1);
        } else {
            self.other_errors += 1;
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().sum::<usize>() + self.other_errors
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemMetrics {
    pub cpu_usage: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
}

#[derive(Debug, Clone, Default)]
pub struct TestMetrics {
    pub users: UserMetrics,
    pub engine: EngineMetrics,
    pub system: SystemMetrics,
}
