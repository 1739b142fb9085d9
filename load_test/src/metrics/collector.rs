//! Metrics collector - thread-safe collection with latency tracking

use super::types::TestMetrics;
use hdrhistogram::Histogram;
use moleculer_engine::{EngineEvent, EventSink};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

/// Histogram of whole virtual-user sessions, in milliseconds.
pub const SESSION_LENGTH: &str = "vu.session_length";

#[derive(Clone)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<TestMetrics>>,
    histograms: Arc<RwLock<BTreeMap<String, Histogram<u64>>>>,
    system: Arc<RwLock<System>>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        // Initialize system monitor
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );

        Self {
            metrics: Arc::new(RwLock::new(TestMetrics::default())),
            histograms: Arc::new(RwLock::new(BTreeMap::new())),
            system: Arc::new(RwLock::new(system)),
            start_time: Instant::now(),
        }
    }

    pub fn user_launched(&self) {
        let mut metrics = self.metrics.write();
        metrics.users.launched += 1;
        metrics.users.in_flight += 1;
    }

    pub fn user_completed(&self, duration_ms: u64) {
        let mut metrics = self.metrics.write();
        metrics.users.completed += 1;
        metrics.users.in_flight = metrics.users.in_flight.saturating_sub(1);
        drop(metrics);

        self.record(SESSION_LENGTH, duration_ms);
    }

    pub fn user_failed(&self, duration_ms: u64) {
        let mut metrics = self.metrics.write();
        metrics.users.failed += 1;
        metrics.users.in_flight = metrics.users.in_flight.saturating_sub(1);
        drop(metrics);

        // Still record session length for failed users
        self.record(SESSION_LENGTH, duration_ms);
    }

    /// Record a sample into the named histogram, creating it on first use.
    pub fn record(&self, name: &str, value: u64) {
        let mut histograms = self.histograms.write();
        if !histograms.contains_key(name) {
            // 3 significant digits of precision
            match Histogram::new(3) {
                Ok(hist) => {
                    histograms.insert(name.to_string(), hist);
                }
                Err(e) => {
                    tracing::warn!("Failed to create histogram {}: {}", name, e);
                    return;
                }
            }
        }
        if let Some(hist) = histograms.get_mut(name) {
            let _ = hist.record(value);
        }
    }

    /// Update system metrics (CPU, memory)
    pub fn update_system_metrics(&self) {
        let mut system = self.system.write();
        system.refresh_cpu_all();
        system.refresh_memory();

        let mut metrics = self.metrics.write();

        // Get global CPU usage
        metrics.system.cpu_usage = system.global_cpu_usage();

        // Get memory usage
        metrics.system.memory_used_mb = system.used_memory() / 1024 / 1024;
        metrics.system.memory_total_mb = system.total_memory() / 1024 / 1024;
    }

    pub fn get_snapshot(&self) -> TestMetrics {
        self.metrics.read().clone()
    }

    pub fn histogram_names(&self) -> Vec<String> {
        self.histograms.read().keys().cloned().collect()
    }

    pub fn get_latency_percentiles(&self, name: &str) -> Option<LatencyStats> {
        let histograms = self.histograms.read();
        let hist = histograms.get(name)?;
        Some(LatencyStats {
            min: hist.min(),
            p50: hist.value_at_quantile(0.50),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
            max: hist.max(),
            mean: hist.mean(),
            count: hist.len(),
        })
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MetricsCollector {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::Started => {
                self.metrics.write().engine.started += 1;
            }
            EngineEvent::Histogram { name, value } => {
                self.record(&name, value.max(0.0).round() as u64);
            }
            EngineEvent::Error { code } => {
                self.metrics.write().engine.record_error(code);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub min: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub max: u64,
    pub mean: f64,
    pub count: u64,
}
