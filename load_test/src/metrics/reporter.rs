//! Console reporter for metrics with real-time updates

use super::collector::{LatencyStats, MetricsCollector};
use std::io::{self, Write};
use tokio::time::{interval, Duration};

/// Start periodic metrics reporting (every N seconds)
pub async fn start_periodic_reporter(collector: MetricsCollector, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        ticker.tick().await;

        // Update system metrics before printing
        collector.update_system_metrics();

        print_live_metrics(&collector);
    }
}

/// Print live metrics (clears screen and updates in place)
pub fn print_live_metrics(collector: &MetricsCollector) {
    // Clear screen and move cursor to top
    print!("\x1B[2J\x1B[1;1H");

    let metrics = collector.get_snapshot();
    let elapsed = collector.elapsed_seconds();

    println!("╔════════════════════════════════════════════════════════════════╗");
    println!("║             Moleculer Load Test - Live Metrics                 ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    // Time elapsed
    println!("\n⏱️  Elapsed Time: {:02}:{:02}:{:02}",
        elapsed / 3600, (elapsed % 3600) / 60, elapsed % 60);

    // Virtual users
    println!("\n┌─ VIRTUAL USERS ─────────────────────────────────────────────┐");
    println!("│  Launched:     {:>8}    In-Flight:  {:>8}              │",
        metrics.users.launched, metrics.users.in_flight);
    println!("│  Completed:    {:>8}    Failed:     {:>8}              │",
        metrics.users.completed, metrics.users.failed);
    println!("│  Started:      {:>8}    Errors:     {:>8}              │",
        metrics.engine.started, metrics.engine.error_count());
    println!("└─────────────────────────────────────────────────────────────┘");

    // Latencies
    for name in collector.histogram_names() {
        if let Some(stats) = collector.get_latency_percentiles(&name) {
            println!("\n┌─ {} (ms)", name);
            println!("│  Min: {:>6}  P50: {:>6}  P95: {:>6}  P99: {:>6}  Max: {:>6}",
                stats.min, stats.p50, stats.p95, stats.p99, stats.max);
            println!("│  Mean: {:>8.2} ms    Count: {:>10}", stats.mean, stats.count);
            println!("└─────────────────────────────────────────────────────────────┘");
        }
    }

    // System metrics
    println!("\n┌─ SYSTEM ────────────────────────────────────────────────────┐");
    println!("│  CPU Usage:    {:>6.1}%    Memory: {:>6} / {:>6} MB       │",
        metrics.system.cpu_usage, metrics.system.memory_used_mb, metrics.system.memory_total_mb);
    println!("└─────────────────────────────────────────────────────────────┘");

    println!("\n  [Press Ctrl+C to stop test]");

    // Flush stdout to ensure immediate display
    let _ = io::stdout().flush();
}

/// Print final summary report
pub fn print_final_report(collector: &MetricsCollector) {
    let metrics = collector.get_snapshot();
    let elapsed = collector.elapsed_seconds();

    println!("\n╔════════════════════════════════════════════════════════════════╗");
    println!("║                    FINAL TEST REPORT                           ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    println!("\n📊 VIRTUAL USERS");
    println!("   Total Launched:       {:>10}", metrics.users.launched);
    println!("   Total Completed:      {:>10}", metrics.users.completed);
    println!("   Total Failed:         {:>10}", metrics.users.failed);

    if metrics.users.launched > 0 {
        let success_rate = (metrics.users.completed as f64 / metrics.users.launched as f64) * 100.0;
        println!("   Success Rate:         {:>10.2}%", success_rate);
    }

    println!("\n⚙️  ENGINE");
    println!("   Iterations Started:   {:>10}", metrics.engine.started);
    println!("   Errors:               {:>10}", metrics.engine.error_count());

    let mut codes: Vec<_> = metrics.engine.errors.iter().collect();
    codes.sort_by(|a, b| b.1.cmp(a.1));
    for (code, count) in codes.iter().take(10) {
        println!("     {:<30} {:>10}", code, count);
    }
    let hidden = metrics.engine.errors.len().saturating_sub(10);
    if hidden > 0 || metrics.engine.other_errors > 0 {
        println!(
            "     ... {} more codes, {} errors not broken down",
            hidden, metrics.engine.other_errors
        );
    }

    for name in collector.histogram_names() {
        if let Some(stats) = collector.get_latency_percentiles(&name) {
            print_latency(&name, &stats);
        }
    }

    println!("\n⏱️  Test Duration: {} seconds", elapsed);
    println!("════════════════════════════════════════════════════════════════\n");
}

fn print_latency(name: &str, stats: &LatencyStats) {
    println!("\n📈 {}", name);
    println!("   Min:                  {:>10} ms", stats.min);
    println!("   P50 (Median):         {:>10} ms", stats.p50);
    println!("   P95:                  {:>10} ms", stats.p95);
    println!("   P99:                  {:>10} ms", stats.p99);
    println!("   Max:                  {:>10} ms", stats.max);
    println!("   Mean:                 {:>10.2} ms", stats.mean);
    println!("   Count:                {:>10}", stats.count);
}
