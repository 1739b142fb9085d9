use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use load_test::cli::{Cli, Mode};
use load_test::harness::Harness;
use load_test::metrics::collector::MetricsCollector;
use load_test::metrics::reporter;
use moleculer_engine::runtime::ProcessRunnerFactory;
use moleculer_engine::script::ScriptParser;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    match cli.mode {
        Mode::Run(args) => {
            init_tracing(args.verbose)?;

            let script = ScriptParser::parse_file(&args.script)
                .with_context(|| format!("Failed to load script {}", args.script.display()))?;

            tracing::info!("Moleculer Load Test Starting...");
            tracing::info!("Script: {}", args.script.display());
            tracing::info!("Scenarios: {}", script.scenarios.len());
            tracing::info!("Phases: {}", script.config.phases.len());
            tracing::info!(
                "Runner: {} {}",
                args.runner.runner_program,
                args.runner.runner_args.join(" ")
            );

            let collector = MetricsCollector::new();
            let factory = Arc::new(ProcessRunnerFactory::new(args.runner.to_options()));
            let harness = Harness::new(&script, factory, collector.clone())?;

            // Start periodic metrics reporter
            if !args.no_live_report {
                let collector_clone = collector.clone();
                let interval_secs = args.report_interval;
                tokio::spawn(async move {
                    reporter::start_periodic_reporter(collector_clone, interval_secs).await;
                });
            }

            // Ctrl+C drops the harness, which aborts in-flight users and
            // kills their brokers
            tokio::select! {
                result = harness.run() => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Interrupted, stopping virtual users and their brokers");
                }
            }

            reporter::print_final_report(&collector);
            tracing::info!("Load test complete");
        }

        Mode::Validate(args) => {
            init_tracing(args.verbose)?;

            let script = ScriptParser::parse_file(&args.script)
                .with_context(|| format!("Failed to load script {}", args.script.display()))?;
            let harness = Harness::new(
                &script,
                Arc::new(ProcessRunnerFactory::default()),
                MetricsCollector::new(),
            )?;

            println!("{}: OK", args.script.display());
            for (weight, scenario) in harness.scenarios() {
                println!(
                    "  {} (weight {}): {}",
                    scenario.name(),
                    weight,
                    scenario.task_names().join(" -> ")
                );
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
