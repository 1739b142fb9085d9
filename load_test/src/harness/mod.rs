//! Phase-driven virtual-user harness
//!
//! Every second of a phase launches `arrivalRate` virtual users. Each user
//! picks a scenario by weight, gets a fresh context and runs the compiled
//! scenario once; its outcome lands in the metrics collector.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use moleculer_engine::runtime::RunnerFactory;
use moleculer_engine::script::{Phase, Script};
use moleculer_engine::{Engine, ScenarioRunner};
use rand::distributions::{Distribution, WeightedIndex};
use tokio::task::JoinSet;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

use crate::metrics::collector::MetricsCollector;

struct WeightedScenario {
    weight: u32,
    runner: ScenarioRunner,
}

pub struct Harness {
    engine: Engine,
    scenarios: Vec<WeightedScenario>,
    weights: WeightedIndex<u64>,
    collector: MetricsCollector,
}

impl Harness {
    pub fn new(
        script: &Script,
        factory: Arc<dyn RunnerFactory>,
        collector: MetricsCollector,
    ) -> Result<Self> {
        let engine = Engine::new(script.config.clone(), Arc::new(collector.clone()), factory);

        let scenarios: Vec<WeightedScenario> = script
            .scenarios
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.weight > 0)
            .map(|(i, spec)| WeightedScenario {
                weight: spec.weight,
                runner: engine.create_scenario(&spec.display_name(i), spec),
            })
            .collect();

        if scenarios.is_empty() {
            bail!("script has no scenario with a positive weight");
        }
        let weights = scenario_weights(scenarios.iter().map(|s| s.weight))?;

        Ok(Self {
            engine,
            scenarios,
            weights,
            collector,
        })
    }

    /// Compiled scenarios with their weights
    pub fn scenarios(&self) -> impl Iterator<Item = (u32, &ScenarioRunner)> {
        self.scenarios.iter().map(|s| (s.weight, &s.runner))
    }

    /// Run every phase, then wait for the virtual users still in flight.
    ///
    /// A script without phases runs a single virtual user. Dropping the
    /// returned future aborts all in-flight users.
    pub async fn run(&self) -> Result<()> {
        let single = [Phase {
            name: Some("single".to_string()),
            duration: 1,
            arrival_rate: 1,
        }];
        let phases = match self.engine.config().phases.as_slice() {
            [] => &single[..],
            phases => phases,
        };

        let mut users = JoinSet::new();
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for (index, phase) in phases.iter().enumerate() {
            self.run_phase(index, phase, &mut ticker, &mut users).await;
        }

        tracing::info!(
            "All phases launched, waiting for {} in-flight virtual users...",
            users.len()
        );

        while let Some(result) = users.join_next().await {
            if let Err(e) = result {
                tracing::error!("Virtual user task panicked: {}", e);
            }
        }

        tracing::info!("All virtual users finished");
        Ok(())
    }

    async fn run_phase(
        &self,
        index: usize,
        phase: &Phase,
        ticker: &mut Interval,
        users: &mut JoinSet<()>,
    ) {
        tracing::info!(
            "Starting phase {} ({}): {} users/sec for {}s",
            index + 1,
            phase.name.as_deref().unwrap_or("unnamed"),
            phase.arrival_rate,
            phase.duration
        );

        for _ in 0..phase.duration {
            ticker.tick().await;

            for _ in 0..phase.arrival_rate {
                self.launch_user(users);
            }

            // Reap finished users so the set only tracks in-flight ones
            while let Some(result) = users.try_join_next() {
                if let Err(e) = result {
                    tracing::error!("Virtual user task panicked: {}", e);
                }
            }
        }
    }

    fn launch_user(&self, users: &mut JoinSet<()>) {
        let runner = self.pick_scenario().clone();
        let context = self.engine.new_context();
        let collector = self.collector.clone();

        collector.user_launched();
        users.spawn(async move {
            let start = Instant::now();
            match runner.run(context).await {
                Ok(_) => {
                    collector.user_completed(start.elapsed().as_millis() as u64);
                }
                Err(failure) => {
                    tracing::warn!(scenario = runner.name(), "Virtual user failed: {}", failure);
                    collector.user_failed(start.elapsed().as_millis() as u64);
                }
            }
        });
    }

    fn pick_scenario(&self) -> &ScenarioRunner {
        let index = self.weights.sample(&mut rand::thread_rng());
        &self.scenarios[index].runner
    }
}

/// Weighted distribution over scenario indices, summed as `u64` so that
/// any mix of `u32` weights fits.
fn scenario_weights(weights: impl IntoIterator<Item = u32>) -> Result<WeightedIndex<u64>> {
    WeightedIndex::new(weights.into_iter().map(u64::from)).context("invalid scenario weights")
}
