//! Composes interpreted tasks into a sequential scenario runner.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::context::Context;
use super::tasks::{StepTask, SERVICES_OPTION};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSink};
use crate::runtime::{RunnerArgs, RunnerFactory};
use crate::script::MoleculerConfig;

/// An iteration that stopped at a failing step.
#[derive(Debug, Error)]
#[error("scenario failed at step {step} ({task}): {error}")]
pub struct ScenarioFailure {
    #[source]
    pub error: EngineError,
    /// Index of the failing task; 0 is the initialization task
    pub step: usize,
    pub task: &'static str,
    /// Context as it stood when the step failed
    pub context: Context,
}

/// Runner options every iteration starts from.
pub fn resolve_runner_args(config: &MoleculerConfig) -> RunnerArgs {
    let mut args = RunnerArgs::new();
    args.insert(
        "config".to_string(),
        Value::String(config.config_path().to_string()),
    );
    args.insert(
        SERVICES_OPTION.to_string(),
        Value::String(config.services_glob().to_string()),
    );
    args
}

/// Runs first in every iteration: attaches a fresh runner and the resolved
/// options to the context.
pub struct InitTask {
    args: RunnerArgs,
    factory: Arc<dyn RunnerFactory>,
    sink: Arc<dyn EventSink>,
}

impl InitTask {
    pub fn new(
        config: &MoleculerConfig,
        factory: Arc<dyn RunnerFactory>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            args: resolve_runner_args(config),
            factory,
            sink,
        }
    }
}

#[async_trait]
impl StepTask for InitTask {
    fn name(&self) -> &'static str {
        "init"
    }

    async fn run(&self, ctx: &mut Context) -> Result<(), EngineError> {
        ctx.runner = Some(self.factory.create());
        ctx.args = self.args.clone();
        self.sink.emit(EngineEvent::Started);
        Ok(())
    }
}

/// A compiled scenario. Cheap to clone; each `run` is one iteration.
#[derive(Clone)]
pub struct ScenarioRunner {
    name: Arc<str>,
    tasks: Arc<[Box<dyn StepTask>]>,
}

impl ScenarioRunner {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Task names in execution order, initialization first.
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }

    /// Run every task in order, stopping at the first failure.
    pub async fn run(&self, mut context: Context) -> Result<Context, ScenarioFailure> {
        for (step, task) in self.tasks.iter().enumerate() {
            if let Err(error) = task.run(&mut context).await {
                debug!(
                    scenario = %self.name,
                    step,
                    task = task.name(),
                    error = %error,
                    "scenario step failed"
                );
                return Err(ScenarioFailure {
                    error,
                    step,
                    task: task.name(),
                    context,
                });
            }
        }
        Ok(context)
    }
}

/// Chain the initialization task and `tasks` into one runner.
pub fn compile(
    name: impl Into<String>,
    tasks: Vec<Box<dyn StepTask>>,
    config: &MoleculerConfig,
    factory: Arc<dyn RunnerFactory>,
    sink: Arc<dyn EventSink>,
) -> ScenarioRunner {
    let mut chain: Vec<Box<dyn StepTask>> = Vec::with_capacity(tasks.len() + 1);
    chain.push(Box::new(InitTask::new(config, factory, sink)));
    chain.extend(tasks);

    let name: String = name.into();
    ScenarioRunner {
        name: Arc::from(name),
        tasks: Arc::from(chain),
    }
}
