//! Executable tasks, one per interpreted step.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::context::Context;
use super::step::{SpawnSpec, Step, StopSpec};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventSink, SPAWN_RESPONSE_TIME, STOP_RESPONSE_TIME};
use crate::runtime::RunnerArgs;
use crate::template;
use crate::think::{self, ThinkDefaults, ThinkSpec};

/// Runner option passed positionally instead of as a flag.
pub const SERVICES_OPTION: &str = "services";

/// One step of a compiled scenario.
///
/// `run` resolves exactly once, either leaving the context ready for the
/// next step or with the error that ends the iteration.
#[async_trait]
pub trait StepTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut Context) -> Result<(), EngineError>;
}

/// Map a parsed step to its task.
pub fn interpret(
    step: Step,
    sink: Arc<dyn EventSink>,
    think_defaults: &ThinkDefaults,
) -> Box<dyn StepTask> {
    match step {
        Step::Log { template } => Box::new(LogTask { template }),
        Step::Think(spec) => Box::new(ThinkTask {
            spec,
            defaults: think_defaults.clone(),
        }),
        Step::Spawn(spec) => Box::new(SpawnTask { spec, sink }),
        Step::Stop(spec) => Box::new(StopTask { spec, sink }),
        Step::Noop { .. } => Box::new(NoopTask),
    }
}

pub struct LogTask {
    template: String,
}

#[async_trait]
impl StepTask for LogTask {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn run(&self, ctx: &mut Context) -> Result<(), EngineError> {
        let message = template::render(&self.template, &ctx.vars);
        info!(target: "moleculer_engine::log", "{}", message);
        tokio::task::yield_now().await;
        Ok(())
    }
}

pub struct ThinkTask {
    spec: ThinkSpec,
    defaults: ThinkDefaults,
}

#[async_trait]
impl StepTask for ThinkTask {
    fn name(&self) -> &'static str {
        "think"
    }

    async fn run(&self, ctx: &mut Context) -> Result<(), EngineError> {
        think::wait(&self.spec, &self.defaults, &ctx.vars).await;
        Ok(())
    }
}

pub struct SpawnTask {
    spec: SpawnSpec,
    sink: Arc<dyn EventSink>,
}

#[async_trait]
impl StepTask for SpawnTask {
    fn name(&self) -> &'static str {
        "spawn"
    }

    async fn run(&self, ctx: &mut Context) -> Result<(), EngineError> {
        let options = merge_options(&self.spec.options, &ctx.args);
        let argv = build_argv(&options);
        let node_id = node_id(self.spec.name.as_deref(), ctx);
        ctx.node_id = Some(node_id.clone());

        let Some(runner) = ctx.runner.as_mut() else {
            self.sink.emit(EngineEvent::error(node_id.clone()));
            return Err(EngineError::NoRunner { node_id });
        };

        info!(node_id = %node_id, "spawning broker");
        let started_at = Instant::now();

        match runner.start(argv, &node_id).await {
            Ok(broker) => {
                let elapsed = elapsed_ms(started_at);
                debug!(node_id = %node_id, elapsed_ms = elapsed, "broker started");
                self.sink
                    .emit(EngineEvent::histogram(SPAWN_RESPONSE_TIME, elapsed));
                if ctx.broker.replace(broker).is_some() {
                    warn!(node_id = %node_id, "replacing a broker that was never stopped");
                }
                Ok(())
            }
            Err(source) => {
                debug!(node_id = %node_id, error = %source, "broker failed to start");
                self.sink.emit(EngineEvent::error(node_id.clone()));
                Err(EngineError::Spawn { node_id, source })
            }
        }
    }
}

pub struct StopTask {
    spec: StopSpec,
    sink: Arc<dyn EventSink>,
}

#[async_trait]
impl StepTask for StopTask {
    fn name(&self) -> &'static str {
        "stop"
    }

    async fn run(&self, ctx: &mut Context) -> Result<(), EngineError> {
        let node_id = ctx
            .node_id
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        info!(node_id = %node_id, "stopping broker");

        let Some(broker) = ctx.broker.as_mut() else {
            self.sink.emit(EngineEvent::error(node_id.clone()));
            return Err(EngineError::NotStarted { node_id });
        };

        let started_at = Instant::now();

        match tokio::time::timeout(self.spec.timeout, broker.stop()).await {
            Ok(Ok(())) => {
                let elapsed = elapsed_ms(started_at);
                self.sink
                    .emit(EngineEvent::histogram(STOP_RESPONSE_TIME, elapsed));
                ctx.broker = None;
                info!(node_id = %node_id, elapsed_ms = elapsed, "broker stopped");
                Ok(())
            }
            Ok(Err(source)) => {
                debug!(node_id = %node_id, error = %source, "broker failed to stop");
                self.sink.emit(EngineEvent::error(node_id.clone()));
                Err(EngineError::Stop { node_id, source })
            }
            Err(_) => {
                warn!(
                    node_id = %node_id,
                    timeout_ms = self.spec.timeout.as_millis() as u64,
                    "broker did not stop in time, forcing stop"
                );
                // Dropping the handle kills whatever is left of the broker.
                ctx.broker = None;
                Ok(())
            }
        }
    }
}

pub struct NoopTask;

#[async_trait]
impl StepTask for NoopTask {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn run(&self, _ctx: &mut Context) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Step options layered over the iteration defaults; step options win.
pub fn merge_options(step: &RunnerArgs, defaults: &RunnerArgs) -> RunnerArgs {
    let mut merged = defaults.clone();
    for (key, value) in step {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Runner argv: `--key value` per option, `true` as a bare flag, `false`
/// and `null` omitted, and the `services` value(s) last as positionals.
pub fn build_argv(options: &RunnerArgs) -> Vec<String> {
    let mut argv = Vec::new();

    for (key, value) in options {
        if key == SERVICES_OPTION {
            continue;
        }
        match value {
            Value::Null | Value::Bool(false) => {}
            Value::Bool(true) => argv.push(format!("--{}", key)),
            Value::String(s) => {
                argv.push(format!("--{}", key));
                argv.push(s.clone());
            }
            other => {
                argv.push(format!("--{}", key));
                argv.push(other.to_string());
            }
        }
    }

    match options.get(SERVICES_OPTION) {
        Some(Value::String(glob)) => argv.push(glob.clone()),
        Some(Value::Array(globs)) => argv.extend(globs.iter().filter_map(|g| match g {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })),
        _ => {}
    }

    argv
}

/// `<name>-<suffix>`, with the rendered name template or the host name.
pub fn node_id(name: Option<&str>, ctx: &Context) -> String {
    let base = name
        .map(|name| template::render(name, &ctx.vars))
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(local_hostname);
    format!("{}-{}", base.trim(), ctx.unique_suffix())
}

fn local_hostname() -> String {
    sysinfo::System::host_name()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn elapsed_ms(started_at: Instant) -> f64 {
    started_at.elapsed().as_secs_f64() * 1000.0
}
