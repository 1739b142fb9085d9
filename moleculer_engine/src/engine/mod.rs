//! Step interpretation and scenario compilation.

pub mod compiler;
pub mod context;
pub mod step;
pub mod tasks;

use std::sync::Arc;

use tracing::{debug, warn};

pub use compiler::{compile, ScenarioFailure, ScenarioRunner};
pub use context::{Context, Vars, UUID_VAR};
pub use step::Step;
pub use tasks::StepTask;

use crate::events::EventSink;
use crate::runtime::RunnerFactory;
use crate::script::{ScenarioSpec, ScriptConfig};

/// Compiles scenarios of one script against a runtime and an event sink.
#[derive(Clone)]
pub struct Engine {
    config: Arc<ScriptConfig>,
    sink: Arc<dyn EventSink>,
    factory: Arc<dyn RunnerFactory>,
}

impl Engine {
    pub fn new(
        config: ScriptConfig,
        sink: Arc<dyn EventSink>,
        factory: Arc<dyn RunnerFactory>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sink,
            factory,
        }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Interpret every descriptor of the flow and compile the result.
    pub fn create_scenario(&self, name: &str, spec: &ScenarioSpec) -> ScenarioRunner {
        let tasks = spec
            .flow
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let step = Step::parse(descriptor);
                if let Some(keys) = step.unrecognized_keys() {
                    report_noop(name, index, keys);
                }
                self.step(step)
            })
            .collect();

        compile(
            name,
            tasks,
            &self.config.moleculer,
            self.factory.clone(),
            self.sink.clone(),
        )
    }

    pub fn step(&self, step: Step) -> Box<dyn StepTask> {
        tasks::interpret(step, self.sink.clone(), &self.config.defaults.think)
    }

    /// Fresh context for one iteration.
    pub fn new_context(&self) -> Context {
        Context::from_variables(&self.config.variables)
    }
}

// Descriptors without a recognized tag are kept as pass-through steps, but a
// typo silently disabling a step is worth a warning.
fn report_noop(scenario: &str, index: usize, keys: &[String]) {
    let unknown: Vec<&str> = keys
        .iter()
        .map(String::as_str)
        .filter(|key| !step::is_step_kind(key))
        .collect();

    if unknown.is_empty() {
        debug!(scenario, step = index + 1, "step disabled, running as no-op");
    } else {
        warn!(
            scenario,
            step = index + 1,
            keys = ?unknown,
            "unrecognized step, running as no-op"
        );
    }
}
