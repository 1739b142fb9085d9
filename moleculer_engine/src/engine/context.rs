//! Per-iteration execution context.

use std::collections::BTreeMap;
use std::fmt;

use rand::seq::SliceRandom;
use serde_json::Value;
use uuid::Uuid;

use crate::runtime::{Broker, BrokerRunner, RunnerArgs};

/// Template variables visible to a single iteration.
pub type Vars = BTreeMap<String, Value>;

/// Variable holding the iteration's unique identifier.
pub const UUID_VAR: &str = "$uuid";

/// Mutable state threaded through every step of one scenario iteration.
///
/// A context is owned by exactly one iteration: the runner takes it by
/// value, lends it to each step as `&mut`, and hands it back at the end.
pub struct Context {
    pub vars: Vars,
    /// Set by the initialization step
    pub runner: Option<Box<dyn BrokerRunner>>,
    /// Resolved runner options, the defaults for every spawn step
    pub args: RunnerArgs,
    /// Set by the spawn step
    pub node_id: Option<String>,
    /// Broker started by the last successful spawn
    pub broker: Option<Box<dyn Broker>>,
}

impl Context {
    pub fn new(mut vars: Vars) -> Self {
        vars.entry(UUID_VAR.to_string())
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));

        Self {
            vars,
            runner: None,
            args: RunnerArgs::new(),
            node_id: None,
            broker: None,
        }
    }

    /// Seed a context from script variables, picking one element of every
    /// list variable at random.
    pub fn from_variables(variables: &BTreeMap<String, Value>) -> Self {
        let mut rng = rand::thread_rng();
        let vars = variables
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::Array(items) => items.choose(&mut rng).cloned().unwrap_or(Value::Null),
                    other => other.clone(),
                };
                (name.clone(), value)
            })
            .collect();

        Self::new(vars)
    }

    /// Suffix that makes node identifiers unique per iteration.
    pub fn unique_suffix(&self) -> String {
        match self.vars.get(UUID_VAR) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => Uuid::new_v4().to_string(),
        }
    }

    pub fn has_broker(&self) -> bool {
        self.broker.is_some()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Vars::new())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("vars", &self.vars)
            .field("runner", &self.runner.as_ref().map(|_| "BrokerRunner"))
            .field("args", &self.args)
            .field("node_id", &self.node_id)
            .field("broker", &self.broker.as_ref().map(|_| "Broker"))
            .finish()
    }
}
