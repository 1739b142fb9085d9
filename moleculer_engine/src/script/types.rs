//! Script data model, deserialized from YAML.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::think::ThinkDefaults;

/// Runner configuration file used when the script names none.
pub const DEFAULT_MOLECULER_CONFIG: &str = "moleculer.config.js";

/// Service glob used when the script names none.
pub const DEFAULT_MOLECULER_SERVICES: &str = "services/**/*.service.js";

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub config: ScriptConfig,
    pub scenarios: Vec<ScenarioSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    pub phases: Vec<Phase>,
    /// Template variables; a list yields one random element per iteration
    pub variables: BTreeMap<String, Value>,
    pub defaults: Defaults,
    pub moleculer: MoleculerConfig,
}

/// Arrival phase: `arrival_rate` new virtual users every second for
/// `duration` seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    #[serde(default)]
    pub name: Option<String>,
    pub duration: u64,
    pub arrival_rate: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub think: ThinkDefaults,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MoleculerConfig {
    pub config: Option<String>,
    pub services: Option<String>,
}

impl MoleculerConfig {
    pub fn config_path(&self) -> &str {
        self.config.as_deref().unwrap_or(DEFAULT_MOLECULER_CONFIG)
    }

    pub fn services_glob(&self) -> &str {
        self.services.as_deref().unwrap_or(DEFAULT_MOLECULER_SERVICES)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Step descriptors, interpreted in order
    pub flow: Vec<Value>,
}

impl ScenarioSpec {
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("scenario-{}", index + 1))
    }
}

fn default_weight() -> u32 {
    1
}
