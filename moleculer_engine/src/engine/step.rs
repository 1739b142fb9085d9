//! Step descriptors parsed into a closed set of step kinds.
//!
//! A descriptor is a mapping. The first *present* tag in the order `log`,
//! `think`, `spawn`, `stop` decides the kind; a tag is present when its value
//! is not `null`, `false`, `0` or `""`. Anything else is a no-op.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::runtime::RunnerArgs;
use crate::think::{Jitter, ThinkSpec};

/// How long a stop step waits before forcing the iteration to continue.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(3000);

const STEP_KINDS: [&str; 4] = ["log", "think", "spawn", "stop"];

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Log { template: String },
    Think(ThinkSpec),
    Spawn(SpawnSpec),
    Stop(StopSpec),
    /// Descriptor without a recognized tag; keeps its keys for diagnostics
    Noop { keys: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpawnSpec {
    /// Node name template; the local host name when absent
    pub name: Option<String>,
    /// Runner options overriding the iteration defaults
    pub options: RunnerArgs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopSpec {
    pub timeout: Duration,
}

impl Default for StopSpec {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl Step {
    pub fn parse(descriptor: &Value) -> Step {
        let Some(map) = descriptor.as_object() else {
            return Step::Noop { keys: Vec::new() };
        };

        if let Some(value) = present(map, "log") {
            let template = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Step::Log { template };
        }

        if let Some(value) = present(map, "think") {
            return Step::Think(ThinkSpec {
                value: value.clone(),
                jitter: map
                    .get("jitter")
                    .and_then(|j| Jitter::try_from(j.clone()).ok()),
            });
        }

        if let Some(value) = present(map, "spawn") {
            return Step::Spawn(SpawnSpec::from_descriptor(value, map.get("options")));
        }

        if let Some(value) = present(map, "stop") {
            return Step::Stop(StopSpec::from_value(value));
        }

        Step::Noop {
            keys: map.keys().cloned().collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Step::Log { .. } => "log",
            Step::Think(_) => "think",
            Step::Spawn(_) => "spawn",
            Step::Stop(_) => "stop",
            Step::Noop { .. } => "noop",
        }
    }

    /// Keys of a no-op descriptor that look like misspelled or disabled tags.
    pub fn unrecognized_keys(&self) -> Option<&[String]> {
        match self {
            Step::Noop { keys } => Some(keys.as_slice()),
            _ => None,
        }
    }
}

impl SpawnSpec {
    /// `spawn` may be `true` or a mapping with `name`, `options` and inline
    /// runner options. A sibling `options` mapping on the descriptor has the
    /// lowest precedence.
    fn from_descriptor(value: &Value, sibling_options: Option<&Value>) -> Self {
        let mut spec = SpawnSpec::default();

        if let Some(Value::Object(options)) = sibling_options {
            extend(&mut spec.options, options);
        }

        if let Value::Object(body) = value {
            for (key, value) in body {
                match (key.as_str(), value) {
                    ("name", Value::String(name)) => spec.name = Some(name.clone()),
                    ("name", _) => {}
                    ("options", Value::Object(options)) => extend(&mut spec.options, options),
                    ("options", _) => {}
                    _ => {
                        spec.options.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        spec
    }
}

impl StopSpec {
    fn from_value(value: &Value) -> Self {
        let timeout = value
            .get("timeout")
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_STOP_TIMEOUT);
        StopSpec { timeout }
    }
}

fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|value| is_truthy(value))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn extend(target: &mut RunnerArgs, options: &Map<String, Value>) {
    for (key, value) in options {
        target.insert(key.clone(), value.clone());
    }
}

/// Whether a key names one of the step kinds.
pub fn is_step_kind(key: &str) -> bool {
    STEP_KINDS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_each_kind() {
        assert_eq!(
            Step::parse(&json!({ "log": "hi {{ name }}" })),
            Step::Log {
                template: "hi {{ name }}".to_string()
            }
        );
        assert_eq!(Step::parse(&json!({ "think": 2 })).kind(), "think");
        assert_eq!(Step::parse(&json!({ "spawn": true })).kind(), "spawn");
        assert_eq!(
            Step::parse(&json!({ "stop": true })),
            Step::Stop(StopSpec::default())
        );
    }

    #[test]
    fn test_first_present_tag_wins() {
        let step = Step::parse(&json!({ "stop": true, "spawn": true, "log": "x" }));
        assert_eq!(step.kind(), "log");

        let step = Step::parse(&json!({ "stop": true, "think": 1 }));
        assert_eq!(step.kind(), "think");

        let step = Step::parse(&json!({ "stop": true, "spawn": { "name": "n" } }));
        assert_eq!(step.kind(), "spawn");
    }

    #[test]
    fn test_falsy_tags_are_skipped() {
        let step = Step::parse(&json!({ "log": "", "stop": true }));
        assert_eq!(step.kind(), "stop");

        let step = Step::parse(&json!({ "think": 0 }));
        assert_eq!(step.kind(), "noop");

        let step = Step::parse(&json!({ "spawn": false, "stop": null }));
        assert_eq!(step.kind(), "noop");
    }

    #[test]
    fn test_unrecognized_descriptor_is_noop() {
        let step = Step::parse(&json!({ "spwan": { "name": "n1" } }));
        assert_eq!(step.unrecognized_keys(), Some(&["spwan".to_string()][..]));

        assert_eq!(
            Step::parse(&json!("log")),
            Step::Noop { keys: Vec::new() }
        );
        assert!(Step::parse(&json!({ "log": "x" })).unrecognized_keys().is_none());
    }

    #[test]
    fn test_think_jitter() {
        let step = Step::parse(&json!({ "think": 1, "jitter": "25%" }));
        let Step::Think(spec) = step else {
            panic!("expected think step");
        };
        assert_eq!(spec.value, json!(1));
        assert_eq!(spec.jitter, Some(Jitter::Percent(25.0)));
    }

    #[test]
    fn test_spawn_options() {
        let step = Step::parse(&json!({
            "spawn": {
                "name": "n1",
                "transporter": "NATS",
                "options": { "config": "custom.config.js" }
            },
            "options": { "config": "sibling.config.js", "hot": true }
        }));

        let Step::Spawn(spec) = step else {
            panic!("expected spawn step");
        };
        assert_eq!(spec.name.as_deref(), Some("n1"));
        assert_eq!(spec.options["config"], json!("custom.config.js"));
        assert_eq!(spec.options["transporter"], json!("NATS"));
        assert_eq!(spec.options["hot"], json!(true));
        assert!(!spec.options.contains_key("name"));
    }

    #[test]
    fn test_stop_timeout() {
        let step = Step::parse(&json!({ "stop": { "timeout": 500 } }));
        assert_eq!(
            step,
            Step::Stop(StopSpec {
                timeout: Duration::from_millis(500)
            })
        );
    }

    #[test]
    fn test_step_kinds() {
        assert!(is_step_kind("spawn"));
        assert!(!is_step_kind("loop"));
    }
}
