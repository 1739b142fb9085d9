//! Pauses between steps, with optional jitter.
//!
//! A think value is a number of seconds, or a template rendering to one.
//! Jitter is either a percentage of the think time (`"10%"`) or an absolute
//! number of milliseconds; the pause is drawn uniformly from
//! `think ± jitter` and never goes below zero.

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::Vars;
use crate::template;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Jitter {
    Percent(f64),
    Millis(f64),
}

impl TryFrom<Value> for Jitter {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::Number(n) => n
                .as_f64()
                .filter(|n| *n >= 0.0)
                .map(Jitter::Millis)
                .ok_or_else(|| format!("invalid jitter: {}", value)),
            Value::String(s) => {
                let s = s.trim();
                let parsed = match s.strip_suffix('%') {
                    Some(pct) => pct.trim().parse::<f64>().map(Jitter::Percent),
                    None => s.parse::<f64>().map(Jitter::Millis),
                };
                match parsed {
                    Ok(Jitter::Percent(p)) | Ok(Jitter::Millis(p)) if p < 0.0 => {
                        Err(format!("negative jitter: {}", s))
                    }
                    Ok(jitter) => Ok(jitter),
                    Err(e) => Err(format!("invalid jitter {:?}: {}", s, e)),
                }
            }
            _ => Err(format!("invalid jitter: {}", value)),
        }
    }
}

impl Jitter {
    /// Maximum deviation in milliseconds for a base pause.
    fn spread_ms(&self, base_ms: f64) -> f64 {
        match self {
            Jitter::Percent(pct) => base_ms * pct / 100.0,
            Jitter::Millis(ms) => *ms,
        }
    }
}

/// `config.defaults.think` from the script.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThinkDefaults {
    pub jitter: Option<Jitter>,
}

/// A single `think` step.
#[derive(Debug, Clone, PartialEq)]
pub struct ThinkSpec {
    pub value: Value,
    pub jitter: Option<Jitter>,
}

/// Compute the pause for one execution of a think step.
pub fn think_time<R: Rng>(
    spec: &ThinkSpec,
    defaults: &ThinkDefaults,
    vars: &Vars,
    rng: &mut R,
) -> Duration {
    let seconds = match &spec.value {
        Value::Number(n) => n.as_f64(),
        Value::String(_) => template::render_value(&spec.value, vars).trim().parse::<f64>().ok(),
        _ => None,
    };

    let Some(seconds) = seconds.filter(|s| s.is_finite() && *s >= 0.0) else {
        warn!(value = %spec.value, "think value is not a number of seconds, not waiting");
        return Duration::ZERO;
    };

    let base_ms = seconds * 1000.0;
    let total_ms = match spec.jitter.or(defaults.jitter) {
        Some(jitter) => {
            let spread = jitter.spread_ms(base_ms);
            // gen_range needs the full width of the range to be finite
            if !(spread * 2.0).is_finite() {
                warn!(value = %spec.value, ?jitter, "think jitter is out of range, not waiting");
                return Duration::ZERO;
            }
            if spread > 0.0 {
                (base_ms + rng.gen_range(-spread..=spread)).max(0.0)
            } else {
                base_ms
            }
        }
        None => base_ms,
    };

    match Duration::try_from_secs_f64(total_ms / 1000.0) {
        Ok(pause) => pause,
        Err(e) => {
            warn!(value = %spec.value, error = %e, "think time is out of range, not waiting");
            Duration::ZERO
        }
    }
}

/// Suspend the current iteration for the think time.
pub async fn wait(spec: &ThinkSpec, defaults: &ThinkDefaults, vars: &Vars) {
    let pause = think_time(spec, defaults, vars, &mut rand::thread_rng());
    debug!(pause_ms = pause.as_millis() as u64, "thinking");
    tokio::time::sleep(pause).await;
}
