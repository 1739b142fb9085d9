//! `{{ ... }}` template rendering against iteration variables.
//!
//! Supported expressions are a variable name (dotted paths reach into
//! objects) and the helper calls `$increment(x)` / `$decrement(x)`, where `x`
//! is a variable name or an integer literal. Unknown names render as an
//! empty string.

use serde_json::Value;
use tracing::warn;

use crate::engine::Vars;
use crate::helpers;

pub fn render(template: &str, vars: &Vars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            // Unterminated expression, keep it verbatim
            out.push_str(&rest[open..]);
            return out;
        };
        out.push_str(&evaluate(after[..close].trim(), vars));
        rest = &after[close + 2..];
    }

    out.push_str(rest);
    out
}

/// Render a JSON value: strings are templates, everything else is printed.
pub fn render_value(value: &Value, vars: &Vars) -> String {
    match value {
        Value::String(s) => render(s, vars),
        other => display(other),
    }
}

fn evaluate(expr: &str, vars: &Vars) -> String {
    if let Some((function, argument)) = parse_call(expr) {
        let argument = match argument.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => lookup(argument, vars).cloned().unwrap_or(Value::Null),
        };
        let result = match function {
            "$increment" => helpers::increment(&argument),
            "$decrement" => helpers::decrement(&argument),
            other => {
                warn!(function = other, "unknown template function");
                return String::new();
            }
        };
        return format_number(result);
    }

    lookup(expr, vars).map(display).unwrap_or_default()
}

fn parse_call(expr: &str) -> Option<(&str, &str)> {
    let open = expr.find('(')?;
    let inner = expr[open + 1..].strip_suffix(')')?;
    Some((expr[..open].trim(), inner.trim()))
}

fn lookup<'a>(path: &str, vars: &'a Vars) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = vars.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
