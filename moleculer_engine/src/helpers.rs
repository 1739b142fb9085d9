//! Arithmetic helpers exposed to templates as `$increment` and `$decrement`.

use serde_json::Value;

/// Returns `value + 1` for integers and NaN for anything else.
pub fn increment(value: &Value) -> f64 {
    as_integer(value).map_or(f64::NAN, |n| n + 1.0)
}

/// Returns `value - 1` for integers and NaN for anything else.
pub fn decrement(value: &Value) -> f64 {
    as_integer(value).map_or(f64::NAN, |n| n - 1.0)
}

// `5.0` counts as an integer, strings never do.
fn as_integer(value: &Value) -> Option<f64> {
    let n = value.as_f64()?;
    (n.is_finite() && n.fract() == 0.0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_increment_integer() {
        assert_eq!(increment(&json!(5)), 6.0);
        assert_eq!(increment(&json!(-1)), 0.0);
        assert_eq!(increment(&json!(5.0)), 6.0);
    }

    #[test]
    fn test_decrement_integer() {
        assert_eq!(decrement(&json!(0)), -1.0);
        assert_eq!(decrement(&json!(10)), 9.0);
    }

    #[test]
    fn test_non_integers_are_nan() {
        assert!(increment(&json!(5.5)).is_nan());
        assert!(decrement(&json!("x")).is_nan());
        assert!(increment(&json!("5")).is_nan());
        assert!(decrement(&Value::Null).is_nan());
        assert!(increment(&json!([1])).is_nan());
    }
}
