//! Typed access to JSON configuration objects.
//!
//! The `param_*` readers take a JSON value, a key name, and a default. A
//! missing key or a value of the wrong type yields the default, so partial
//! configuration objects are always usable. [`check_range`] is the strict
//! counterpart used by setters that must reject bad input.

use crate::error::EngineError;
use serde_json::Value;

/// Reads an `f64`, accepting JSON integers as well.
pub fn param_f64(params: &Value, name: &str, default: f64) -> f64 {
    params.get(name).and_then(Value::as_f64).unwrap_or(default)
}

/// Reads a non-negative integer as `usize`.
pub fn param_usize(params: &Value, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

/// Reads a non-negative integer as `u64`.
pub fn param_u64(params: &Value, name: &str, default: u64) -> u64 {
    params.get(name).and_then(Value::as_u64).unwrap_or(default)
}

pub fn param_bool(params: &Value, name: &str, default: bool) -> bool {
    params.get(name).and_then(Value::as_bool).unwrap_or(default)
}

pub fn param_string(params: &Value, name: &str, default: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| default.to_owned())
}

/// Returns `value` if it is finite and within `[min, max]`.
pub fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<f64, EngineError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(EngineError::InvalidParam {
            name: name.to_owned(),
            reason: format!("{value} is outside [{min}, {max}]"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- param_f64 --

    #[test]
    fn param_f64_extracts_existing_float() {
        let params = json!({"speedFactor": 0.4});
        assert!((param_f64(&params, "speedFactor", 0.25) - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn param_f64_extracts_integer_as_float() {
        let params = json!({"dropRate": 1});
        assert!((param_f64(&params, "dropRate", 0.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn param_f64_returns_default_when_missing_or_mistyped() {
        assert_eq!(param_f64(&json!({}), "fadeOpacity", 0.996), 0.996);
        assert_eq!(param_f64(&json!({"fadeOpacity": "high"}), "fadeOpacity", 0.9), 0.9);
        assert_eq!(param_f64(&json!({"fadeOpacity": null}), "fadeOpacity", 0.5), 0.5);
        assert_eq!(param_f64(&json!("not an object"), "fadeOpacity", 0.7), 0.7);
    }

    // -- integers --

    #[test]
    fn param_usize_extracts_existing_integer() {
        let params = json!({"numParticles": 50000});
        assert_eq!(param_usize(&params, "numParticles", 0), 50000);
    }

    #[test]
    fn param_usize_rejects_float_and_negative() {
        assert_eq!(param_usize(&json!({"numParticles": 2.5}), "numParticles", 99), 99);
        assert_eq!(param_usize(&json!({"numParticles": -1}), "numParticles", 5), 5);
        assert_eq!(param_usize(&json!({"numParticles": "many"}), "numParticles", 8), 8);
    }

    #[test]
    fn param_u64_reads_full_range() {
        let params = json!({"seed": u64::MAX});
        assert_eq!(param_u64(&params, "seed", 0), u64::MAX);
        assert_eq!(param_u64(&json!({}), "seed", 42), 42);
    }

    // -- bool / string --

    #[test]
    fn param_bool_extracts_and_defaults() {
        assert!(param_bool(&json!({"enableTrails": true}), "enableTrails", false));
        assert!(!param_bool(&json!({"enableTrails": false}), "enableTrails", true));
        assert!(param_bool(&json!({}), "enableTrails", true));
        assert!(!param_bool(&json!({"enableTrails": 1}), "enableTrails", false));
    }

    #[test]
    fn param_string_extracts_and_defaults() {
        assert_eq!(param_string(&json!({"colorRamp": "magnitude"}), "colorRamp", "wind"), "magnitude");
        assert_eq!(param_string(&json!({}), "colorRamp", "wind"), "wind");
        assert_eq!(param_string(&json!({"colorRamp": 42}), "colorRamp", "wind"), "wind");
    }

    // -- check_range --

    #[test]
    fn check_range_accepts_inclusive_bounds() {
        assert_eq!(check_range("dropRate", 0.0, 0.0, 1.0), Ok(0.0));
        assert_eq!(check_range("dropRate", 1.0, 0.0, 1.0), Ok(1.0));
    }

    #[test]
    fn check_range_rejects_outside_and_non_finite() {
        for bad in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let err = check_range("dropRate", bad, 0.0, 1.0).unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidParam { ref name, .. } if name == "dropRate"),
                "{bad} gave {err:?}"
            );
        }
    }
}
