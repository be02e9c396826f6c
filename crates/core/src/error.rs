//! Error types for the drift core.

use thiserror::Error;

/// Errors produced by engine operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A viewport box was empty or inverted on some axis.
    #[error(
        "invalid viewport bounds [{min_lng}, {min_lat}, {max_lng}, {max_lat}]: min must be below max on both axes"
    )]
    InvalidBounds {
        min_lng: f64,
        min_lat: f64,
        max_lng: f64,
        max_lat: f64,
    },

    /// Width or height was zero when sizing a frame or field.
    #[error("invalid dimensions ({width}, {height}): width and height must be non-zero")]
    InvalidDimensions { width: usize, height: usize },

    /// Field metadata was non-finite or otherwise unusable.
    #[error("malformed field metadata: {0}")]
    MalformedMetadata(String),

    /// The engine could not be brought into a usable state.
    #[error("engine initialization failed: {0}")]
    Initialization(String),

    /// A raw buffer did not match the size implied by its dimensions.
    #[error("buffer size mismatch: expected {expected} bytes, got {got}")]
    BufferSizeMismatch { expected: usize, got: usize },

    /// A parameter value was outside its accepted range.
    #[error("invalid value for '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    /// A color string could not be parsed.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// A color ramp could not be constructed from the given stops.
    #[error("invalid color ramp: {0}")]
    InvalidColorRamp(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_bounds_includes_all_edges() {
        let err = EngineError::InvalidBounds {
            min_lng: 10.0,
            min_lat: -5.0,
            max_lng: 3.0,
            max_lat: 7.5,
        };
        let msg = format!("{err}");
        assert!(msg.contains("10"), "missing min_lng in: {msg}");
        assert!(msg.contains("-5"), "missing min_lat in: {msg}");
        assert!(msg.contains("3"), "missing max_lng in: {msg}");
        assert!(msg.contains("7.5"), "missing max_lat in: {msg}");
    }

    #[test]
    fn invalid_dimensions_displays_readable_message() {
        let err = EngineError::InvalidDimensions {
            width: 0,
            height: 480,
        };
        let msg = format!("{err}");
        assert!(
            msg.contains("width") && msg.contains("height"),
            "expected message mentioning width and height, got: {msg}"
        );
        assert!(msg.contains("480"), "missing height in: {msg}");
    }

    #[test]
    fn malformed_metadata_includes_reason() {
        let err = EngineError::MalformedMetadata("uMin is NaN".into());
        let msg = format!("{err}");
        assert!(msg.contains("uMin is NaN"), "missing reason in: {msg}");
    }

    #[test]
    fn buffer_size_mismatch_includes_both_sizes() {
        let err = EngineError::BufferSizeMismatch {
            expected: 64,
            got: 60,
        };
        let msg = format!("{err}");
        assert!(msg.contains("64"), "missing expected in: {msg}");
        assert!(msg.contains("60"), "missing got in: {msg}");
    }

    #[test]
    fn invalid_param_includes_name_and_reason() {
        let err = EngineError::InvalidParam {
            name: "num_particles".into(),
            reason: "must be greater than zero".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("num_particles"), "missing name in: {msg}");
        assert!(msg.contains("greater than zero"), "missing reason in: {msg}");
    }

    #[test]
    fn initialization_and_ramp_errors_include_message() {
        let init = EngineError::Initialization("no frame".into());
        assert!(format!("{init}").contains("no frame"));
        let ramp = EngineError::InvalidColorRamp("empty".into());
        assert!(format!("{ramp}").contains("empty"));
        let color = EngineError::InvalidColor("bad hex".into());
        assert!(format!("{color}").contains("bad hex"));
    }

    #[test]
    fn engine_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EngineError>();
    }

    #[test]
    fn engine_error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<EngineError>();
    }
}
