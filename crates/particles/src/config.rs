//! Engine configuration as a JSON-parameterized struct.

use crate::advection::AdvectionParams;
use drift_core::params::{check_range, param_bool, param_f64, param_string, param_u64, param_usize};
use drift_core::{ColorRamp, EngineError, Sampling};
use serde_json::{json, Value};

/// Largest particle count accepted (a 2048 x 2048 grid).
pub const MAX_PARTICLES: usize = 2048 * 2048;
/// Smallest accepted `speedFactor`. Particles never stop: the effective
/// per-frame speed is still clamped up to `MIN_EFFECTIVE_SPEED`.
pub const MIN_SPEED_FACTOR: f64 = 0.01;
pub const MAX_SPEED_FACTOR: f64 = 10.0;

const DEFAULT_NUM_PARTICLES: usize = 65536;
const DEFAULT_FADE_OPACITY: f64 = 0.996;
const DEFAULT_SPEED_FACTOR: f64 = 0.25;
const DEFAULT_DROP_RATE: f64 = 0.003;
const DEFAULT_DROP_RATE_BUMP: f64 = 0.01;
const DEFAULT_COMPACT_MARGIN: f64 = 0.1;
const DEFAULT_COMPACT_THRESHOLD: f64 = 0.05;
const DEFAULT_DROP_COMPACTED_RATE: f64 = 0.0;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_COLOR_RAMP: &str = "wind";

/// All tunables of a [`FlowEngine`](crate::FlowEngine).
///
/// Use [`Default`] for the stand-alone engine defaults, or
/// [`map_layer`](Self::map_layer) for the denser-fading map overlay preset.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowConfig {
    /// Requested particle count; rounded up to a square grid.
    pub num_particles: usize,
    pub speed_factor: f64,
    pub drop_rate: f64,
    pub drop_rate_bump: f64,
    /// Per-frame multiplier applied to the trail image.
    pub fade_opacity: f64,
    pub enable_trails: bool,
    pub compact_margin: f64,
    pub compact_threshold: f64,
    pub drop_compacted_rate: f64,
    /// Blend between texels instead of taking the containing one.
    pub bilinear: bool,
    pub seed: u64,
    /// Name of a built-in ramp.
    pub color_ramp: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            num_particles: DEFAULT_NUM_PARTICLES,
            speed_factor: DEFAULT_SPEED_FACTOR,
            drop_rate: DEFAULT_DROP_RATE,
            drop_rate_bump: DEFAULT_DROP_RATE_BUMP,
            fade_opacity: DEFAULT_FADE_OPACITY,
            enable_trails: true,
            compact_margin: DEFAULT_COMPACT_MARGIN,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            drop_compacted_rate: DEFAULT_DROP_COMPACTED_RATE,
            bilinear: false,
            seed: DEFAULT_SEED,
            color_ramp: DEFAULT_COLOR_RAMP.to_owned(),
        }
    }
}

impl FlowConfig {
    /// Preset for an overlay on an interactive map: fewer, slower particles,
    /// shorter trails and aggressive thinning of uniform regions.
    pub fn map_layer() -> Self {
        Self {
            num_particles: 50_000,
            fade_opacity: 0.985,
            speed_factor: 0.12,
            drop_rate: 0.005,
            drop_rate_bump: 0.008,
            compact_margin: 0.1,
            compact_threshold: 0.05,
            drop_compacted_rate: 0.9,
            ..Self::default()
        }
    }

    /// Extracts a config from a JSON object, falling back to defaults for
    /// missing or mistyped keys. Values are not range-checked; see
    /// [`validated`](Self::validated).
    pub fn from_json(params: &Value) -> Self {
        let d = Self::default();
        Self {
            num_particles: param_usize(params, "numParticles", d.num_particles),
            speed_factor: param_f64(params, "speedFactor", d.speed_factor),
            drop_rate: param_f64(params, "dropRate", d.drop_rate),
            drop_rate_bump: param_f64(params, "dropRateBump", d.drop_rate_bump),
            fade_opacity: param_f64(params, "fadeOpacity", d.fade_opacity),
            enable_trails: param_bool(params, "enableTrails", d.enable_trails),
            compact_margin: param_f64(params, "compactMargin", d.compact_margin),
            compact_threshold: param_f64(params, "compactThreshold", d.compact_threshold),
            drop_compacted_rate: param_f64(params, "dropCompactedRate", d.drop_compacted_rate),
            bilinear: param_bool(params, "bilinear", d.bilinear),
            seed: param_u64(params, "seed", d.seed),
            color_ramp: param_string(params, "colorRamp", &d.color_ramp),
        }
    }

    /// Checks every value against the ranges in [`param_schema`](Self::param_schema).
    pub fn validated(self) -> Result<Self, EngineError> {
        validate_num_particles(self.num_particles)?;
        check_range("speedFactor", self.speed_factor, MIN_SPEED_FACTOR, MAX_SPEED_FACTOR)?;
        check_range("dropRate", self.drop_rate, 0.0, 1.0)?;
        check_range("dropRateBump", self.drop_rate_bump, 0.0, 1.0)?;
        check_range("fadeOpacity", self.fade_opacity, 0.0, 1.0)?;
        check_range("compactMargin", self.compact_margin, 0.0, 1.0)?;
        check_range("compactThreshold", self.compact_threshold, 0.0, 1.0)?;
        check_range("dropCompactedRate", self.drop_compacted_rate, 0.0, 1.0)?;
        ColorRamp::from_name(&self.color_ramp)?;
        Ok(self)
    }

    pub fn sampling(&self) -> Sampling {
        if self.bilinear {
            Sampling::Bilinear
        } else {
            Sampling::Nearest
        }
    }

    /// The subset of the config the advection stage consumes.
    pub fn advection_params(&self) -> AdvectionParams {
        AdvectionParams {
            speed_factor: self.speed_factor,
            drop_rate: self.drop_rate,
            drop_rate_bump: self.drop_rate_bump,
            compact_margin: self.compact_margin,
            compact_threshold: self.compact_threshold,
            drop_compacted_rate: self.drop_compacted_rate,
            sampling: self.sampling(),
        }
    }

    /// Current values as JSON, using the same keys as [`from_json`](Self::from_json).
    pub fn params(&self) -> Value {
        json!({
            "numParticles": self.num_particles,
            "speedFactor": self.speed_factor,
            "dropRate": self.drop_rate,
            "dropRateBump": self.drop_rate_bump,
            "fadeOpacity": self.fade_opacity,
            "enableTrails": self.enable_trails,
            "compactMargin": self.compact_margin,
            "compactThreshold": self.compact_threshold,
            "dropCompactedRate": self.drop_compacted_rate,
            "bilinear": self.bilinear,
            "seed": self.seed,
            "colorRamp": self.color_ramp,
        })
    }

    /// Type, default, range and description of every tunable.
    pub fn param_schema() -> Value {
        json!({
            "numParticles": {
                "type": "integer",
                "default": DEFAULT_NUM_PARTICLES,
                "min": 1,
                "max": MAX_PARTICLES,
                "description": "Particle count, rounded up to a perfect square"
            },
            "speedFactor": {
                "type": "number",
                "default": DEFAULT_SPEED_FACTOR,
                "min": MIN_SPEED_FACTOR,
                "max": MAX_SPEED_FACTOR,
                "description": "Advection speed multiplier, scaled by viewport width and clamped to [0.05, 2]"
            },
            "dropRate": {
                "type": "number",
                "default": DEFAULT_DROP_RATE,
                "min": 0.0,
                "max": 1.0,
                "description": "Base per-frame respawn probability"
            },
            "dropRateBump": {
                "type": "number",
                "default": DEFAULT_DROP_RATE_BUMP,
                "min": 0.0,
                "max": 1.0,
                "description": "Extra respawn probability at maximum speed"
            },
            "fadeOpacity": {
                "type": "number",
                "default": DEFAULT_FADE_OPACITY,
                "min": 0.0,
                "max": 1.0,
                "description": "Trail fade per frame; higher keeps trails longer"
            },
            "enableTrails": {
                "type": "boolean",
                "default": true,
                "description": "Accumulate faded trails between frames"
            },
            "compactMargin": {
                "type": "number",
                "default": DEFAULT_COMPACT_MARGIN,
                "min": 0.0,
                "max": 1.0,
                "description": "Neighbor offset for the uniform-region test, as a fraction of the viewport"
            },
            "compactThreshold": {
                "type": "number",
                "default": DEFAULT_COMPACT_THRESHOLD,
                "min": 0.0,
                "max": 1.0,
                "description": "Normalized velocity spread below which a region is uniform"
            },
            "dropCompactedRate": {
                "type": "number",
                "default": DEFAULT_DROP_COMPACTED_RATE,
                "min": 0.0,
                "max": 1.0,
                "description": "Respawn probability for particles in uniform regions"
            },
            "bilinear": {
                "type": "boolean",
                "default": false,
                "description": "Interpolate the field between texel centers"
            },
            "seed": {
                "type": "integer",
                "default": DEFAULT_SEED,
                "description": "Seed for particle placement and respawn draws"
            },
            "colorRamp": {
                "type": "string",
                "default": DEFAULT_COLOR_RAMP,
                "options": ColorRamp::list_names(),
                "description": "Built-in speed color ramp"
            }
        })
    }
}

/// Accepts `1..=MAX_PARTICLES`.
pub fn validate_num_particles(n: usize) -> Result<usize, EngineError> {
    if (1..=MAX_PARTICLES).contains(&n) {
        Ok(n)
    } else {
        Err(EngineError::InvalidParam {
            name: "numParticles".to_owned(),
            reason: format!("{n} is outside [1, {MAX_PARTICLES}]"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constructor_values() {
        let c = FlowConfig::default();
        assert_eq!(c.num_particles, 65536);
        assert_eq!(c.fade_opacity, 0.996);
        assert_eq!(c.speed_factor, 0.25);
        assert_eq!(c.drop_rate, 0.003);
        assert_eq!(c.drop_rate_bump, 0.01);
        assert_eq!(c.drop_compacted_rate, 0.0);
        assert!(c.enable_trails);
        assert!(c.validated().is_ok());
    }

    #[test]
    fn map_layer_preset_values() {
        let c = FlowConfig::map_layer();
        assert_eq!(c.num_particles, 50_000);
        assert_eq!(c.fade_opacity, 0.985);
        assert_eq!(c.speed_factor, 0.12);
        assert_eq!(c.drop_rate, 0.005);
        assert_eq!(c.drop_rate_bump, 0.008);
        assert_eq!(c.drop_compacted_rate, 0.9);
        assert!(c.validated().is_ok());
    }

    #[test]
    fn from_json_uses_defaults_for_empty_json() {
        assert_eq!(FlowConfig::from_json(&json!({})), FlowConfig::default());
    }

    #[test]
    fn from_json_extracts_custom_values() {
        let c = FlowConfig::from_json(&json!({
            "numParticles": 1000,
            "dropRate": 0.2,
            "enableTrails": false,
            "bilinear": true,
            "colorRamp": "magnitude",
            "seed": 7,
        }));
        assert_eq!(c.num_particles, 1000);
        assert_eq!(c.drop_rate, 0.2);
        assert!(!c.enable_trails);
        assert_eq!(c.sampling(), Sampling::Bilinear);
        assert_eq!(c.color_ramp, "magnitude");
        assert_eq!(c.seed, 7);
        assert_eq!(c.speed_factor, DEFAULT_SPEED_FACTOR);
    }

    #[test]
    fn params_round_trip_through_from_json() {
        let c = FlowConfig::map_layer();
        assert_eq!(FlowConfig::from_json(&c.params()), c);
    }

    #[test]
    fn param_schema_covers_every_param() {
        let schema = FlowConfig::param_schema();
        let params = FlowConfig::default().params();
        let keys = params.as_object().unwrap().keys();
        for key in keys {
            assert!(schema.get(key).is_some(), "schema missing {key}");
            assert!(schema[key].get("description").is_some());
        }
    }

    #[test]
    fn validated_rejects_out_of_range_values() {
        let bad = [
            FlowConfig {
                drop_rate: 1.5,
                ..FlowConfig::default()
            },
            FlowConfig {
                fade_opacity: -0.1,
                ..FlowConfig::default()
            },
            FlowConfig {
                speed_factor: f64::NAN,
                ..FlowConfig::default()
            },
            FlowConfig {
                speed_factor: 0.0,
                ..FlowConfig::default()
            },
            FlowConfig {
                num_particles: 0,
                ..FlowConfig::default()
            },
        ];
        for c in bad {
            assert!(
                matches!(c.clone().validated(), Err(EngineError::InvalidParam { .. })),
                "{c:?} should be rejected"
            );
        }
    }

    #[test]
    fn validated_rejects_unknown_ramp() {
        let c = FlowConfig {
            color_ramp: "rainbow".to_owned(),
            ..FlowConfig::default()
        };
        assert!(matches!(c.validated(), Err(EngineError::InvalidColorRamp(_))));
    }

    #[test]
    fn advection_params_mirror_config() {
        let c = FlowConfig::map_layer();
        let p = c.advection_params();
        assert_eq!(p.drop_rate, c.drop_rate);
        assert_eq!(p.drop_compacted_rate, c.drop_compacted_rate);
        assert_eq!(p.sampling, Sampling::Nearest);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn in_range_rates_always_validate(
                drop_rate in 0.0_f64..=1.0,
                bump in 0.0_f64..=1.0,
                fade in 0.0_f64..=1.0,
                n in 1_usize..=MAX_PARTICLES,
            ) {
                let c = FlowConfig {
                    num_particles: n,
                    drop_rate,
                    drop_rate_bump: bump,
                    fade_opacity: fade,
                    ..FlowConfig::default()
                };
                prop_assert!(c.validated().is_ok());
            }
        }
    }
}
