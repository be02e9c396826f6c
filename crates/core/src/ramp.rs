//! Speed-to-color ramp built from ordered color stops.
//!
//! A [`ColorRamp`] holds `(position, color)` stops sorted by position and a
//! fixed 256-entry RGBA8 lookup table rebuilt from them. Particles are
//! shaded by indexing the table with their normalized speed.

use crate::color::Srgb;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Number of entries in the lookup table.
pub const RAMP_RESOLUTION: usize = 256;

/// Names accepted by [`ColorRamp::from_name`].
const RAMP_NAMES: &[&str] = &["wind", "magnitude"];

/// One color stop. `position` lies in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub position: f64,
    pub color: Srgb,
}

impl ColorStop {
    pub fn new(position: f64, color: Srgb) -> Self {
        Self { position, color }
    }
}

/// Ordered color stops plus their lookup table.
///
/// Values below the first stop take the first color, values above the last
/// stop take the last color, and values in between mix the bracketing pair
/// linearly per channel.
#[derive(Debug, Clone)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
    lut: Vec<[u8; 4]>,
}

impl ColorRamp {
    /// Builds a ramp from stops sorted ascending by position.
    ///
    /// Rejects an empty list, non-finite or out-of-[0, 1] positions, and
    /// stops that are out of order.
    pub fn new(stops: Vec<ColorStop>) -> Result<Self, EngineError> {
        if stops.is_empty() {
            return Err(EngineError::InvalidColorRamp(
                "ramp requires at least 1 stop".to_string(),
            ));
        }
        if let Some(bad) = stops
            .iter()
            .find(|s| !s.position.is_finite() || !(0.0..=1.0).contains(&s.position))
        {
            return Err(EngineError::InvalidColorRamp(format!(
                "stop position {} is outside [0, 1]",
                bad.position
            )));
        }
        if let Some(pair) = stops.windows(2).find(|w| w[1].position < w[0].position) {
            return Err(EngineError::InvalidColorRamp(format!(
                "stops must be sorted by position: {} follows {}",
                pair[1].position, pair[0].position
            )));
        }
        let lut = build_lut(&stops);
        Ok(Self { stops, lut })
    }

    /// Builds a ramp from `(position, "#rrggbb")` pairs.
    pub fn from_hex_stops(stops: &[(f64, &str)]) -> Result<Self, EngineError> {
        let stops: Result<Vec<ColorStop>, EngineError> = stops
            .iter()
            .map(|&(position, hex)| Srgb::from_hex(hex).map(|c| ColorStop::new(position, c)))
            .collect();
        Self::new(stops?)
    }

    /// Looks up a built-in ramp by name.
    pub fn from_name(name: &str) -> Result<Self, EngineError> {
        match name {
            "wind" => Ok(Self::default_wind()),
            "magnitude" => Ok(Self::magnitude()),
            other => Err(EngineError::InvalidColorRamp(format!(
                "unknown ramp '{other}', expected one of {}",
                RAMP_NAMES.join(", ")
            ))),
        }
    }

    /// Names of the built-in ramps.
    pub fn list_names() -> &'static [&'static str] {
        RAMP_NAMES
    }

    /// The stops this ramp was built from.
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// The 256-entry RGBA8 lookup table.
    pub fn lut(&self) -> &[[u8; 4]] {
        &self.lut
    }

    /// Exact interpolated color at `t`, clamped to the stop range.
    ///
    /// NaN is treated as the lowest value.
    pub fn sample(&self, t: f64) -> Srgb {
        interpolate(&self.stops, if t.is_nan() { f64::NEG_INFINITY } else { t })
    }

    /// Table lookup for a value in [0, 1]; values outside are clamped.
    pub fn lookup(&self, t: f64) -> [u8; 4] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let idx = (t * (RAMP_RESOLUTION - 1) as f64).round() as usize;
        self.lut[idx.min(RAMP_RESOLUTION - 1)]
    }

    // -- Built-in ramps --

    /// Blue through yellow to red, the classic wind-speed ramp.
    pub fn default_wind() -> Self {
        Self::from_hex_stops(&[
            (0.0, "#3288bd"),
            (0.1, "#66c2a5"),
            (0.2, "#abdda4"),
            (0.3, "#e6f598"),
            (0.4, "#fee08b"),
            (0.5, "#fdae61"),
            (0.6, "#f46d43"),
            (1.0, "#d53e4f"),
        ])
        .expect("wind ramp stops are valid")
    }

    /// Black, blue, green, orange, dark red: current magnitude shading.
    pub fn magnitude() -> Self {
        Self::from_hex_stops(&[
            (0.0, "#000000"),
            (0.25, "#0000ff"),
            (0.5, "#00ff00"),
            (0.75, "#ffa500"),
            (1.0, "#8b0000"),
        ])
        .expect("magnitude ramp stops are valid")
    }
}

impl Default for ColorRamp {
    fn default() -> Self {
        Self::default_wind()
    }
}

/// Piecewise-linear interpolation over sorted, non-empty stops.
fn interpolate(stops: &[ColorStop], t: f64) -> Srgb {
    let first = stops[0];
    let last = stops[stops.len() - 1];
    if t <= first.position {
        return first.color;
    }
    if t >= last.position {
        return last.color;
    }
    stops
        .windows(2)
        .find(|w| t >= w[0].position && t <= w[1].position)
        .map(|w| {
            let range = w[1].position - w[0].position;
            let frac = if range == 0.0 {
                0.0
            } else {
                (t - w[0].position) / range
            };
            w[0].color.lerp(w[1].color, frac)
        })
        .unwrap_or(last.color)
}

fn build_lut(stops: &[ColorStop]) -> Vec<[u8; 4]> {
    (0..RAMP_RESOLUTION)
        .map(|i| {
            let t = i as f64 / (RAMP_RESOLUTION - 1) as f64;
            interpolate(stops, t).to_rgba8()
        })
        .collect()
}
