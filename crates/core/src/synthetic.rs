//! Synthetic vector fields for demos and tests.
//!
//! A [`FieldSource`] produces a velocity `(u, v)` (eastward, northward) at
//! any geographic point. [`rasterize`] quantizes a source into the same RGBA8
//! layout the field loader produces, so synthetic data goes through exactly
//! the decoding path real data does.
//!
//! All implementations are deterministic: same inputs produce the same output.

use crate::error::EngineError;
use crate::field::{FieldMetadata, FieldTexture};
use glam::DVec2;
use noise::{NoiseFn, Perlin};

/// A source of 2-D velocities over geographic space.
pub trait FieldSource: Send + Sync {
    /// Velocity at `(lng, lat)` in degrees.
    fn velocity(&self, lng_lat: DVec2) -> DVec2;
}

/// Distances below this are treated as zero.
const SINGULARITY_EPS: f64 = 1e-10;

/// The same velocity everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformFlow {
    pub velocity: DVec2,
}

impl UniformFlow {
    pub fn new(u: f64, v: f64) -> Self {
        Self {
            velocity: DVec2::new(u, v),
        }
    }
}

impl FieldSource for UniformFlow {
    fn velocity(&self, _lng_lat: DVec2) -> DVec2 {
        self.velocity
    }
}

/// Counter-clockwise rotation around a center with Gaussian falloff.
///
/// `radius` is in degrees; a negative `strength` spins clockwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vortex {
    pub center: DVec2,
    pub strength: f64,
    pub radius: f64,
}

impl FieldSource for Vortex {
    fn velocity(&self, lng_lat: DVec2) -> DVec2 {
        let r = lng_lat - self.center;
        let dist_sq = r.length_squared();
        let dist = dist_sq.sqrt();
        if dist < SINGULARITY_EPS || self.radius.abs() < SINGULARITY_EPS {
            return DVec2::ZERO;
        }
        let falloff = (-dist_sq / (2.0 * self.radius * self.radius)).exp();
        r.perp() / dist * self.strength * falloff
    }
}

/// Curl of scalar Perlin noise: swirling, approximately divergence-free flow.
///
/// `time` selects a slice of the 3-D noise volume, so stepping it mimics
/// scrubbing through forecast hours.
pub struct CurlNoise {
    noise: Perlin,
    scale: f64,
    strength: f64,
    time: f64,
    eps: f64,
}

impl CurlNoise {
    /// `scale` is noise frequency per degree.
    pub fn new(scale: f64, strength: f64, seed: u32) -> Self {
        Self {
            noise: Perlin::new(seed),
            scale,
            strength,
            time: 0.0,
            eps: 0.001,
        }
    }

    pub fn at_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }
}

impl FieldSource for CurlNoise {
    fn velocity(&self, lng_lat: DVec2) -> DVec2 {
        let sx = lng_lat.x * self.scale;
        let sy = lng_lat.y * self.scale;
        let eps = self.eps * self.scale;
        if eps.abs() < SINGULARITY_EPS {
            return DVec2::ZERO;
        }
        let t = self.time;
        // u = dF/dy, v = -dF/dx
        let df_dy =
            (self.noise.get([sx, sy + eps, t]) - self.noise.get([sx, sy - eps, t])) / (2.0 * eps);
        let df_dx =
            (self.noise.get([sx + eps, sy, t]) - self.noise.get([sx - eps, sy, t])) / (2.0 * eps);
        DVec2::new(df_dy, -df_dx) * self.strength
    }
}

/// Sums the velocities of several sources.
#[derive(Default)]
pub struct CompositeField {
    sources: Vec<Box<dyn FieldSource>>,
}

impl CompositeField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source (builder pattern).
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, source: Box<dyn FieldSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FieldSource for CompositeField {
    fn velocity(&self, lng_lat: DVec2) -> DVec2 {
        self.sources
            .iter()
            .fold(DVec2::ZERO, |acc, s| acc + s.velocity(lng_lat))
    }
}

/// Geographic centers of every texel, row-major from the north-west corner.
fn texel_centers(meta: &FieldMetadata) -> impl Iterator<Item = DVec2> + '_ {
    let (w, h) = (meta.width, meta.height);
    (0..h).flat_map(move |row| {
        (0..w).map(move |col| {
            meta.to_geo(DVec2::new(
                (col as f64 + 0.5) / w as f64,
                (row as f64 + 0.5) / h as f64,
            ))
        })
    })
}

/// Metadata whose channel ranges exactly cover what `source` produces at
/// the texel centers of `layout`.
pub fn fitted_metadata(source: &dyn FieldSource, layout: FieldMetadata) -> FieldMetadata {
    let (lo, hi) = texel_centers(&layout)
        .map(|g| source.velocity(g))
        .fold((DVec2::INFINITY, DVec2::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let (lo, hi) = if lo.is_finite() && hi.is_finite() {
        (lo, hi)
    } else {
        (DVec2::ZERO, DVec2::ZERO)
    };
    FieldMetadata {
        u_min: lo.x,
        u_max: hi.x,
        v_min: lo.y,
        v_max: hi.y,
        ..layout
    }
}

/// Quantizes `source` into an RGBA8 field using `metadata`'s layout and
/// channel ranges. Values outside the ranges saturate.
pub fn rasterize(
    source: &dyn FieldSource,
    metadata: FieldMetadata,
) -> Result<FieldTexture, EngineError> {
    let metadata = metadata.validated()?;
    let data: Vec<u8> = texel_centers(&metadata)
        .flat_map(|g| {
            let v = source.velocity(g);
            [
                encode_channel(v.x, metadata.u_min, metadata.u_max),
                encode_channel(v.y, metadata.v_min, metadata.v_max),
                0,
                255,
            ]
        })
        .collect();
    FieldTexture::new(data, metadata)
}

fn encode_channel(value: f64, min: f64, max: f64) -> u8 {
    let range = max - min;
    if range <= 0.0 || !value.is_finite() {
        return 0;
    }
    ((value - min) / range * 255.0).round().clamp(0.0, 255.0) as u8
}
