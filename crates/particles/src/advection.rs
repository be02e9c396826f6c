//! Per-frame particle advection with stochastic respawn.
//!
//! Each particle is processed independently from the current generation into
//! the next one. Its random draws come from a stream keyed by
//! `(frame_seed, index)`, so the output is identical for any processing order.
//!
//! Respawn combines two independent draws, always taken in this order:
//!
//! 1. *compact*: if the field around the particle is locally uniform, respawn
//!    with probability `drop_compacted_rate`;
//! 2. *drop*: respawn with probability `drop_rate + drop_rate_bump * speed_t`,
//!    where `speed_t = |v| / max_magnitude`.
//!
//! A particle respawns if either draw fires. Respawned particles land
//! uniformly inside the visible part of the field with zero speed.

use crate::store::{ParticleStore, Texel};
use drift_core::codec::{decode_position, encode_position, ZERO_SPEED};
use drift_core::{FieldRect, FieldTexture, Sampling, SpeedCodec, ViewportMapper, Xorshift64};
use glam::DVec2;

/// Particle-space displacement per unit of velocity per frame.
pub const ADVECTION_SCALE: f64 = 0.001;
/// Lower clamp for the viewport-adjusted speed factor.
pub const MIN_EFFECTIVE_SPEED: f64 = 0.05;
/// Upper clamp for the viewport-adjusted speed factor.
pub const MAX_EFFECTIVE_SPEED: f64 = 2.0;

/// Tunables for one advection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvectionParams {
    pub speed_factor: f64,
    pub drop_rate: f64,
    pub drop_rate_bump: f64,
    /// Neighbor offset for the compact test, as a fraction of the viewport.
    pub compact_margin: f64,
    /// Normalized spread below which a region counts as compact.
    pub compact_threshold: f64,
    pub drop_compacted_rate: f64,
    pub sampling: Sampling,
}

impl Default for AdvectionParams {
    fn default() -> Self {
        Self {
            speed_factor: 0.25,
            drop_rate: 0.003,
            drop_rate_bump: 0.01,
            compact_margin: 0.1,
            compact_threshold: 0.05,
            drop_compacted_rate: 0.0,
            sampling: Sampling::Nearest,
        }
    }
}

/// Counts from one advection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvectionStats {
    /// Particles respawned by the compact or drop draw.
    pub respawned: usize,
    /// Of those, particles whose compact draw fired.
    pub compacted: usize,
    /// Particles respawned because they left the field.
    pub exited: usize,
}

impl AdvectionStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Moved => {}
            Outcome::Respawned { compacted } => {
                self.respawned += 1;
                if compacted {
                    self.compacted += 1;
                }
            }
            Outcome::Exited => self.exited += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Moved,
    Respawned { compacted: bool },
    Exited,
}

/// Everything one particle update needs, resolved once per pass.
struct PassContext<'a> {
    field: &'a FieldTexture,
    params: AdvectionParams,
    codec: SpeedCodec,
    max_magnitude: f64,
    spawn: FieldRect,
    margin: DVec2,
    step: f64,
    wraps: bool,
    frame_seed: u64,
}

impl<'a> PassContext<'a> {
    fn new(
        field: &'a FieldTexture,
        viewport: &ViewportMapper,
        params: AdvectionParams,
        frame_seed: u64,
    ) -> Self {
        let meta = field.metadata();
        let extent = viewport
            .field_rect(meta)
            .map(|r| r.size().abs())
            .unwrap_or(DVec2::ONE);
        let step = effective_speed(params.speed_factor, viewport.span_ratio(meta)) * ADVECTION_SCALE;
        Self {
            field,
            params,
            codec: field.speed_codec(),
            max_magnitude: field.max_magnitude(),
            spawn: viewport.spawn_rect(meta),
            margin: extent * params.compact_margin,
            step,
            wraps: meta.is_global(),
            frame_seed,
        }
    }

    /// Computes the next position and speed texels for particle `index`.
    fn advect(&self, index: usize, position: Texel) -> (Texel, Texel, Outcome) {
        let p = decode_position(position);
        let v = self.field.sample(p, self.params.sampling);
        let mut rng = Xorshift64::for_particle(self.frame_seed, index);

        let compact_draw = rng.next_f64() < self.params.drop_compacted_rate;
        let compacted = compact_draw && self.is_compact(p, v);
        let speed_t = self.speed_t(v);
        let drop_draw =
            rng.next_f64() < self.params.drop_rate + self.params.drop_rate_bump * speed_t;

        if compacted || drop_draw {
            let spawned = self.spawn_point(&mut rng);
            return (
                encode_position(spawned),
                ZERO_SPEED,
                Outcome::Respawned { compacted },
            );
        }

        let mut next = p + DVec2::new(v.x, -v.y) * self.step;
        if self.wraps {
            next.x = next.x.rem_euclid(1.0);
        }
        if !(0.0..=1.0).contains(&next.x) || !(0.0..=1.0).contains(&next.y) {
            let spawned = self.spawn_point(&mut rng);
            return (encode_position(spawned), ZERO_SPEED, Outcome::Exited);
        }
        (encode_position(next), self.codec.encode(v), Outcome::Moved)
    }

    /// Largest neighbor difference, relative to the field's magnitude range,
    /// is below the compact threshold.
    fn is_compact(&self, p: DVec2, v: DVec2) -> bool {
        let mx = DVec2::new(self.margin.x, 0.0);
        let my = DVec2::new(0.0, self.margin.y);
        let spread = [p + mx, p - mx, p + my, p - my]
            .into_iter()
            .map(|q| (self.field.sample(q, self.params.sampling) - v).length())
            .fold(0.0_f64, f64::max);
        let normalized = if self.max_magnitude > 0.0 {
            spread / self.max_magnitude
        } else {
            0.0
        };
        normalized < self.params.compact_threshold
    }

    fn speed_t(&self, v: DVec2) -> f64 {
        if self.max_magnitude > 0.0 {
            (v.length() / self.max_magnitude).min(1.0)
        } else {
            0.0
        }
    }

    fn spawn_point(&self, rng: &mut Xorshift64) -> DVec2 {
        let tx = rng.next_f64();
        let ty = rng.next_f64();
        self.spawn.point_at(DVec2::new(tx, ty))
    }
}

/// `speed_factor * span_ratio`, clamped to the sane range.
pub fn effective_speed(speed_factor: f64, span_ratio: f64) -> f64 {
    let s = speed_factor * span_ratio;
    if s.is_nan() {
        return MIN_EFFECTIVE_SPEED;
    }
    s.clamp(MIN_EFFECTIVE_SPEED, MAX_EFFECTIVE_SPEED)
}

/// Moves particles through the bound field one frame at a time.
#[derive(Debug, Clone, Default)]
pub struct AdvectionStage {
    params: AdvectionParams,
}

impl AdvectionStage {
    pub fn new(params: AdvectionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AdvectionParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut AdvectionParams {
        &mut self.params
    }

    /// Writes the next generation from the current one, then swaps.
    pub fn step(
        &self,
        store: &mut ParticleStore,
        field: &FieldTexture,
        viewport: &ViewportMapper,
        frame_seed: u64,
    ) -> AdvectionStats {
        run_pass(store, field, viewport, self.params, frame_seed)
    }

    /// One pass with every particle forced to respawn inside the viewport.
    ///
    /// The configured drop rate is untouched.
    pub fn respawn_all(
        &self,
        store: &mut ParticleStore,
        field: &FieldTexture,
        viewport: &ViewportMapper,
        frame_seed: u64,
    ) -> AdvectionStats {
        let params = AdvectionParams {
            drop_rate: 1.0,
            ..self.params
        };
        run_pass(store, field, viewport, params, frame_seed)
    }
}

fn run_pass(
    store: &mut ParticleStore,
    field: &FieldTexture,
    viewport: &ViewportMapper,
    params: AdvectionParams,
    frame_seed: u64,
) -> AdvectionStats {
    let ctx = PassContext::new(field, viewport, params, frame_seed);
    let mut stats = AdvectionStats::default();
    {
        let (current, next) = store.split_mut();
        let outputs = current
            .iter()
            .zip(next.positions.iter_mut())
            .zip(next.speeds.iter_mut())
            .enumerate();
        for (index, ((&position, next_position), next_speed)) in outputs {
            let (p, s, outcome) = ctx.advect(index, position);
            *next_position = p;
            *next_speed = s;
            stats.record(outcome);
        }
    }
    store.swap();
    stats
}
