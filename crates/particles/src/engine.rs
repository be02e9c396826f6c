//! The public engine: one field, one viewport, one particle population.
//!
//! `FlowEngine` owns every stage and exposes the operations a map layer
//! calls: binding field data, following the viewport, resizing, resetting,
//! and drawing one frame at a time. All calls are synchronous and
//! single-threaded; the caller drives `draw` from its repaint callback.

use crate::advection::{AdvectionStage, AdvectionStats};
use crate::config::{validate_num_particles, FlowConfig, MAX_SPEED_FACTOR, MIN_SPEED_FACTOR};
use crate::render::{RenderStage, Scene};
use crate::settle::SettleTracker;
use crate::store::ParticleStore;
use drift_core::params::check_range;
use drift_core::{
    ColorRamp, ColorStop, EngineError, FieldMetadata, FieldTexture, Frame, GeoBounds,
    ViewportMapper, Xorshift64,
};
use glam::Mat4;
use std::time::Duration;

/// Result of one [`FlowEngine::draw`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// No field is bound yet; nothing was drawn or advanced.
    Skipped,
    Drawn {
        /// Points that landed on screen.
        drawn: usize,
        stats: AdvectionStats,
    },
}

pub struct FlowEngine {
    config: FlowConfig,
    store: ParticleStore,
    advection: AdvectionStage,
    render: RenderStage,
    viewport: ViewportMapper,
    field: Option<FieldTexture>,
    settle: SettleTracker,
    rng: Xorshift64,
}

impl FlowEngine {
    /// Creates an engine with a `width` x `height` accumulation area.
    ///
    /// Any invalid setting is reported as `EngineError::Initialization`; the
    /// engine never starts in a partially configured state.
    pub fn new(width: usize, height: usize, config: FlowConfig) -> Result<Self, EngineError> {
        let init = |e: EngineError| EngineError::Initialization(e.to_string());
        let config = config.validated().map_err(init)?;
        let ramp = ColorRamp::from_name(&config.color_ramp).map_err(init)?;
        let render = RenderStage::new(
            width,
            height,
            ramp,
            config.fade_opacity,
            config.enable_trails,
        )
        .map_err(init)?;
        let mut rng = Xorshift64::new(config.seed);
        let mut store = ParticleStore::new();
        store.allocate(config.num_particles, &mut rng);
        Ok(Self {
            advection: AdvectionStage::new(config.advection_params()),
            config,
            store,
            render,
            viewport: ViewportMapper::new(),
            field: None,
            settle: SettleTracker::default(),
            rng,
        })
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn field(&self) -> Option<&FieldTexture> {
        self.field.as_ref()
    }

    pub fn viewport(&self) -> &ViewportMapper {
        &self.viewport
    }

    pub fn settle(&self) -> &SettleTracker {
        &self.settle
    }

    /// The trail accumulation image from the last frame.
    pub fn background(&self) -> &Frame {
        self.render.background()
    }

    pub fn ramp(&self) -> &ColorRamp {
        self.render.ramp()
    }

    /// Effective particle count (a perfect square).
    pub fn num_particles(&self) -> usize {
        self.store.len()
    }

    pub fn width(&self) -> usize {
        self.render.width()
    }

    pub fn height(&self) -> usize {
        self.render.height()
    }

    // -- Field and viewport --

    /// Binds new field data from a raw RGBA8 buffer and its metadata.
    ///
    /// The previous field stays bound if the new one is rejected.
    pub fn bind_field(&mut self, data: Vec<u8>, metadata: FieldMetadata) -> Result<(), EngineError> {
        let texture = FieldTexture::new(data, metadata)?;
        self.bind_texture(texture);
        Ok(())
    }

    /// Binds an already-validated field, replacing the previous one whole.
    pub fn bind_texture(&mut self, texture: FieldTexture) {
        let meta = texture.metadata();
        log::info!(
            "bound {}x{} field, u [{}, {}], v [{}, {}]",
            meta.width,
            meta.height,
            meta.u_min,
            meta.u_max,
            meta.v_min,
            meta.v_max
        );
        self.field = Some(texture);
        if !self.soft_reset() {
            // Stored speeds were encoded against the previous field's scale.
            self.store.zero_speeds();
        }
    }

    /// Follows the map to a new visible box `[minLng, minLat, maxLng, maxLat]`.
    ///
    /// Clears the trails and re-seeds every particle inside the new box. On
    /// `InvalidBounds` nothing changes.
    pub fn set_viewport_bounds(&mut self, bounds: [f64; 4]) -> Result<(), EngineError> {
        let normalized = self.viewport.set_bounds(GeoBounds::from_array(bounds))?;
        log::debug!("viewport {bounds:?} -> mercator {normalized:?}");
        self.render.clear_background();
        self.soft_reset();
        Ok(())
    }

    /// Resizes the accumulation area and restarts the particles from the
    /// configured seed, re-applying the current viewport.
    ///
    /// On `InvalidDimensions` nothing changes.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<(), EngineError> {
        self.render.resize(width, height)?;
        log::debug!("resized to {width}x{height}");
        self.rng = Xorshift64::new(self.config.seed);
        self.hard_reset();
        self.soft_reset();
        Ok(())
    }

    pub fn clear_background(&mut self) {
        self.render.clear_background();
    }

    /// `force` re-randomizes every particle over the whole field and clears
    /// the trails. Otherwise particles are re-seeded inside the viewport,
    /// falling back to the forced reset when no field or viewport is set.
    /// Trails are cleared either way.
    pub fn reset_particles(&mut self, force: bool) {
        self.render.clear_background();
        if force || !self.soft_reset() {
            self.hard_reset();
        }
    }

    // -- Frame --

    /// Draws the current particles into `target`, then advances them one step.
    ///
    /// Returns `Skipped` without touching anything while no field is bound.
    /// `target` must match the engine's size.
    pub fn draw(&mut self, target: &mut Frame, matrix: &Mat4) -> Result<DrawOutcome, EngineError> {
        let Some(field) = self.field.as_ref() else {
            return Ok(DrawOutcome::Skipped);
        };
        let scene = Scene {
            store: &self.store,
            field,
            viewport: self.viewport.normalized(),
        };
        let drawn = self
            .render
            .draw(target, scene, matrix, self.settle.is_settled())?;
        let frame_seed = self.rng.next_u64();
        let stats = self
            .advection
            .step(&mut self.store, field, &self.viewport, frame_seed);
        Ok(DrawOutcome::Drawn { drawn, stats })
    }

    // -- Color --

    /// Replaces the speed ramp with custom stops.
    pub fn set_color_ramp(&mut self, stops: Vec<ColorStop>) -> Result<(), EngineError> {
        self.render.set_ramp(ColorRamp::new(stops)?);
        Ok(())
    }

    /// Switches to a built-in ramp.
    pub fn set_color_ramp_by_name(&mut self, name: &str) -> Result<(), EngineError> {
        self.render.set_ramp(ColorRamp::from_name(name)?);
        self.config.color_ramp = name.to_owned();
        Ok(())
    }

    // -- Configuration --

    /// Reallocates for at least `n` particles, clears the trails and
    /// re-seeds inside the viewport when possible.
    pub fn set_num_particles(&mut self, n: usize) -> Result<(), EngineError> {
        self.config.num_particles = validate_num_particles(n)?;
        self.store.allocate(n, &mut self.rng);
        self.render.clear_background();
        self.soft_reset();
        Ok(())
    }

    pub fn set_speed_factor(&mut self, v: f64) -> Result<(), EngineError> {
        self.config.speed_factor =
            check_range("speedFactor", v, MIN_SPEED_FACTOR, MAX_SPEED_FACTOR)?;
        self.sync_advection();
        Ok(())
    }

    pub fn set_drop_rate(&mut self, v: f64) -> Result<(), EngineError> {
        self.config.drop_rate = check_range("dropRate", v, 0.0, 1.0)?;
        self.sync_advection();
        Ok(())
    }

    pub fn set_drop_rate_bump(&mut self, v: f64) -> Result<(), EngineError> {
        self.config.drop_rate_bump = check_range("dropRateBump", v, 0.0, 1.0)?;
        self.sync_advection();
        Ok(())
    }

    pub fn set_compact_margin(&mut self, v: f64) -> Result<(), EngineError> {
        self.config.compact_margin = check_range("compactMargin", v, 0.0, 1.0)?;
        self.sync_advection();
        Ok(())
    }

    pub fn set_compact_threshold(&mut self, v: f64) -> Result<(), EngineError> {
        self.config.compact_threshold = check_range("compactThreshold", v, 0.0, 1.0)?;
        self.sync_advection();
        Ok(())
    }

    pub fn set_drop_compacted_rate(&mut self, v: f64) -> Result<(), EngineError> {
        self.config.drop_compacted_rate = check_range("dropCompactedRate", v, 0.0, 1.0)?;
        self.sync_advection();
        Ok(())
    }

    pub fn set_bilinear(&mut self, bilinear: bool) {
        self.config.bilinear = bilinear;
        self.sync_advection();
    }

    pub fn set_fade_opacity(&mut self, v: f64) -> Result<(), EngineError> {
        self.config.fade_opacity = check_range("fadeOpacity", v, 0.0, 1.0)?;
        self.render.set_fade_opacity(self.config.fade_opacity);
        Ok(())
    }

    /// Turning trails on or off clears the accumulated image.
    pub fn set_enable_trails(&mut self, enabled: bool) {
        self.config.enable_trails = enabled;
        self.render.set_trails(enabled);
    }

    /// Applies a whole config at once. Nothing changes if it is invalid.
    pub fn apply_config(&mut self, config: FlowConfig) -> Result<(), EngineError> {
        let config = config.validated()?;
        if config.color_ramp != self.config.color_ramp {
            self.render.set_ramp(ColorRamp::from_name(&config.color_ramp)?);
        }
        let realloc = config.num_particles != self.config.num_particles;
        self.render.set_fade_opacity(config.fade_opacity);
        self.render.set_trails(config.enable_trails);
        self.config = config;
        self.sync_advection();
        if realloc {
            self.store.allocate(self.config.num_particles, &mut self.rng);
            self.render.clear_background();
            self.soft_reset();
        }
        Ok(())
    }

    // -- Interaction --

    /// A pan or zoom gesture started: trails pause and the image clears.
    pub fn begin_interaction(&mut self) {
        self.settle.begin_interaction();
        self.render.clear_background();
    }

    pub fn end_interaction(&mut self, now: Duration) {
        self.settle.end_interaction(now);
    }

    /// Advances the settle timer. When the view settles, `bounds` (the map's
    /// current visible box) is applied and `true` is returned.
    pub fn tick(&mut self, now: Duration, bounds: [f64; 4]) -> Result<bool, EngineError> {
        if !self.settle.tick(now) {
            return Ok(false);
        }
        self.set_viewport_bounds(bounds)?;
        Ok(true)
    }

    // -- Internals --

    fn sync_advection(&mut self) {
        *self.advection.params_mut() = self.config.advection_params();
    }

    /// Full re-randomization over the whole field.
    fn hard_reset(&mut self) {
        self.store.reset_all(&mut self.rng);
        self.render.clear_background();
        log::debug!("hard reset of {} particles", self.store.len());
    }

    /// One pass respawning every particle inside the viewport. Returns false
    /// when there is no field or viewport to respawn into.
    fn soft_reset(&mut self) -> bool {
        let Some(field) = self.field.as_ref() else {
            return false;
        };
        if self.viewport.geo_bounds().is_none() {
            return false;
        }
        let frame_seed = self.rng.next_u64();
        let stats = self
            .advection
            .respawn_all(&mut self.store, field, &self.viewport, frame_seed);
        log::debug!("soft reset respawned {} particles", stats.respawned);
        true
    }
}
