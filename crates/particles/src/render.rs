//! Point rendering and trail accumulation.
//!
//! Each particle is projected `particle space -> geographic -> Web-Mercator ->
//! projection matrix -> NDC -> pixel` and drawn as one opaque pixel colored
//! by its normalized speed.
//!
//! With trails, two accumulation frames alternate: the *background* (last
//! frame's image) is faded into the *screen*, particles are drawn on top,
//! the screen is composited onto the caller's target, and the two swap.

use crate::store::ParticleStore;
use drift_core::viewport::geo_to_mercator;
use drift_core::{ColorRamp, EngineError, FieldTexture, Frame, NormalizedBounds, PingPong};
use glam::{DMat4, DVec2, DVec4, Mat4};

/// What a draw call reads: the current particle generation and its field.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    pub store: &'a ParticleStore,
    pub field: &'a FieldTexture,
    /// Mercator viewport box; particles outside it are not drawn.
    pub viewport: Option<NormalizedBounds>,
}

/// Projects a normalized Mercator point to pixel coordinates.
///
/// Returns `None` behind the camera (`w <= 0`) or outside the clip volume.
pub fn project_to_pixel(
    matrix: &DMat4,
    mercator: DVec2,
    width: usize,
    height: usize,
) -> Option<(usize, usize)> {
    let clip = *matrix * DVec4::new(mercator.x, mercator.y, 0.0, 1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc_x = clip.x / clip.w;
    let ndc_y = clip.y / clip.w;
    if !(-1.0..=1.0).contains(&ndc_x) || !(-1.0..=1.0).contains(&ndc_y) {
        return None;
    }
    let px = ((ndc_x + 1.0) / 2.0 * width as f64).floor() as usize;
    let py = ((1.0 - ndc_y) / 2.0 * height as f64).floor() as usize;
    Some((px.min(width - 1), py.min(height - 1)))
}

/// Draws particles and owns the trail accumulation frames.
#[derive(Debug, Clone)]
pub struct RenderStage {
    frames: PingPong<Frame>,
    fade_opacity: f64,
    trails: bool,
    ramp: ColorRamp,
}

impl RenderStage {
    /// Creates empty accumulation frames of the given size.
    pub fn new(
        width: usize,
        height: usize,
        ramp: ColorRamp,
        fade_opacity: f64,
        trails: bool,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            frames: PingPong::new(Frame::new(width, height)?, Frame::new(width, height)?),
            fade_opacity,
            trails,
            ramp,
        })
    }

    pub fn width(&self) -> usize {
        self.frames.current().width()
    }

    pub fn height(&self) -> usize {
        self.frames.current().height()
    }

    /// Last frame's accumulated image.
    pub fn background(&self) -> &Frame {
        self.frames.current()
    }

    pub fn ramp(&self) -> &ColorRamp {
        &self.ramp
    }

    pub fn set_ramp(&mut self, ramp: ColorRamp) {
        self.ramp = ramp;
    }

    pub fn fade_opacity(&self) -> f64 {
        self.fade_opacity
    }

    pub fn set_fade_opacity(&mut self, fade_opacity: f64) {
        self.fade_opacity = fade_opacity;
    }

    pub fn trails_enabled(&self) -> bool {
        self.trails
    }

    /// Switches trail mode. A flip clears both accumulation frames so stale
    /// trails do not reappear; returns whether the mode changed.
    pub fn set_trails(&mut self, enabled: bool) -> bool {
        if self.trails == enabled {
            return false;
        }
        self.trails = enabled;
        self.clear_background();
        log::debug!("trails {}", if enabled { "enabled" } else { "disabled" });
        true
    }

    /// Replaces both accumulation frames with empty ones of the new size.
    ///
    /// On error the existing frames are left unchanged.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<(), EngineError> {
        let first = Frame::new(width, height)?;
        let second = Frame::new(width, height)?;
        self.frames = PingPong::new(first, second);
        Ok(())
    }

    /// Empties both accumulation frames.
    pub fn clear_background(&mut self) {
        for frame in self.frames.both_mut() {
            frame.clear();
        }
    }

    /// Draws the scene into `target` and returns the number of points drawn.
    ///
    /// `accumulate` enables trail compositing for this frame; it is ignored
    /// when trails are disabled. `target` must match the stage's size.
    pub fn draw(
        &mut self,
        target: &mut Frame,
        scene: Scene<'_>,
        matrix: &Mat4,
        accumulate: bool,
    ) -> Result<usize, EngineError> {
        if target.width() != self.width() || target.height() != self.height() {
            return Err(EngineError::BufferSizeMismatch {
                expected: self.width() * self.height() * 4,
                got: target.pixels().len(),
            });
        }
        let matrix = matrix.as_dmat4();
        if !(self.trails && accumulate) {
            return Ok(draw_points(target, &self.ramp, scene, &matrix));
        }

        let (background, screen) = self.frames.split();
        screen.copy_from(background)?;
        screen.fade(self.fade_opacity);
        let drawn = draw_points(screen, &self.ramp, scene, &matrix);
        target.composite_over(screen)?;
        self.frames.swap();
        Ok(drawn)
    }
}

fn draw_points(frame: &mut Frame, ramp: &ColorRamp, scene: Scene<'_>, matrix: &DMat4) -> usize {
    let meta = scene.field.metadata();
    let codec = scene.field.speed_codec();
    let max_magnitude = scene.field.max_magnitude();
    let (width, height) = (frame.width(), frame.height());
    let mut drawn = 0;
    for (i, &speed) in scene.store.speeds().iter().enumerate() {
        let Some(p) = scene.store.position(i) else {
            continue;
        };
        let mercator = geo_to_mercator(meta.to_geo(p));
        if scene.viewport.is_some_and(|b| !b.contains(mercator)) {
            continue;
        }
        let Some((x, y)) = project_to_pixel(matrix, mercator, width, height) else {
            continue;
        };
        let t = if max_magnitude > 0.0 {
            codec.decode(speed).length() / max_magnitude
        } else {
            0.0
        };
        frame.blend_pixel(x, y, ramp.lookup(t));
        drawn += 1;
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::codec::encode_position;
    use drift_core::synthetic::{rasterize, UniformFlow};
    use drift_core::{FieldMetadata, GeoBounds, Xorshift64};
    use glam::Vec3;

    /// Maps the Mercator unit square straight onto the frame.
    fn mercator_to_screen() -> Mat4 {
        Mat4::from_translation(Vec3::new(-1.0, 1.0, 0.0)) * Mat4::from_scale(Vec3::new(2.0, -2.0, 1.0))
    }

    fn world_field(speed: f64) -> FieldTexture {
        let meta = FieldMetadata::new(36, 18, (0.0, speed), (0.0, 0.0)).with_geo(-180.0, -90.0, 10.0, 10.0);
        rasterize(&UniformFlow::new(speed, 0.0), meta).unwrap()
    }

    /// A one-particle store at particle-space `p` with speed `speed` texel.
    fn single(p: DVec2, speed: [u8; 4]) -> ParticleStore {
        let mut s = ParticleStore::new();
        s.allocate(1, &mut Xorshift64::new(1));
        {
            let (_, next) = s.split_mut();
            next.positions[0] = encode_position(p);
            next.speeds[0] = speed;
        }
        s.swap();
        s
    }

    fn stage(trails: bool) -> RenderStage {
        RenderStage::new(100, 100, ColorRamp::default_wind(), 0.5, trails).unwrap()
    }

    // -- Projection --

    #[test]
    fn project_maps_unit_square_to_pixels() {
        let m = mercator_to_screen().as_dmat4();
        assert_eq!(project_to_pixel(&m, DVec2::new(0.5, 0.5), 100, 50), Some((50, 25)));
        assert_eq!(project_to_pixel(&m, DVec2::new(0.0, 0.0), 100, 50), Some((0, 0)));
        assert_eq!(project_to_pixel(&m, DVec2::new(1.0, 1.0), 100, 50), Some((99, 49)));
    }

    #[test]
    fn project_rejects_clipped_and_behind_camera() {
        let m = mercator_to_screen().as_dmat4();
        assert_eq!(project_to_pixel(&m, DVec2::new(1.5, 0.5), 100, 100), None);
        assert_eq!(project_to_pixel(&DMat4::ZERO, DVec2::new(0.5, 0.5), 100, 100), None);
    }

    // -- Point drawing --

    #[test]
    fn draws_particle_at_projected_pixel_with_ramp_color() {
        let field = world_field(2.0);
        let codec = field.speed_codec();
        // Equator, prime meridian: Mercator (0.5, 0.5).
        let store = single(DVec2::new(0.5, 0.5), codec.encode(DVec2::new(2.0, 0.0)));
        let mut target = Frame::new(100, 100).unwrap();
        let scene = Scene {
            store: &store,
            field: &field,
            viewport: None,
        };
        let drawn = stage(false)
            .draw(&mut target, scene, &mercator_to_screen(), true)
            .unwrap();
        assert_eq!(drawn, 1);
        let expected = ColorRamp::default_wind().lookup(1.0);
        assert_eq!(target.pixel(50, 50), Some(expected));
    }

    #[test]
    fn zero_speed_uses_first_ramp_color() {
        let field = world_field(2.0);
        let store = single(DVec2::new(0.5, 0.5), drift_core::codec::ZERO_SPEED);
        let mut target = Frame::new(100, 100).unwrap();
        let scene = Scene {
            store: &store,
            field: &field,
            viewport: None,
        };
        stage(false)
            .draw(&mut target, scene, &mercator_to_screen(), false)
            .unwrap();
        assert_eq!(target.pixel(50, 50), Some(ColorRamp::default_wind().lookup(0.0)));
    }

    #[test]
    fn particles_outside_viewport_are_skipped() {
        let field = world_field(1.0);
        let store = single(DVec2::new(0.5, 0.5), drift_core::codec::ZERO_SPEED);
        let viewport = NormalizedBounds::from_geo(&GeoBounds::new(10.0, 10.0, 20.0, 20.0));
        let mut target = Frame::new(100, 100).unwrap();
        let scene = Scene {
            store: &store,
            field: &field,
            viewport: Some(viewport),
        };
        let drawn = stage(false)
            .draw(&mut target, scene, &mercator_to_screen(), false)
            .unwrap();
        assert_eq!(drawn, 0);
        assert!(target.is_clear());
    }

    #[test]
    fn target_size_must_match() {
        let field = world_field(1.0);
        let store = single(DVec2::new(0.5, 0.5), drift_core::codec::ZERO_SPEED);
        let mut target = Frame::new(10, 10).unwrap();
        let scene = Scene {
            store: &store,
            field: &field,
            viewport: None,
        };
        assert!(matches!(
            stage(false).draw(&mut target, scene, &mercator_to_screen(), false),
            Err(EngineError::BufferSizeMismatch { .. })
        ));
    }

    // -- Trails --

    #[test]
    fn trails_fade_previous_points() {
        let field = world_field(1.0);
        let mut st = stage(true);
        let m = mercator_to_screen();

        let first = single(DVec2::new(0.255, 0.505), drift_core::codec::ZERO_SPEED);
        let mut target = Frame::new(100, 100).unwrap();
        let scene = Scene {
            store: &first,
            field: &field,
            viewport: None,
        };
        st.draw(&mut target, scene, &m, true).unwrap();
        let color = ColorRamp::default_wind().lookup(0.0);
        assert_eq!(st.background().pixel(25, 50), Some(color));

        let second = single(DVec2::new(0.755, 0.505), drift_core::codec::ZERO_SPEED);
        let mut target = Frame::new(100, 100).unwrap();
        let scene = Scene {
            store: &second,
            field: &field,
            viewport: None,
        };
        st.draw(&mut target, scene, &m, true).unwrap();
        let faded = color.map(|c| (c as f64 * 0.5).floor() as u8);
        assert_eq!(target.pixel(25, 50), Some(faded), "old point fades");
        assert_eq!(target.pixel(75, 50), Some(color), "new point at full opacity");
    }

    #[test]
    fn trails_skip_accumulation_while_not_settled() {
        let field = world_field(1.0);
        let mut st = stage(true);
        let store = single(DVec2::new(0.25, 0.5), drift_core::codec::ZERO_SPEED);
        let mut target = Frame::new(100, 100).unwrap();
        let scene = Scene {
            store: &store,
            field: &field,
            viewport: None,
        };
        st.draw(&mut target, scene, &mercator_to_screen(), false).unwrap();
        assert!(st.background().is_clear());
        assert!(!target.is_clear());
    }

    #[test]
    fn flipping_trails_clears_accumulation() {
        let field = world_field(1.0);
        let mut st = stage(true);
        let store = single(DVec2::new(0.25, 0.5), drift_core::codec::ZERO_SPEED);
        let mut target = Frame::new(100, 100).unwrap();
        let scene = Scene {
            store: &store,
            field: &field,
            viewport: None,
        };
        st.draw(&mut target, scene, &mercator_to_screen(), true).unwrap();
        assert!(!st.background().is_clear());
        assert!(!st.set_trails(true), "no flip, nothing to do");
        assert!(st.trails_enabled());
        assert!(!st.background().is_clear());
        assert!(st.set_trails(false));
        assert!(!st.trails_enabled());
        assert!(st.background().is_clear());
    }

    // -- Resize --

    #[test]
    fn resize_replaces_frames_and_rejects_zero() {
        let mut st = stage(true);
        st.resize(64, 32).unwrap();
        assert_eq!((st.width(), st.height()), (64, 32));
        assert!(st.background().is_clear());
        assert!(matches!(
            st.resize(0, 32),
            Err(EngineError::InvalidDimensions { .. })
        ));
        assert_eq!((st.width(), st.height()), (64, 32));
    }
}
