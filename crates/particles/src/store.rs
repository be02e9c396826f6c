//! Double-buffered particle state.
//!
//! Particles are implicit: particle `i` is texel `i` of a square grid. Each
//! generation holds one packed position texel and one packed speed texel per
//! particle (see `drift_core::codec`). Two generations of each are kept in
//! [`PingPong`] pairs; advection reads the current one and writes the next.

use drift_core::codec::{decode_position, ZERO_SPEED};
use drift_core::{PingPong, SpeedCodec, Xorshift64};
use glam::DVec2;

/// One packed RGBA8 texel.
pub type Texel = [u8; 4];

/// Write access to the next generation.
pub struct NextGeneration<'a> {
    pub positions: &'a mut [Texel],
    pub speeds: &'a mut [Texel],
}

/// Owns both generations of particle positions and speeds.
#[derive(Debug, Clone, Default)]
pub struct ParticleStore {
    resolution: usize,
    positions: PingPong<Vec<Texel>>,
    speeds: PingPong<Vec<Texel>>,
}

impl ParticleStore {
    /// An empty store; call [`allocate`](Self::allocate) before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the store for at least `count` particles and randomizes it.
    ///
    /// The grid is the smallest square holding `count` (minimum one
    /// particle), so the effective count `resolution²` may exceed the request.
    /// Returns the effective count.
    pub fn allocate(&mut self, count: usize, rng: &mut Xorshift64) -> usize {
        let resolution = grid_resolution(count.max(1));
        let n = resolution * resolution;
        self.resolution = resolution;
        self.positions = PingPong::new(vec![[0; 4]; n], vec![[0; 4]; n]);
        self.speeds = PingPong::new(vec![ZERO_SPEED; n], vec![ZERO_SPEED; n]);
        self.reset_all(rng);
        log::info!("allocated {n} particles ({resolution}x{resolution} grid, requested {count})");
        n
    }

    /// Re-randomizes every position in both generations and zeroes speeds,
    /// keeping the current size.
    pub fn reset_all(&mut self, rng: &mut Xorshift64) {
        for generation in self.positions.both_mut() {
            for texel in generation.iter_mut() {
                rng.fill_bytes(texel);
            }
        }
        for generation in self.speeds.both_mut() {
            generation.fill(ZERO_SPEED);
        }
    }

    /// Zeroes the speeds of both generations, leaving positions alone.
    pub fn zero_speeds(&mut self) {
        for generation in self.speeds.both_mut() {
            generation.fill(ZERO_SPEED);
        }
    }

    /// Makes the next generation current. Exchanges indices only.
    pub fn swap(&mut self) {
        self.positions.swap();
        self.speeds.swap();
    }

    /// Side length of the particle grid.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.resolution * self.resolution
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current-generation packed positions.
    pub fn positions(&self) -> &[Texel] {
        self.positions.current()
    }

    /// Current-generation packed speeds.
    pub fn speeds(&self) -> &[Texel] {
        self.speeds.current()
    }

    /// Decoded current position of particle `index`.
    pub fn position(&self, index: usize) -> Option<DVec2> {
        self.positions().get(index).copied().map(decode_position)
    }

    /// Decoded current speed of particle `index`.
    pub fn speed(&self, index: usize, codec: &SpeedCodec) -> Option<DVec2> {
        self.speeds().get(index).map(|&t| codec.decode(t))
    }

    /// Current positions for reading, next generation for writing.
    pub fn split_mut(&mut self) -> (&[Texel], NextGeneration<'_>) {
        let (current, next_positions) = self.positions.split();
        let next = NextGeneration {
            positions: next_positions,
            speeds: self.speeds.next_mut(),
        };
        (current, next)
    }
}

/// Smallest `r` with `r * r >= count`.
fn grid_resolution(count: usize) -> usize {
    let mut r = (count as f64).sqrt() as usize;
    while r * r < count {
        r += 1;
    }
    while r > 1 && (r - 1) * (r - 1) >= count {
        r -= 1;
    }
    r
}
