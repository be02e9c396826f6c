//! Deterministic random streams for particle seeding and respawn draws.
//!
//! The engine keeps one frame-level [`Xorshift64`] and derives an
//! independent per-particle stream each frame with [`Xorshift64::for_particle`].
//! A particle's draws depend only on `(frame_seed, index)`, so the advection
//! pass produces the same result in any iteration order.

use serde::{Deserialize, Serialize};

/// Xorshift64 deterministic PRNG. Same seed always produces the same sequence.
///
/// Uses the standard shift parameters (13, 7, 17). Seed 0 is replaced with
/// a non-zero fallback to avoid the all-zeros fixed point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    const FALLBACK_SEED: u64 = 0x5EED_DEAD_BEEF_CAFE;

    /// Creates a new PRNG with the given seed (0 is remapped).
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { Self::FALLBACK_SEED } else { seed },
        }
    }

    /// Stream for one particle in one frame.
    ///
    /// The pair is mixed through SplitMix64 so neighbouring indices and
    /// consecutive frame seeds give uncorrelated streams.
    pub fn for_particle(frame_seed: u64, index: usize) -> Self {
        Self::new(splitmix64(
            frame_seed ^ splitmix64((index as u64).wrapping_add(0x9E37_79B9_7F4A_7C15)),
        ))
    }

    /// Advances the state and returns the next 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform f64 in [0, 1) from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform f64 in [min, max).
    pub fn next_range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }

    /// Fills `buf` with uniformly random bytes.
    pub fn fill_bytes(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

/// SplitMix64 finalizer.
fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_u64_produces_known_golden_value_for_seed_42() {
        // xorshift64(seed=42, shifts=13,7,17). Changing this breaks every
        // reproducible frame sequence.
        let mut rng = Xorshift64::new(42);
        assert_eq!(rng.next_u64(), 45_454_805_674);
    }

    #[test]
    fn seed_zero_does_not_produce_all_zeros() {
        let mut rng = Xorshift64::new(0);
        assert_ne!(rng.next_u64(), 0);
        assert_ne!(rng.next_u64(), 0);
    }

    #[test]
    fn two_instances_with_same_seed_produce_identical_sequences() {
        let mut a = Xorshift64::new(42);
        let mut b = Xorshift64::new(42);
        for i in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64(), "diverged at index {i}");
        }
    }

    #[test]
    fn particle_streams_are_reproducible() {
        let mut a = Xorshift64::for_particle(1234, 77);
        let mut b = Xorshift64::for_particle(1234, 77);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn particle_streams_differ_by_index_and_frame() {
        let first = |frame, index| Xorshift64::for_particle(frame, index).next_u64();
        assert_ne!(first(1, 0), first(1, 1));
        assert_ne!(first(1, 0), first(2, 0));
        assert_ne!(first(0, 0), first(0, 1));
    }

    #[test]
    fn fill_bytes_handles_partial_chunks() {
        let mut rng = Xorshift64::new(9);
        let mut buf = [0u8; 13];
        rng.fill_bytes(&mut buf);
        assert!(buf.iter().any(|&b| b != 0));

        let mut again = Xorshift64::new(9);
        let mut buf2 = [0u8; 13];
        again.fill_bytes(&mut buf2);
        assert_eq!(buf, buf2);
    }

    #[test]
    fn next_range_stays_within_specified_bounds() {
        let mut rng = Xorshift64::new(9999);
        for i in 0..10_000 {
            let v = rng.next_range(0.25, 0.75);
            assert!((0.25..0.75).contains(&v), "{v} out of bounds at {i}");
        }
    }

    #[test]
    fn serialization_roundtrip_preserves_state() {
        let mut rng = Xorshift64::new(42);
        for _ in 0..50 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: Xorshift64 = serde_json::from_str(&json).unwrap();
        for i in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64(), "diverged at {i}");
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn next_f64_in_unit_interval_for_any_particle(seed: u64, index in 0_usize..1_000_000) {
                let mut rng = Xorshift64::for_particle(seed, index);
                for _ in 0..32 {
                    let v = rng.next_f64();
                    prop_assert!((0.0..1.0).contains(&v), "{v} out of [0, 1)");
                }
            }

            #[test]
            fn particle_stream_mean_is_near_one_half(seed: u64) {
                let n = 4000;
                let sum: f64 = (0..n)
                    .map(|i| Xorshift64::for_particle(seed, i).next_f64())
                    .sum();
                let mean = sum / n as f64;
                prop_assert!((mean - 0.5).abs() < 0.05, "mean {mean} for seed {seed}");
            }
        }
    }
}
