//! 16-bit fixed-point codecs for packed particle state.
//!
//! Each particle occupies one RGBA8 texel per quantity. The two axes are
//! quantized to 16 bits and split across the texel as
//! `[x_lo, y_lo, x_hi, y_hi]`.
//!
//! - Positions live in [0, 1] and map linearly onto `0..=65535`.
//! - Speeds live in `[-scale, scale]` and use offset binary around 32768, so
//!   a zero speed is exactly representable and decodes to exactly zero.

use glam::DVec2;

/// Largest 16-bit code.
const CODE_MAX: f64 = 65535.0;
/// Code that represents a zero speed.
const SPEED_ZERO_CODE: i32 = 32768;
/// Codes available on either side of zero.
const SPEED_HALF_RANGE: f64 = 32767.0;

/// One position quantization step.
pub const POSITION_QUANTUM: f64 = 1.0 / CODE_MAX;

/// Packed texel for a zero speed.
pub const ZERO_SPEED: [u8; 4] = [0x00, 0x00, 0x80, 0x80];

/// Splits two 16-bit codes into the texel byte layout.
pub fn pack(x: u16, y: u16) -> [u8; 4] {
    let [x_lo, x_hi] = x.to_le_bytes();
    let [y_lo, y_hi] = y.to_le_bytes();
    [x_lo, y_lo, x_hi, y_hi]
}

/// Inverse of [`pack`].
pub fn unpack(texel: [u8; 4]) -> (u16, u16) {
    (
        u16::from_le_bytes([texel[0], texel[2]]),
        u16::from_le_bytes([texel[1], texel[3]]),
    )
}

/// Quantizes a value in [0, 1]. Out-of-range input is clamped, NaN maps to 0.
pub fn encode_unit(v: f64) -> u16 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * CODE_MAX).round() as u16
}

pub fn decode_unit(code: u16) -> f64 {
    code as f64 / CODE_MAX
}

/// Packs a normalized position.
pub fn encode_position(p: DVec2) -> [u8; 4] {
    pack(encode_unit(p.x), encode_unit(p.y))
}

/// Unpacks a normalized position.
pub fn decode_position(texel: [u8; 4]) -> DVec2 {
    let (x, y) = unpack(texel);
    DVec2::new(decode_unit(x), decode_unit(y))
}

/// Speed codec for a given symmetric range.
///
/// The scale is the bound field's largest possible magnitude; a scale of
/// zero (a field that is zero everywhere) encodes every speed as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedCodec {
    scale: f64,
}

impl SpeedCodec {
    /// Non-finite or negative scales collapse to zero.
    pub fn new(scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            0.0
        };
        Self { scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Decoding resolution: one code step in speed units.
    pub fn quantum(&self) -> f64 {
        self.scale / SPEED_HALF_RANGE
    }

    pub fn encode(&self, speed: DVec2) -> [u8; 4] {
        pack(self.encode_axis(speed.x), self.encode_axis(speed.y))
    }

    pub fn decode(&self, texel: [u8; 4]) -> DVec2 {
        let (x, y) = unpack(texel);
        DVec2::new(self.decode_axis(x), self.decode_axis(y))
    }

    fn encode_axis(&self, s: f64) -> u16 {
        if self.scale == 0.0 || s.is_nan() {
            return SPEED_ZERO_CODE as u16;
        }
        let t = (s / self.scale).clamp(-1.0, 1.0);
        (SPEED_ZERO_CODE + (t * SPEED_HALF_RANGE).round() as i32) as u16
    }

    fn decode_axis(&self, code: u16) -> f64 {
        (code as i32 - SPEED_ZERO_CODE) as f64 / SPEED_HALF_RANGE * self.scale
    }
}
