//! RGBA8 raster frames used as draw targets and trail accumulation buffers.
//!
//! Pixels are stored row-major with premultiplied alpha, so fading every
//! channel by the same factor is a plain multiply and compositing is
//! `src + dst * (1 - src_alpha)`.

use crate::error::EngineError;

/// A premultiplied RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Frame {
    /// Creates a fully transparent frame.
    ///
    /// Returns `EngineError::InvalidDimensions` if width or height is zero,
    /// or if the byte size would overflow `usize`.
    pub fn new(width: usize, height: usize) -> Result<Self, EngineError> {
        let len = if width == 0 || height == 0 {
            None
        } else {
            width.checked_mul(height).and_then(|n| n.checked_mul(4))
        };
        let len = len.ok_or(EngineError::InvalidDimensions { width, height })?;
        Ok(Self {
            width,
            height,
            pixels: vec![0; len],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw premultiplied RGBA bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Resets every pixel to transparent black.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Whether every pixel is transparent black.
    pub fn is_clear(&self) -> bool {
        self.pixels.iter().all(|&b| b == 0)
    }

    /// Multiplies every channel by `opacity`, truncating toward zero.
    ///
    /// Truncation guarantees a faded trail eventually reaches zero.
    pub fn fade(&mut self, opacity: f64) {
        let opacity = opacity.clamp(0.0, 1.0);
        for c in &mut self.pixels {
            *c = (*c as f64 * opacity).floor() as u8;
        }
    }

    /// Draws `color` over the pixel at `(x, y)`; out-of-range writes are ignored.
    pub fn blend_pixel(&mut self, x: usize, y: usize, color: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y * self.width + x) * 4;
        let dst: &mut [u8] = &mut self.pixels[i..i + 4];
        over(dst, &color);
    }

    /// Composites `src` over this frame.
    ///
    /// Both frames must have the same dimensions.
    pub fn composite_over(&mut self, src: &Frame) -> Result<(), EngineError> {
        if src.width != self.width || src.height != self.height {
            return Err(EngineError::BufferSizeMismatch {
                expected: self.pixels.len(),
                got: src.pixels.len(),
            });
        }
        for (dst, s) in self.pixels.chunks_exact_mut(4).zip(src.pixels.chunks_exact(4)) {
            over(dst, s);
        }
        Ok(())
    }

    /// Overwrites this frame with `src`, which must have the same dimensions.
    pub fn copy_from(&mut self, src: &Frame) -> Result<(), EngineError> {
        if src.width != self.width || src.height != self.height {
            return Err(EngineError::BufferSizeMismatch {
                expected: self.pixels.len(),
                got: src.pixels.len(),
            });
        }
        self.pixels.copy_from_slice(&src.pixels);
        Ok(())
    }

    /// Copies the frame into an `image` buffer.
    #[cfg(feature = "image")]
    pub fn to_rgba_image(&self) -> Result<image::RgbaImage, EngineError> {
        let invalid = || EngineError::InvalidDimensions {
            width: self.width,
            height: self.height,
        };
        let w = u32::try_from(self.width).map_err(|_| invalid())?;
        let h = u32::try_from(self.height).map_err(|_| invalid())?;
        image::RgbaImage::from_raw(w, h, self.pixels.clone()).ok_or_else(invalid)
    }
}

/// Premultiplied source-over for one pixel.
fn over(dst: &mut [u8], src: &[u8]) {
    let inv = 255 - src[3] as u32;
    if inv == 0 {
        dst.copy_from_slice(&src[..4]);
        return;
    }
    for (d, &s) in dst.iter_mut().zip(src) {
        let blended = s as u32 + (*d as u32 * inv + 127) / 255;
        *d = blended.min(255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_zero_dimensions() {
        assert_eq!(
            Frame::new(0, 4),
            Err(EngineError::InvalidDimensions {
                width: 0,
                height: 4
            })
        );
        assert!(Frame::new(4, 0).is_err());
        assert!(Frame::new(usize::MAX, 2).is_err());
    }

    #[test]
    fn new_frame_is_transparent() {
        let f = Frame::new(3, 2).unwrap();
        assert_eq!(f.pixels().len(), 3 * 2 * 4);
        assert!(f.is_clear());
        assert_eq!(f.pixel(2, 1), Some([0, 0, 0, 0]));
        assert_eq!(f.pixel(3, 0), None);
    }

    #[test]
    fn opaque_pixel_replaces_destination() {
        let mut f = Frame::new(2, 2).unwrap();
        f.blend_pixel(1, 0, [10, 20, 30, 255]);
        f.blend_pixel(1, 0, [200, 100, 50, 255]);
        assert_eq!(f.pixel(1, 0), Some([200, 100, 50, 255]));
        assert_eq!(f.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn out_of_range_blend_is_ignored() {
        let mut f = Frame::new(2, 2).unwrap();
        f.blend_pixel(2, 0, [255; 4]);
        f.blend_pixel(0, 5, [255; 4]);
        assert!(f.is_clear());
    }

    #[test]
    fn fade_truncates_every_channel() {
        let mut f = Frame::new(1, 1).unwrap();
        f.blend_pixel(0, 0, [200, 101, 1, 255]);
        f.fade(0.5);
        assert_eq!(f.pixel(0, 0), Some([100, 50, 0, 127]));
    }

    #[test]
    fn repeated_fade_reaches_zero() {
        let mut f = Frame::new(1, 1).unwrap();
        f.blend_pixel(0, 0, [255; 4]);
        for _ in 0..2000 {
            f.fade(0.996);
        }
        assert!(f.is_clear());
    }

    #[test]
    fn composite_over_keeps_destination_under_transparent_source() {
        let mut dst = Frame::new(2, 1).unwrap();
        dst.blend_pixel(0, 0, [50, 60, 70, 255]);
        let mut src = Frame::new(2, 1).unwrap();
        src.blend_pixel(1, 0, [255, 0, 0, 255]);
        dst.composite_over(&src).unwrap();
        assert_eq!(dst.pixel(0, 0), Some([50, 60, 70, 255]));
        assert_eq!(dst.pixel(1, 0), Some([255, 0, 0, 255]));
    }

    #[test]
    fn composite_over_blends_translucent_source() {
        let mut dst = Frame::new(1, 1).unwrap();
        dst.blend_pixel(0, 0, [0, 0, 200, 255]);
        let mut src = Frame::new(1, 1).unwrap();
        src.blend_pixel(0, 0, [255, 0, 0, 255]);
        src.fade(0.5);
        dst.composite_over(&src).unwrap();
        let [r, g, b, a] = dst.pixel(0, 0).unwrap();
        assert_eq!((r, g, a), (127, 0, 255));
        assert!((99..=101).contains(&b), "b = {b}");
    }

    #[test]
    fn composite_over_rejects_mismatched_sizes() {
        let mut dst = Frame::new(2, 2).unwrap();
        let src = Frame::new(3, 2).unwrap();
        assert!(matches!(
            dst.composite_over(&src),
            Err(EngineError::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn copy_from_duplicates_pixels() {
        let mut src = Frame::new(2, 2).unwrap();
        src.blend_pixel(1, 1, [9, 8, 7, 255]);
        let mut dst = Frame::new(2, 2).unwrap();
        dst.copy_from(&src).unwrap();
        assert_eq!(dst, src);
        assert!(dst.copy_from(&Frame::new(1, 1).unwrap()).is_err());
    }

    #[cfg(feature = "image")]
    #[test]
    fn to_rgba_image_keeps_size_and_pixels() {
        let mut f = Frame::new(3, 2).unwrap();
        f.blend_pixel(2, 1, [9, 8, 7, 255]);
        let img = f.to_rgba_image().unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [9, 8, 7, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(img.into_raw(), f.pixels());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fade_never_brightens(c in any::<[u8; 4]>(), opacity in 0.0_f64..=1.0) {
                let mut f = Frame::new(1, 1).unwrap();
                f.blend_pixel(0, 0, [c[0], c[1], c[2], 255]);
                let before = f.pixel(0, 0).unwrap();
                f.fade(opacity);
                let after = f.pixel(0, 0).unwrap();
                for ch in 0..4 {
                    prop_assert!(after[ch] <= before[ch]);
                }
            }
        }
    }
}
