//! Vector field data: metadata, the decoded RGBA texel buffer, and sampling.
//!
//! A [`FieldTexture`] wraps an already-decoded RGBA8 image in which channel R
//! encodes the eastward component `u` and channel G the northward component
//! `v`, each mapped linearly from `0..=255` onto the metadata's
//! `[min, max]` range. Channel A is ignored.
//!
//! Sampling uses *particle space*: `x` runs west to east across the data
//! extent and `y` runs north to south, so `y = 0` is image row 0. Nothing is
//! flipped implicitly.

use crate::codec::SpeedCodec;
use crate::error::EngineError;
use crate::viewport::GeoBounds;
use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Longitude span at which a field is treated as wrapping around the globe.
const GLOBAL_SPAN_DEG: f64 = 360.0 - 1e-9;

fn default_min_long() -> f64 {
    -180.0
}

fn default_min_lat() -> f64 {
    -90.0
}

fn default_per_pixel() -> f64 {
    1.0
}

/// Describes a field image: its size, channel ranges and geographic placement.
///
/// Deserializes from the loader's camelCase JSON. The geographic keys are
/// optional and default to a whole-world, one-degree-per-pixel layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub width: usize,
    pub height: usize,
    pub u_min: f64,
    pub u_max: f64,
    pub v_min: f64,
    pub v_max: f64,
    #[serde(default = "default_min_long")]
    pub min_long: f64,
    #[serde(default = "default_min_lat")]
    pub min_lat: f64,
    #[serde(default = "default_per_pixel")]
    pub long_per_pixel: f64,
    #[serde(default = "default_per_pixel")]
    pub lat_per_pixel: f64,
}

impl FieldMetadata {
    /// Metadata with the default geographic placement.
    pub fn new(width: usize, height: usize, u_range: (f64, f64), v_range: (f64, f64)) -> Self {
        Self {
            width,
            height,
            u_min: u_range.0,
            u_max: u_range.1,
            v_min: v_range.0,
            v_max: v_range.1,
            min_long: default_min_long(),
            min_lat: default_min_lat(),
            long_per_pixel: default_per_pixel(),
            lat_per_pixel: default_per_pixel(),
        }
    }

    /// Places the field at a south-west corner with the given degrees per pixel.
    pub fn with_geo(mut self, min_long: f64, min_lat: f64, long_per_pixel: f64, lat_per_pixel: f64) -> Self {
        self.min_long = min_long;
        self.min_lat = min_lat;
        self.long_per_pixel = long_per_pixel;
        self.lat_per_pixel = lat_per_pixel;
        self
    }

    /// Parses and validates metadata JSON.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let parsed: FieldMetadata = serde_json::from_str(json)
            .map_err(|e| EngineError::MalformedMetadata(e.to_string()))?;
        parsed.validated()
    }

    /// Checks the metadata and normalizes inverted channel ranges.
    ///
    /// Inverted `u`/`v` ranges are swapped. Non-finite numbers, zero
    /// dimensions and non-positive per-pixel scales are rejected.
    pub fn validated(mut self) -> Result<Self, EngineError> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::MalformedMetadata(format!(
                "field dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        let numbers = [
            ("uMin", self.u_min),
            ("uMax", self.u_max),
            ("vMin", self.v_min),
            ("vMax", self.v_max),
            ("minLong", self.min_long),
            ("minLat", self.min_lat),
            ("longPerPixel", self.long_per_pixel),
            ("latPerPixel", self.lat_per_pixel),
        ];
        if let Some((name, value)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EngineError::MalformedMetadata(format!(
                "{name} must be finite, got {value}"
            )));
        }
        if self.long_per_pixel <= 0.0 || self.lat_per_pixel <= 0.0 {
            return Err(EngineError::MalformedMetadata(format!(
                "per-pixel scales must be positive, got longPerPixel={} latPerPixel={}",
                self.long_per_pixel, self.lat_per_pixel
            )));
        }
        if self.u_max < self.u_min {
            log::warn!(
                "field metadata has uMax {} < uMin {}, swapping",
                self.u_max,
                self.u_min
            );
            std::mem::swap(&mut self.u_min, &mut self.u_max);
        }
        if self.v_max < self.v_min {
            log::warn!(
                "field metadata has vMax {} < vMin {}, swapping",
                self.v_max,
                self.v_min
            );
            std::mem::swap(&mut self.v_min, &mut self.v_max);
        }
        Ok(self)
    }

    /// Longitude extent of the data in degrees.
    pub fn lng_span(&self) -> f64 {
        self.width as f64 * self.long_per_pixel
    }

    /// Latitude extent of the data in degrees.
    pub fn lat_span(&self) -> f64 {
        self.height as f64 * self.lat_per_pixel
    }

    pub fn max_long(&self) -> f64 {
        self.min_long + self.lng_span()
    }

    pub fn max_lat(&self) -> f64 {
        self.min_lat + self.lat_span()
    }

    /// The geographic rectangle covered by the data.
    pub fn geo_bounds(&self) -> GeoBounds {
        GeoBounds {
            min_lng: self.min_long,
            min_lat: self.min_lat,
            max_lng: self.max_long(),
            max_lat: self.max_lat(),
        }
    }

    /// Whether the data covers every longitude, so `x` may wrap.
    pub fn is_global(&self) -> bool {
        self.lng_span() >= GLOBAL_SPAN_DEG
    }

    /// Largest speed any texel can decode to.
    pub fn max_magnitude(&self) -> f64 {
        let u = self.u_min.abs().max(self.u_max.abs());
        let v = self.v_min.abs().max(self.v_max.abs());
        (u * u + v * v).sqrt()
    }

    /// Geographic `(lng, lat)` to particle space.
    pub fn to_field(&self, lng_lat: DVec2) -> DVec2 {
        DVec2::new(
            (lng_lat.x - self.min_long) / self.lng_span(),
            (self.max_lat() - lng_lat.y) / self.lat_span(),
        )
    }

    /// Particle space to geographic `(lng, lat)`.
    pub fn to_geo(&self, p: DVec2) -> DVec2 {
        DVec2::new(
            self.min_long + p.x * self.lng_span(),
            self.max_lat() - p.y * self.lat_span(),
        )
    }

    /// Decodes one texel's channels into a velocity.
    pub fn decode_texel(&self, texel: [u8; 4]) -> DVec2 {
        DVec2::new(
            texel[0] as f64 / 255.0 * (self.u_max - self.u_min) + self.u_min,
            texel[1] as f64 / 255.0 * (self.v_max - self.v_min) + self.v_min,
        )
    }
}

/// How a [`FieldTexture`] is sampled between texels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// The texel the coordinate falls into.
    #[default]
    Nearest,
    /// Linear blend of the four surrounding texel centers, clamped at edges.
    Bilinear,
}

/// A bound vector field: validated metadata plus its RGBA8 texels.
#[derive(Debug, Clone)]
pub struct FieldTexture {
    metadata: FieldMetadata,
    data: Vec<u8>,
}

impl FieldTexture {
    /// Wraps a row-major RGBA8 buffer (row 0 is the northern edge).
    ///
    /// Validates the metadata and requires `data.len() == width * height * 4`.
    pub fn new(data: Vec<u8>, metadata: FieldMetadata) -> Result<Self, EngineError> {
        let metadata = metadata.validated()?;
        let expected = metadata
            .width
            .checked_mul(metadata.height)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                EngineError::MalformedMetadata(format!(
                    "field size {}x{} overflows",
                    metadata.width, metadata.height
                ))
            })?;
        if data.len() != expected {
            return Err(EngineError::BufferSizeMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { metadata, data })
    }

    /// Wraps an already-decoded image.
    #[cfg(feature = "image")]
    pub fn from_rgba_image(
        image: image::RgbaImage,
        metadata: FieldMetadata,
    ) -> Result<Self, EngineError> {
        let (w, h) = image.dimensions();
        if w as usize != metadata.width || h as usize != metadata.height {
            return Err(EngineError::MalformedMetadata(format!(
                "image is {w}x{h} but metadata declares {}x{}",
                metadata.width, metadata.height
            )));
        }
        Self::new(image.into_raw(), metadata)
    }

    pub fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> usize {
        self.metadata.width
    }

    pub fn height(&self) -> usize {
        self.metadata.height
    }

    pub fn max_magnitude(&self) -> f64 {
        self.metadata.max_magnitude()
    }

    /// Speed codec matched to this field's magnitude range.
    pub fn speed_codec(&self) -> SpeedCodec {
        SpeedCodec::new(self.max_magnitude())
    }

    /// Raw texel at `(col, row)`, clamped to the grid.
    pub fn texel(&self, col: usize, row: usize) -> [u8; 4] {
        let col = col.min(self.width() - 1);
        let row = row.min(self.height() - 1);
        let i = (row * self.width() + col) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Decoded velocity at `(col, row)`, clamped to the grid.
    pub fn velocity_at(&self, col: usize, row: usize) -> DVec2 {
        self.metadata.decode_texel(self.texel(col, row))
    }

    /// Velocity at particle-space coordinate `p`.
    ///
    /// Coordinates outside [0, 1] are clamped to the edge texels.
    pub fn sample(&self, p: DVec2, mode: Sampling) -> DVec2 {
        match mode {
            Sampling::Nearest => {
                let col = texel_index(p.x, self.width());
                let row = texel_index(p.y, self.height());
                self.velocity_at(col, row)
            }
            Sampling::Bilinear => self.sample_bilinear(p),
        }
    }

    fn sample_bilinear(&self, p: DVec2) -> DVec2 {
        let fx = (clamp_unit(p.x) * self.width() as f64 - 0.5).max(0.0);
        let fy = (clamp_unit(p.y) * self.height() as f64 - 0.5).max(0.0);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;

        let top = self
            .velocity_at(x0, y0)
            .lerp(self.velocity_at(x0 + 1, y0), tx);
        let bottom = self
            .velocity_at(x0, y0 + 1)
            .lerp(self.velocity_at(x0 + 1, y0 + 1), tx);
        top.lerp(bottom, ty)
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Index of the texel containing normalized coordinate `v`.
fn texel_index(v: f64, size: usize) -> usize {
    ((clamp_unit(v) * size as f64).floor() as usize).min(size - 1)
}
