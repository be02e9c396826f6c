//! Viewport mapping between geographic, Web-Mercator and particle space.
//!
//! The map hands the engine its visible box as `[minLng, minLat, maxLng,
//! maxLat]`. [`ViewportMapper`] keeps that box along with its Web-Mercator
//! normalization (the space the map's projection matrix consumes), and
//! derives the matching rectangle in a field's particle space on demand,
//! since that depends on whichever field is bound.

use crate::error::EngineError;
use crate::field::FieldMetadata;
use glam::DVec2;
use std::f64::consts::{FRAC_PI_4, PI};

/// Latitude limit of the square Web-Mercator world.
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Normalized Web-Mercator x for a longitude: `(lng + 180) / 360`.
pub fn mercator_x(lng: f64) -> f64 {
    (lng + 180.0) / 360.0
}

/// Normalized Web-Mercator y for a latitude; grows southward.
///
/// Latitudes are clamped to ±[`MERCATOR_MAX_LAT`] so poles stay finite.
pub fn mercator_y(lat: f64) -> f64 {
    let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    0.5 - (FRAC_PI_4 + lat * PI / 360.0).tan().ln() / (2.0 * PI)
}

/// Geographic `(lng, lat)` to normalized Web-Mercator.
pub fn geo_to_mercator(lng_lat: DVec2) -> DVec2 {
    DVec2::new(mercator_x(lng_lat.x), mercator_y(lng_lat.y))
}

/// A geographic box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl GeoBounds {
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// From the map's `[minLng, minLat, maxLng, maxLat]` order.
    pub fn from_array(b: [f64; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }

    /// Requires finite edges with `min < max` on both axes.
    pub fn validated(self) -> Result<Self, EngineError> {
        let finite = self.to_array().iter().all(|v| v.is_finite());
        if finite && self.min_lng < self.max_lng && self.min_lat < self.max_lat {
            Ok(self)
        } else {
            Err(EngineError::InvalidBounds {
                min_lng: self.min_lng,
                min_lat: self.min_lat,
                max_lng: self.max_lng,
                max_lat: self.max_lat,
            })
        }
    }

    pub fn lng_span(&self) -> f64 {
        self.max_lng - self.min_lng
    }
}

/// The viewport in normalized Web-Mercator space.
///
/// `min_y` is the northern edge because Mercator y grows southward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl NormalizedBounds {
    /// Normalizes a geographic box without validating it.
    pub fn from_geo(bounds: &GeoBounds) -> Self {
        Self {
            min_x: mercator_x(bounds.min_lng),
            min_y: mercator_y(bounds.max_lat),
            max_x: mercator_x(bounds.max_lng),
            max_y: mercator_y(bounds.min_lat),
        }
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// An axis-aligned rectangle in particle space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRect {
    pub min: DVec2,
    pub max: DVec2,
}

impl FieldRect {
    /// The whole field.
    pub const UNIT: FieldRect = FieldRect {
        min: DVec2::ZERO,
        max: DVec2::ONE,
    };

    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    /// Overlap with the unit square, if it has positive area.
    pub fn clip_to_unit(&self) -> Option<FieldRect> {
        let min = self.min.max(DVec2::ZERO);
        let max = self.max.min(DVec2::ONE);
        (max.x > min.x && max.y > min.y).then_some(FieldRect { min, max })
    }

    /// Point at fractional coordinates `t` in [0, 1]² of the rectangle.
    pub fn point_at(&self, t: DVec2) -> DVec2 {
        self.min + self.size() * t
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Holds the last accepted viewport in geographic and Mercator form.
#[derive(Debug, Clone, Default)]
pub struct ViewportMapper {
    bounds: Option<(GeoBounds, NormalizedBounds)>,
}

impl ViewportMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a new viewport box.
    ///
    /// Fails with `InvalidBounds` when `min >= max` on either axis; the
    /// previous bounds stay in effect.
    pub fn set_bounds(&mut self, bounds: GeoBounds) -> Result<NormalizedBounds, EngineError> {
        let bounds = bounds.validated()?;
        let normalized = NormalizedBounds::from_geo(&bounds);
        self.bounds = Some((bounds, normalized));
        Ok(normalized)
    }

    pub fn geo_bounds(&self) -> Option<GeoBounds> {
        self.bounds.map(|(geo, _)| geo)
    }

    pub fn normalized(&self) -> Option<NormalizedBounds> {
        self.bounds.map(|(_, norm)| norm)
    }

    /// The viewport in a field's particle space, unclipped.
    pub fn field_rect(&self, meta: &FieldMetadata) -> Option<FieldRect> {
        self.geo_bounds().map(|b| FieldRect {
            min: meta.to_field(DVec2::new(b.min_lng, b.max_lat)),
            max: meta.to_field(DVec2::new(b.max_lng, b.min_lat)),
        })
    }

    /// Where respawned particles may land: the visible part of the field,
    /// or the whole field when nothing of it is visible or no viewport is set.
    pub fn spawn_rect(&self, meta: &FieldMetadata) -> FieldRect {
        self.field_rect(meta)
            .and_then(|r| r.clip_to_unit())
            .unwrap_or(FieldRect::UNIT)
    }

    /// Viewport longitude span relative to the field's, 1 without a viewport.
    pub fn span_ratio(&self, meta: &FieldMetadata) -> f64 {
        self.geo_bounds()
            .map(|b| b.lng_span() / meta.lng_span())
            .unwrap_or(1.0)
    }
}
