#![deny(unsafe_code)]
//! Core types for the drift vector-field particle visualizer.
//!
//! Provides `EngineError`, colors and the speed `ColorRamp`, the `Xorshift64`
//! PRNG, fixed-point particle codecs, `FieldMetadata`/`FieldTexture` sampling,
//! Web-Mercator viewport mapping, the generic `PingPong` double buffer, the
//! `Frame` raster, synthetic field sources, and JSON parameter helpers.

pub mod codec;
pub mod color;
pub mod error;
pub mod field;
pub mod frame;
pub mod params;
pub mod ping_pong;
pub mod prng;
pub mod ramp;
pub mod synthetic;
pub mod viewport;

pub use codec::SpeedCodec;
pub use color::Srgb;
pub use error::EngineError;
pub use field::{FieldMetadata, FieldTexture, Sampling};
pub use frame::Frame;
pub use ping_pong::PingPong;
pub use prng::Xorshift64;
pub use ramp::{ColorRamp, ColorStop};
pub use viewport::{FieldRect, GeoBounds, NormalizedBounds, ViewportMapper};
