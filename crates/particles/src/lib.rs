//! GPU-style particle flow over a geographic vector field, computed on the CPU.
//!
//! Particle state lives in double-buffered texel grids. Each frame the
//! [`RenderStage`] draws the current generation with fading trails and the
//! [`AdvectionStage`] writes the next one. [`FlowEngine`] ties both to a
//! bound field, the map viewport and a settle timer.

#![deny(unsafe_code)]

pub mod advection;
pub mod config;
pub mod engine;
pub mod render;
pub mod settle;
pub mod store;

pub use advection::{AdvectionParams, AdvectionStage, AdvectionStats};
pub use config::FlowConfig;
pub use engine::{DrawOutcome, FlowEngine};
pub use render::{RenderStage, Scene};
pub use settle::{SettleState, SettleTracker};
pub use store::ParticleStore;
