//! Volumetric Cloud Simulation Core Library
//!
//! Animated clouds built from a stochastic cellular automaton (Dobashi et al.,
//! SIGGRAPH 2000) and rendered as lit particle billboards.
//!
//! ## Pipeline
//!
//! - A voxel grid seeded from one or more ellipsoids holds humidity, activation
//!   and cloud bits in two alternating phases
//! - The binary cloud layer is smoothed into a `[0, 1]` density field and
//!   cross-faded between phases over the cloud's evolving speed
//! - One particle per in-volume cell is advected by the wind and coloured by a
//!   Beer-Lambert march toward the light plus a single-scatter phase term
//! - Host renderers receive positions and colours through [`ParticleEmitter`]

// Core types and utilities
pub mod config;
pub mod core_types;
pub mod error;
pub mod grid;

// Cloud simulation and rendering
pub mod density;
pub mod manager;
pub mod particles;
pub mod scattering;

// Re-export core types
pub use config::{CloudConfig, CloudQuality, NeighborOffsets};
pub use core_types::{Color, Vec3};
pub use error::CloudError;
pub use grid::{GridCoord, GridDims};

// Re-export simulation types
pub use density::{DensityFieldSimulator, Ellipsoid};
pub use manager::{CloudId, CloudManager};
pub use particles::{CloudParticle, CloudParticlePool, VerticalWrap};
pub use scattering::{
    CloudProperties, CloudScatteringEngine, EmitterFactory, EmitterTemplateId, FrameContext,
    ParticleEmitter, SceneSnapshot, PAUSED_EVOLVING_SPEED,
};
