//! Single-scattering light model and the per-cloud orchestration layer
//!
//! [`CloudScatteringEngine`] drives a [`DensityFieldSimulator`](crate::density::DensityFieldSimulator)
//! and a [`CloudParticlePool`](crate::particles::CloudParticlePool), lights every
//! particle by ray marching the density field toward the light, and pushes the
//! result to host-provided [`ParticleEmitter`]s.

mod emitter;
mod engine;
mod frame;
pub mod lighting;

pub use emitter::{EmitterFactory, EmitterTemplateId, ParticleEmitter};
pub use engine::{CloudProperties, CloudScatteringEngine, PAUSED_EVOLVING_SPEED};
pub use frame::{FrameContext, SceneSnapshot};
