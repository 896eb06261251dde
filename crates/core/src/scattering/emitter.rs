//! Rendering-side capability consumed by the engine

use crate::core_types::{Color, Vec3};

/// Opaque identifier of the host's emitter template
pub type EmitterTemplateId = u32;

/// Billboard emitter owned by the host renderer, one per cloud particle
pub trait ParticleEmitter {
    /// Move the emitter to a world position
    fn set_position(&mut self, position: &Vec3);

    /// Tint emitted billboards with a linear RGBA colour
    fn set_tint(&mut self, color: Color);

    /// Start (`true`) or stop (`false`) emitting
    fn set_active(&mut self, active: bool);
}

/// Source of emitters, asked once per particle during setup
pub trait EmitterFactory {
    type Emitter: ParticleEmitter;

    /// Create an emitter from a template, `None` if the host cannot provide one
    fn create_emitter(&mut self, template: EmitterTemplateId) -> Option<Self::Emitter>;
}

impl<E, F> EmitterFactory for F
where
    E: ParticleEmitter,
    F: FnMut(EmitterTemplateId) -> Option<E>,
{
    type Emitter = E;

    fn create_emitter(&mut self, template: EmitterTemplateId) -> Option<E> {
        self(template)
    }
}
