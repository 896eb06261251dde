//! Volumetric cloud: simulator + particles + lighting + emitters

use super::emitter::{EmitterFactory, EmitterTemplateId, ParticleEmitter};
use super::frame::{FrameContext, SceneSnapshot};
use super::lighting;
use crate::config::CloudConfig;
use crate::core_types::{Color, Vec3};
use crate::density::DensityFieldSimulator;
use crate::error::CloudError;
use crate::grid::GridDims;
use crate::particles::{CloudParticle, CloudParticlePool, VerticalWrap};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Evolving speed that freezes the automaton while advection continues
pub const PAUSED_EVOLVING_SPEED: f32 = 1.0;

/// World-space description of one cloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudProperties {
    /// Extent along x (grid `i`)
    pub length: f32,
    /// Extent along y (grid `j`)
    pub width: f32,
    /// Extent along z (grid `k`, vertical)
    pub height: f32,
    pub cell_size: f32,
    /// Seconds per automaton phase; [`PAUSED_EVOLVING_SPEED`] pauses evolution
    pub evolving_speed: f32,
    /// World position of grid cell `(0, 0, 0)`
    pub position: Vec3,
    pub emitter_template: EmitterTemplateId,
}

impl CloudProperties {
    /// Grid extents in cells, rounded to the nearest whole cell
    ///
    /// # Errors
    ///
    /// Returns `CloudError::InvalidProperties` for non-finite or non-positive
    /// extents and `CloudError::InvalidDimensions` if an axis rounds to zero cells.
    pub fn grid_dims(&self) -> Result<GridDims, CloudError> {
        for (name, value) in [
            ("length", self.length),
            ("width", self.width),
            ("height", self.height),
            ("cell_size", self.cell_size),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CloudError::invalid_property(
                    name,
                    format!("must be finite and positive, got {value}"),
                ));
            }
        }
        if !self.evolving_speed.is_finite() {
            return Err(CloudError::invalid_property(
                "evolving_speed",
                format!("must be finite, got {}", self.evolving_speed),
            ));
        }
        if !self.position.iter().all(|c| c.is_finite()) {
            return Err(CloudError::invalid_property("position", "must be finite"));
        }

        let cells = |extent: f32| (extent / self.cell_size + 0.5) as usize;
        GridDims::new(
            cells(self.length),
            cells(self.width),
            cells(self.height),
        )
    }
}

/// One animated, lit cloud feeding a set of host emitters
///
/// Call [`advance_time`](Self::advance_time) once per frame from the update
/// phase, then [`prepare_render`](Self::prepare_render) before drawing.
/// Dropping the engine deactivates every emitter.
#[derive(Debug)]
pub struct CloudScatteringEngine<E: ParticleEmitter> {
    properties: CloudProperties,
    config: CloudConfig,
    simulator: DensityFieldSimulator,
    pool: CloudParticlePool,
    emitters: Vec<E>,

    origin: Vec3,
    evolving_speed: f32,
    phase_start_time: f32,
    last_advect_time: f32,
    color_counter: u32,
    wrap: VerticalWrap,
    snapshot: SceneSnapshot,
}

impl<E: ParticleEmitter> CloudScatteringEngine<E> {
    /// Build the grid, particles and emitters for a cloud
    ///
    /// # Arguments
    ///
    /// * `properties` - World extents, cell size, evolving speed, position
    /// * `config` - Simulation and lighting tunables
    /// * `frame` - Scene state at creation time; its `time` starts the first phase
    /// * `factory` - Host source of emitters, called once per particle
    ///
    /// # Errors
    ///
    /// Returns the first property, configuration or allocation error, or
    /// `CloudError::EmitterUnavailable` if the factory declines a particle.
    pub fn new<F>(
        properties: CloudProperties,
        config: CloudConfig,
        frame: &FrameContext,
        factory: &mut F,
    ) -> Result<Self, CloudError>
    where
        F: EmitterFactory<Emitter = E>,
    {
        let dims = properties.grid_dims()?;
        let simulator = DensityFieldSimulator::new(dims, &config)?;
        let pool = CloudParticlePool::generate(
            simulator.volume_cells(),
            properties.position,
            properties.cell_size,
        )?;

        let mut emitters = Vec::with_capacity(pool.len());
        for particle in 0..pool.len() {
            let mut emitter = factory
                .create_emitter(properties.emitter_template)
                .ok_or(CloudError::EmitterUnavailable {
                    template: properties.emitter_template,
                    particle,
                })?;
            emitter.set_active(true);
            emitters.push(emitter);
        }

        debug!(
            "Cloud created at ({:.1}, {:.1}, {:.1}) with {} particles",
            properties.position.x,
            properties.position.y,
            properties.position.z,
            pool.len()
        );

        Ok(Self {
            origin: properties.position,
            evolving_speed: properties.evolving_speed,
            phase_start_time: frame.time,
            last_advect_time: frame.time,
            color_counter: 0,
            wrap: VerticalWrap {
                floor: config.wrap_floor,
                offset: config.wrap_offset,
            },
            snapshot: SceneSnapshot::from_frame(frame),
            properties,
            config,
            simulator,
            pool,
            emitters,
        })
    }

    /// Advance the automaton, advect the cloud and (throttled) relight particles
    ///
    /// Runs in a fixed order: density interpolation or automaton step, then
    /// advection of the origin and every particle into the pool's back buffer
    /// (committed by a flip), then a full colour refresh on every
    /// `color_update_interval`-th call. An interval of 0 behaves like 1.
    pub fn advance_time(&mut self, frame: &FrameContext, color_update_interval: u32) {
        self.snapshot = SceneSnapshot::from_frame(frame);
        let now = frame.time;

        if self.is_evolving() {
            let alpha = (now - self.phase_start_time) / self.evolving_speed;
            self.simulator.interpolate_density_space(alpha);
            if now < self.phase_start_time || now >= self.phase_start_time + self.evolving_speed {
                self.phase_start_time = now;
            }
        }

        self.update_cloud_position(now);

        if self.config.sort_particles {
            self.pool
                .sort_by_view_distance(&self.snapshot.camera_direction, &self.origin);
        }

        if self.color_counter.checked_rem(color_update_interval.max(1)) == Some(0) {
            self.update_particle_colors();
        }
        self.color_counter += 1;
        if self.color_counter >= self.config.color_counter_ceiling {
            self.color_counter = 0;
        }
    }

    /// Push particle positions and colours to the emitters
    ///
    /// Particles with a fully transparent colour stop their emitter; all
    /// others move, re-activate and re-tint it.
    pub fn prepare_render(&mut self, frame: &FrameContext) {
        self.snapshot = SceneSnapshot::from_frame(frame);

        for (index, (particle, emitter)) in self
            .pool
            .particles()
            .iter()
            .zip(self.emitters.iter_mut())
            .enumerate()
        {
            let color = particle.scattering_color();
            if color.is_zero() {
                emitter.set_active(false);
            } else {
                emitter.set_position(&self.pool.position(index));
                emitter.set_active(true);
                emitter.set_tint(color);
            }
        }
    }

    /// Light reaching a particle through the cloud
    pub fn particle_incident_color(&self, particle: &CloudParticle) -> Color {
        lighting::incident_color(
            &self.simulator,
            &particle.coord().as_vec3(),
            &self.snapshot,
            &self.config,
        )
    }

    /// Recompute and store one particle's scattering colour
    pub fn calculate_particle_scattering_color(&mut self, index: usize) -> Color {
        let position = self.pool.position(index);
        let coord = self.pool.particles()[index].coord();
        let color =
            lighting::scattering_color(&self.simulator, coord, &position, &self.snapshot, &self.config);
        apply_color(self.pool.particle_mut(index), color)
    }

    fn update_particle_colors(&mut self) {
        let Self {
            ref simulator,
            ref mut pool,
            ref snapshot,
            ref config,
            ..
        } = *self;
        for (particle, position) in pool.particles_with_positions_mut() {
            let color =
                lighting::scattering_color(simulator, particle.coord(), position, snapshot, config);
            apply_color(particle, color);
        }
    }

    fn update_cloud_position(&mut self, now: f32) {
        let displacement = self.snapshot.wind * (now - self.last_advect_time);
        self.origin += displacement;
        self.wrap.apply(&mut self.origin);
        self.pool.advect(displacement, &self.wrap);
        self.last_advect_time = now;
    }

    /// True unless the evolving speed is the pause sentinel or non-positive
    pub fn is_evolving(&self) -> bool {
        self.evolving_speed != PAUSED_EVOLVING_SPEED && self.evolving_speed > 0.0
    }

    pub fn evolving_speed(&self) -> f32 {
        self.evolving_speed
    }

    /// Change the phase duration; [`PAUSED_EVOLVING_SPEED`] pauses the automaton
    pub fn set_evolving_speed(&mut self, speed: f32) {
        self.evolving_speed = speed;
    }

    /// Distance from the camera to the centre of the cloud volume
    pub fn view_distance(&self) -> f32 {
        let half = self.simulator.dims().half_extents() * self.properties.cell_size;
        (self.origin + half - self.snapshot.camera_position).norm()
    }

    /// World position of grid cell `(0, 0, 0)` after advection
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn grid_dims(&self) -> GridDims {
        self.simulator.dims()
    }

    pub fn properties(&self) -> &CloudProperties {
        &self.properties
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &SceneSnapshot {
        &self.snapshot
    }

    pub fn simulator(&self) -> &DensityFieldSimulator {
        &self.simulator
    }

    pub fn pool(&self) -> &CloudParticlePool {
        &self.pool
    }

    pub fn particles(&self) -> &[CloudParticle] {
        self.pool.particles()
    }

    /// Emitters, indexed like `particles()`
    pub fn emitters(&self) -> &[E] {
        &self.emitters
    }

    /// Number of particles currently visible
    pub fn visible_particles(&self) -> usize {
        self.pool.particles().iter().filter(|p| p.is_visible()).count()
    }
}

impl<E: ParticleEmitter> Drop for CloudScatteringEngine<E> {
    fn drop(&mut self) {
        for emitter in &mut self.emitters {
            emitter.set_active(false);
        }
    }
}

/// `None` marks a cell below the visibility threshold
fn apply_color(particle: &mut CloudParticle, color: Option<Color>) -> Color {
    particle.visible = color.is_some();
    let color = color.unwrap_or(Color::ZERO);
    particle.scattering_color = color;
    color
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct RecordingEmitter {
        position: Option<Vec3>,
        tint: Option<Color>,
        active: bool,
    }

    impl ParticleEmitter for RecordingEmitter {
        fn set_position(&mut self, position: &Vec3) {
            self.position = Some(*position);
        }

        fn set_tint(&mut self, color: Color) {
            self.tint = Some(color);
        }

        fn set_active(&mut self, active: bool) {
            self.active = active;
        }
    }

    fn properties(evolving_speed: f32) -> CloudProperties {
        CloudProperties {
            length: 8.0,
            width: 8.0,
            height: 6.0,
            cell_size: 1.0,
            evolving_speed,
            position: Vec3::new(0.0, 0.0, 100.0),
            emitter_template: 3,
        }
    }

    fn engine(evolving_speed: f32) -> CloudScatteringEngine<RecordingEmitter> {
        let config = CloudConfig {
            seed: Some(5),
            ..CloudConfig::default()
        };
        let mut factory = |_: EmitterTemplateId| Some(RecordingEmitter::default());
        CloudScatteringEngine::new(
            properties(evolving_speed),
            config,
            &FrameContext::default(),
            &mut factory,
        )
        .unwrap()
    }

    /// Engine whose automaton has completed one phase, then paused
    fn evolved_engine() -> CloudScatteringEngine<RecordingEmitter> {
        let mut engine = engine(2.0);
        engine.advance_time(&FrameContext::default().at_time(2.0), 1);
        engine.set_evolving_speed(PAUSED_EVOLVING_SPEED);
        assert!(engine.visible_particles() > 0);
        engine
    }

    #[test]
    fn test_grid_dims_round_to_nearest_cell() {
        let props = CloudProperties {
            length: 10.4,
            width: 11.2,
            height: 4.0,
            cell_size: 2.0,
            ..properties(2.0)
        };
        let dims = props.grid_dims().unwrap();
        assert_eq!((dims.length, dims.width, dims.height), (5, 6, 2));
    }

    #[test]
    fn test_grid_dims_reject_bad_cell_size() {
        let props = CloudProperties {
            cell_size: 0.0,
            ..properties(2.0)
        };
        assert!(matches!(
            props.grid_dims(),
            Err(CloudError::InvalidProperties {
                name: "cell_size",
                ..
            })
        ));
    }

    #[test]
    fn test_one_emitter_per_particle_activated() {
        let engine = engine(2.0);
        assert_eq!(engine.emitters().len(), engine.particles().len());
        assert_eq!(engine.particles().len(), engine.simulator().cells_in_volume());
        assert!(engine.emitters().iter().all(|e| e.active));
    }

    #[test]
    fn test_factory_failure_is_reported() {
        let mut factory = |_: EmitterTemplateId| None::<RecordingEmitter>;
        let result = CloudScatteringEngine::new(
            properties(2.0),
            CloudConfig::default(),
            &FrameContext::default(),
            &mut factory,
        );
        assert!(matches!(
            result,
            Err(CloudError::EmitterUnavailable {
                template: 3,
                particle: 0
            })
        ));
    }

    #[test]
    fn test_thin_particles_stop_their_emitters() {
        let mut engine = evolved_engine();
        let frame = FrameContext::default().at_time(2.0);
        engine.prepare_render(&frame);
        let active = engine.emitters().iter().filter(|e| e.active).count();
        assert_eq!(active, engine.visible_particles());

        engine.simulator.clear_density();
        engine.advance_time(&frame.advanced(0.1), 1);
        assert!(engine
            .particles()
            .iter()
            .all(|p| p.scattering_color() == Color::ZERO && !p.is_visible()));

        engine.prepare_render(&frame.advanced(0.1));
        assert!(engine.emitters().iter().all(|e| !e.active));
        assert_eq!(engine.visible_particles(), 0);
    }

    #[test]
    fn test_visible_particles_reach_emitters() {
        let mut engine = evolved_engine();
        let frame = FrameContext::default().at_time(2.0);
        engine.prepare_render(&frame);
        let mut shown = 0;
        for (i, (particle, emitter)) in engine
            .particles()
            .iter()
            .zip(engine.emitters())
            .enumerate()
        {
            let c = particle.coord();
            let density = engine.simulator().cell_density(c.i as i32, c.j as i32, c.k as i32);
            assert_eq!(particle.is_visible(), density >= engine.config().min_density);
            if particle.is_visible() {
                shown += 1;
                assert!(emitter.active);
                assert_eq!(emitter.tint, Some(particle.scattering_color()));
                assert_eq!(emitter.position, Some(engine.pool().position(i)));
            } else {
                assert!(!emitter.active);
                assert_eq!(particle.scattering_color(), Color::ZERO);
            }
        }
        assert_eq!(shown, engine.visible_particles());
    }

    #[test]
    fn test_visibility_ignores_light_color() {
        let mut engine = evolved_engine();
        engine.config.min_density = 0.0;
        let frame = FrameContext {
            light_color: Color::ZERO,
            ..FrameContext::default()
        }
        .at_time(2.0);
        engine.advance_time(&frame, 1);
        assert_eq!(engine.visible_particles(), engine.particles().len());
        assert!(engine
            .particles()
            .iter()
            .all(|p| p.scattering_color().r == 0.0));
    }

    #[test]
    fn test_color_refresh_is_throttled() {
        // Counter is 1 after the evolving call
        let mut engine = evolved_engine();
        let mut frame = FrameContext::default().at_time(2.0);
        let refreshed: Vec<Color> = engine.particles().iter().map(CloudParticle::scattering_color).collect();

        // Double the light intensity; the next two calls must not pick it up
        frame.light_intensity = 2.0;
        for _ in 0..2 {
            frame = frame.advanced(0.1);
            engine.advance_time(&frame, 3);
            let now: Vec<Color> = engine.particles().iter().map(CloudParticle::scattering_color).collect();
            assert_eq!(now, refreshed);
        }

        frame = frame.advanced(0.1);
        engine.advance_time(&frame, 3);
        let mut checked = 0;
        for (particle, before) in engine.particles().iter().zip(&refreshed) {
            let after = particle.scattering_color();
            if particle.is_visible() {
                checked += 1;
                assert!((after.r - 2.0 * before.r).abs() < 1e-5);
                assert!((after.a - before.a).abs() < 1e-6);
            } else {
                assert_eq!(after, Color::ZERO);
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_evolution_swaps_phase_after_window() {
        let mut engine = engine(2.0);
        let last = engine.simulator().last_phase();
        let frame = FrameContext::default();
        engine.advance_time(&frame.at_time(1.0), 1);
        assert_eq!(engine.simulator().last_phase(), last);
        engine.advance_time(&frame.at_time(2.0), 1);
        assert_ne!(engine.simulator().last_phase(), last);
        // Window restarted at t = 2, so t = 3 blends without another swap
        engine.advance_time(&frame.at_time(3.0), 1);
        assert_ne!(engine.simulator().last_phase(), last);
    }

    #[test]
    fn test_paused_cloud_keeps_phase() {
        let mut engine = engine(PAUSED_EVOLVING_SPEED);
        let last = engine.simulator().last_phase();
        for t in 1..10 {
            engine.advance_time(&FrameContext::default().at_time(t as f32 * 5.0), 1);
        }
        assert_eq!(engine.simulator().last_phase(), last);
        assert!(!engine.is_evolving());
        engine.set_evolving_speed(4.0);
        assert!(engine.is_evolving());
    }

    #[test]
    fn test_origin_wraps_below_floor() {
        let mut engine = engine(PAUSED_EVOLVING_SPEED);
        let frame = FrameContext {
            wind: Vec3::new(0.0, 0.0, -100.0),
            ..FrameContext::default()
        };
        // z: 100 - 1150 = -1050 < -1000 -> +1500 = 450
        engine.advance_time(&frame.at_time(11.5), 1);
        assert!((engine.origin().z - 450.0).abs() < 1e-3);
    }

    #[test]
    fn test_drop_deactivates_emitters() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct SharedEmitter(Rc<RefCell<Vec<bool>>>);

        impl ParticleEmitter for SharedEmitter {
            fn set_position(&mut self, _: &Vec3) {}
            fn set_tint(&mut self, _: Color) {}
            fn set_active(&mut self, active: bool) {
                self.0.borrow_mut().push(active);
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut factory = |_: EmitterTemplateId| Some(SharedEmitter(Rc::clone(&log)));
        let engine = CloudScatteringEngine::new(
            properties(2.0),
            CloudConfig {
                seed: Some(9),
                ..CloudConfig::default()
            },
            &FrameContext::default(),
            &mut factory,
        )
        .unwrap();
        let n = engine.particles().len();
        drop(engine);
        let log = log.borrow();
        assert_eq!(log.len(), 2 * n);
        assert!(log[n..].iter().all(|a| !a));
    }
}
