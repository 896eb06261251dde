//! End-to-end cloud behaviour through the public API
use approx::assert_relative_eq;
use cloud_sim_core::{
    CloudConfig, CloudProperties, CloudScatteringEngine, Color, DensityFieldSimulator, Ellipsoid,
    EmitterTemplateId, FrameContext, GridDims, ParticleEmitter, Vec3, PAUSED_EVOLVING_SPEED,
};

#[derive(Debug, Default)]
struct TestEmitter {
    active: bool,
    position: Vec3,
}

impl ParticleEmitter for TestEmitter {
    fn set_position(&mut self, position: &Vec3) {
        self.position = *position;
    }

    fn set_tint(&mut self, _: Color) {}

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("cloud_sim_core=debug")
        .with_test_writer()
        .try_init();
}

fn seeded(config: CloudConfig) -> CloudConfig {
    CloudConfig {
        seed: Some(2024),
        ..config
    }
}

fn cloud(evolving_speed: f32, config: CloudConfig) -> CloudScatteringEngine<TestEmitter> {
    let properties = CloudProperties {
        length: 10.0,
        width: 10.0,
        height: 6.0,
        cell_size: 1.0,
        evolving_speed,
        position: Vec3::new(0.0, 0.0, 200.0),
        emitter_template: 1,
    };
    let mut factory = |_: EmitterTemplateId| Some(TestEmitter::default());
    CloudScatteringEngine::new(properties, config, &FrameContext::default(), &mut factory).unwrap()
}

#[test]
fn test_inscribed_ellipsoid_selects_centre_not_corners() {
    let dims = GridDims::new(7, 7, 7).unwrap();
    let sim = DensityFieldSimulator::new(dims, &seeded(CloudConfig::default())).unwrap();

    assert!(sim.is_cell_in_volume(3, 3, 3));
    for (i, j, k) in [(0, 0, 0), (6, 6, 6), (0, 6, 0), (6, 0, 6)] {
        assert!(!sim.is_cell_in_volume(i, j, k), "corner ({i}, {j}, {k})");
    }
    assert_eq!(sim.cells_in_volume(), sim.volume_cells().count());
}

#[test]
fn test_volume_never_exceeds_cap() {
    init_logging();
    let dims = GridDims::new(30, 30, 30).unwrap();
    let config = seeded(CloudConfig {
        max_cells_in_volume: 500,
        ..CloudConfig::default()
    });
    let shapes = [
        Ellipsoid::inscribed(&dims),
        Ellipsoid::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(4.0, 4.0, 4.0)),
    ];
    let sim = DensityFieldSimulator::with_shapes(dims, &config, &shapes).unwrap();
    assert_eq!(sim.cells_in_volume(), 500);
}

#[test]
fn test_density_stays_normalized_while_evolving() {
    let mut engine = cloud(0.5, seeded(CloudConfig::default()));
    let frame = FrameContext::default();
    for step in 1..=40 {
        engine.advance_time(&frame.at_time(step as f32 * 0.1), 2);
        let sim = engine.simulator();
        assert!(sim
            .current_density()
            .iter()
            .all(|d| (0.0..=1.0).contains(d)));
        // Cells outside the working set never gain density
        for coord in sim.dims().coords() {
            let (i, j, k) = (coord.i as i32, coord.j as i32, coord.k as i32);
            if !sim.is_cell_in_volume(i, j, k) {
                assert_eq!(sim.cell_density(i, j, k), 0.0);
            }
        }
    }
}

/// Cloud that has evolved through one full phase and then paused
fn evolved_cloud(config: CloudConfig) -> CloudScatteringEngine<TestEmitter> {
    let mut engine = cloud(2.0, config);
    engine.advance_time(&FrameContext::default().at_time(2.0), 1);
    engine.set_evolving_speed(PAUSED_EVOLVING_SPEED);
    engine
}

#[test]
fn test_wind_advects_every_particle() {
    let mut engine = evolved_cloud(seeded(CloudConfig::default()));
    let start: Vec<Vec3> = engine.pool().positions().to_vec();
    let origin = engine.origin();

    let frame = FrameContext {
        wind: Vec3::new(1.0, 0.0, 0.0),
        ..FrameContext::default()
    };
    engine.advance_time(&frame.at_time(4.0), 1);

    assert_relative_eq!(engine.origin(), origin + Vec3::new(2.0, 0.0, 0.0));
    for (i, before) in start.iter().enumerate() {
        assert_relative_eq!(engine.pool().position(i), before + Vec3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(engine.pool().previous_position(i), *before);
    }

    // Emitters follow the committed positions
    engine.prepare_render(&frame.at_time(4.0));
    let mut moved = 0;
    for (i, emitter) in engine.emitters().iter().enumerate() {
        if emitter.active {
            moved += 1;
            assert_relative_eq!(emitter.position, engine.pool().position(i));
        }
    }
    assert!(moved > 0);
}

#[test]
fn test_visibility_follows_density_threshold() {
    let mut engine = evolved_cloud(seeded(CloudConfig::default()));
    let frame = FrameContext::default().at_time(2.0);
    engine.prepare_render(&frame);

    let sim = engine.simulator();
    let min = engine.config().min_density;
    let mut visible = 0;
    for (particle, emitter) in engine.particles().iter().zip(engine.emitters()) {
        let c = particle.coord();
        let dense = sim.cell_density(c.i as i32, c.j as i32, c.k as i32) >= min;
        assert_eq!(particle.is_visible(), dense);
        assert_eq!(emitter.active, dense);
        if dense {
            visible += 1;
            assert!(particle.scattering_color().a > 0.0);
        } else {
            assert_eq!(particle.scattering_color(), Color::ZERO);
        }
    }
    assert!(visible > 0);
}

#[test]
fn test_thin_cells_deactivate_on_next_render() {
    // Every emitter starts active; cells short of full density must switch off
    let config = seeded(CloudConfig {
        min_density: 1.0,
        ..CloudConfig::default()
    });
    let mut engine = evolved_cloud(config);
    assert!(engine.emitters().iter().all(|e| e.active));

    let frame = FrameContext::default().at_time(2.0);
    engine.prepare_render(&frame);
    let sim = engine.simulator();
    let mut stopped = 0;
    for (particle, emitter) in engine.particles().iter().zip(engine.emitters()) {
        let c = particle.coord();
        if sim.cell_density(c.i as i32, c.j as i32, c.k as i32) < 1.0 {
            stopped += 1;
            assert!(!emitter.active);
            assert!(!particle.is_visible());
            assert_eq!(particle.scattering_color(), Color::ZERO);
        }
    }
    assert!(stopped > 0);
}

#[test]
fn test_sorted_draw_order_is_back_to_front() {
    let config = seeded(CloudConfig {
        sort_particles: true,
        ..CloudConfig::default()
    });
    let mut engine = cloud(PAUSED_EVOLVING_SPEED, config);
    let frame = FrameContext {
        camera_direction: Vec3::new(0.0, 1.0, 0.0),
        ..FrameContext::default()
    };
    engine.advance_time(&frame.at_time(0.1), 1);

    let pool = engine.pool();
    let order = pool.draw_order();
    assert_eq!(order.len(), pool.len());
    for pair in order.windows(2) {
        assert!(pool.view_distance(pair[0]) >= pool.view_distance(pair[1]));
    }
}
