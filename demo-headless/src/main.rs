use clap::Parser;
use cloud_sim_core::{
    CloudConfig, CloudError, CloudId, CloudManager, CloudProperties, CloudQuality, Color,
    EmitterTemplateId, FrameContext, ParticleEmitter, Vec3,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Volumetric cloud simulation demo with configurable parameters
#[derive(Parser, Debug)]
#[command(name = "cloud-sim-demo")]
#[command(about = "Cellular-automaton cloud simulation demo", long_about = None)]
struct Args {
    /// Simulation duration in seconds
    #[arg(short, long, default_value_t = 30.0)]
    duration: f32,

    /// Frame time step in seconds
    #[arg(long, default_value_t = 1.0 / 30.0, value_parser = positive_seconds)]
    dt: f32,

    /// Number of clouds to spawn in a row along +x
    #[arg(short, long, default_value_t = 3)]
    clouds: u32,

    /// Cloud extent along x, y and z in world units
    #[arg(long, num_args = 3, default_values_t = [40.0, 30.0, 16.0])]
    size: Vec<f32>,

    /// Grid cell size in world units
    #[arg(long, default_value_t = 2.0)]
    cell_size: f32,

    /// Seconds per automaton phase (1.0 pauses evolution)
    #[arg(short, long, default_value_t = 4.0)]
    evolving_speed: f32,

    /// Wind velocity x y z
    #[arg(short, long, num_args = 3, default_values_t = [2.0, 0.5, 0.0])]
    wind: Vec<f32>,

    /// Quality preset (low, medium, high)
    #[arg(short, long, default_value = "medium")]
    quality: String,

    /// Worker threads for cloud updates (0 = rayon default)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Seed for reproducible clouds
    #[arg(long)]
    seed: Option<u64>,

    /// Keep particles sorted back-to-front for the camera
    #[arg(long)]
    sort: bool,

    /// Report interval in seconds
    #[arg(short, long, default_value_t = 5.0, value_parser = positive_seconds)]
    report_interval: f32,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Stand-in for a renderer billboard emitter
#[derive(Debug, Default)]
struct CountingEmitter {
    active: bool,
    tint: Color,
    position: Vec3,
}

impl ParticleEmitter for CountingEmitter {
    fn set_position(&mut self, position: &Vec3) {
        self.position = *position;
    }

    fn set_tint(&mut self, color: Color) {
        self.tint = color;
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// Time steps must move the clock forward or the frame loop never ends
fn positive_seconds(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("'{s}' is not a number: {e}"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("must be a positive number of seconds, got {value}"))
    }
}

fn vec3(v: &[f32]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

fn main() -> Result<(), CloudError> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    println!("=== Cloud Simulation Demo ===\n");

    let quality = match args.quality.to_lowercase().as_str() {
        "low" => CloudQuality::Low,
        "high" => CloudQuality::High,
        "medium" => CloudQuality::Medium,
        other => {
            println!("Unknown quality '{}', using medium", other);
            CloudQuality::Medium
        }
    };

    let mut manager = CloudManager::new(args.threads, quality)?;
    let mut frame = FrameContext {
        wind: vec3(&args.wind),
        light_direction: Vec3::new(0.3, 0.2, 1.0),
        camera_position: Vec3::new(-60.0, -120.0, 180.0),
        camera_direction: Vec3::new(0.3, 0.9, -0.1),
        ..FrameContext::default()
    };

    let mut factory = |_: EmitterTemplateId| Some(CountingEmitter::default());
    let mut ids: Vec<CloudId> = Vec::new();
    for n in 0..args.clouds {
        let properties = CloudProperties {
            length: args.size[0],
            width: args.size[1],
            height: args.size[2],
            cell_size: args.cell_size,
            evolving_speed: args.evolving_speed,
            position: Vec3::new(n as f32 * (args.size[0] + 10.0), 0.0, 200.0),
            emitter_template: 0,
        };
        let config = CloudConfig {
            seed: args.seed.map(|s| s.wrapping_add(u64::from(n))),
            sort_particles: args.sort,
            ..quality.config()
        };
        ids.push(manager.add_cloud_with_config(properties, config, &frame, &mut factory)?);
    }
    info!(
        "Spawned {} clouds with {} particles",
        manager.len(),
        manager.particle_count()
    );

    println!("Time(s) | Cloud | Visible | Active Emitters | Origin (x, y, z)       | View Dist");
    println!("--------|-------|---------|-----------------|------------------------|----------");

    let mut next_report = 0.0;
    while frame.time < args.duration {
        frame = frame.advanced(args.dt);
        manager.advance_time(&frame);
        manager.prepare_render(&frame);

        if frame.time >= next_report {
            for &id in &manager.clouds_by_view_distance() {
                let Some(cloud) = manager.cloud(id) else {
                    continue;
                };
                let active = cloud.emitters().iter().filter(|e| e.active).count();
                let origin = cloud.origin();
                println!(
                    "{:7.1} | {:5} | {:7} | {:15} | ({:6.1}, {:6.1}, {:6.1}) | {:9.1}",
                    frame.time,
                    id,
                    cloud.visible_particles(),
                    active,
                    origin.x,
                    origin.y,
                    origin.z,
                    cloud.view_distance()
                );
            }
            next_report += args.report_interval;
        }
    }

    println!("\n=== Simulation Complete ===");
    println!("Final time: {:.1}s", frame.time);
    for id in ids {
        if let Some(cloud) = manager.cloud(id) {
            let brightest = cloud
                .emitters()
                .iter()
                .filter(|e| e.active)
                .map(|e| e.tint.r)
                .fold(0.0_f32, f32::max);
            let last = cloud
                .emitters()
                .iter()
                .filter(|e| e.active)
                .map(|e| e.position)
                .next_back();
            println!(
                "Cloud {}: {} particles, brightest red {:.3}, last active emitter at {:?}",
                id,
                cloud.particles().len(),
                brightest,
                last.map(|p| (p.x, p.y, p.z))
            );
        }
    }

    Ok(())
}
