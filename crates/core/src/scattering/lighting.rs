//! Beer-Lambert attenuation and single-scatter phase evaluation
//!
//! All marching happens in grid space: a particle at cell `(i, j, k)` starts at
//! the point `(i, j, k)` and steps along the unit light direction.

use super::frame::SceneSnapshot;
use crate::config::CloudConfig;
use crate::core_types::{Color, Vec3};
use crate::density::DensityFieldSimulator;
use crate::grid::GridCoord;

/// Optical depth of a sample with the given density
#[inline]
pub fn optical_length(density: f32, factor: f32) -> f32 {
    factor * density
}

/// Simplified Rayleigh-shaped phase function, `0.75 (1 + cos^2)`
///
/// Both vectors are expected to be unit length (or zero).
#[inline]
pub fn phase(light_dir: &Vec3, view_dir: &Vec3) -> f32 {
    let d = light_dir.dot(view_dir);
    (1.0 + d * d) * 0.75
}

/// Light arriving at `start` after passing through the density field
///
/// Each sample keeps `incident_blend` of the light unconditionally and
/// attenuates the remainder by the sample's transmittance. A zero light
/// direction returns the unattenuated light.
pub fn incident_color<R>(
    sim: &DensityFieldSimulator<R>,
    start: &Vec3,
    snapshot: &SceneSnapshot,
    config: &CloudConfig,
) -> Color {
    let mut color = snapshot.light_color;
    let dir = snapshot.light_direction;
    if dir == Vec3::zeros() {
        return color;
    }

    let step = dir * config.sample_length;
    let dims = sim.dims();
    // A unit direction leaves the grid within its diagonal; the bound only
    // guards against rounding at the faces.
    let diagonal = ((dims.length.pow(2) + dims.width.pow(2) + dims.height.pow(2)) as f32).sqrt();
    let max_samples = (diagonal / config.sample_length).ceil() as usize + 2;

    let mut point = start + step;
    for _ in 0..max_samples {
        if !sim.is_point_in_space(&point) {
            break;
        }
        let density = sim.point_density(&point);
        let transmittance = (-optical_length(density, config.optical_length_factor)).exp();
        color *= (1.0 - config.incident_blend) * transmittance + config.incident_blend;
        point += step;
    }
    color
}

/// Colour a particle scatters toward the camera, `None` if its cell is too thin to see
pub fn scattering_color<R>(
    sim: &DensityFieldSimulator<R>,
    coord: GridCoord,
    world_position: &Vec3,
    snapshot: &SceneSnapshot,
    config: &CloudConfig,
) -> Option<Color> {
    let density = sim.cell_density(coord.i as i32, coord.j as i32, coord.k as i32);
    if density < config.min_density {
        return None;
    }

    let incident = incident_color(sim, &coord.as_vec3(), snapshot, config);
    let transparency = (-optical_length(density, config.optical_length_factor)).exp();
    let view_dir = (snapshot.camera_position - world_position)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(Vec3::zeros);
    let scatter = (1.0 - transparency)
        * phase(&snapshot.light_direction, &view_dir)
        * config.scatter_factor;

    Some((incident + incident * scatter).with_alpha(1.0 - transparency))
}
