//! Automaton passes over the in-volume cells
//!
//! Each pass walks the precomputed list of in-volume linear indices. Cells
//! outside the shape mask are never written, so they keep their seeded values.

use crate::error::CloudError;
use crate::grid::{CellField, GridDims};
use rand::Rng;

/// Dynamic state of one automaton phase
#[derive(Debug, Clone)]
pub(super) struct CellLayers {
    pub humidity: CellField<bool>,
    pub cloud: CellField<bool>,
    pub activation: CellField<bool>,
    pub density: CellField<f32>,
}

impl CellLayers {
    /// Empty humidity and activation, cloud seeded everywhere
    pub fn seeded(dims: GridDims) -> Result<Self, CloudError> {
        Ok(Self {
            humidity: CellField::try_new(dims, "humidity layer")?,
            cloud: CellField::try_filled(dims, true, "cloud layer")?,
            activation: CellField::try_new(dims, "activation layer")?,
            density: CellField::try_new(dims, "density layer")?,
        })
    }
}

/// A cell is primed to activate when any configured neighbour is active
pub(super) fn update_neighbor_activation(
    dims: &GridDims,
    volume: &[usize],
    offsets: &[[i32; 3]],
    activation: &CellField<bool>,
    out: &mut CellField<bool>,
) {
    for &idx in volume {
        let c = dims.coord(idx);
        let (i, j, k) = (c.i as i32, c.j as i32, c.k as i32);
        out[idx] = offsets
            .iter()
            .any(|[di, dj, dk]| activation.get(i + di, j + dj, k + dk) == Some(&true));
    }
}

/// Stochastic decay: each cloud cell vanishes with its extinction probability
pub(super) fn extinguish<R: Rng>(
    volume: &[usize],
    extinction: &CellField<f32>,
    cloud: &mut CellField<bool>,
    rng: &mut R,
) {
    for &idx in volume {
        let vanish = rng.random::<f32>() < extinction[idx];
        cloud[idx] = cloud[idx] && !vanish;
    }
}

/// Deterministic growth rules from `other` into `target`
pub(super) fn grow(
    volume: &[usize],
    other: &CellLayers,
    target: &mut CellLayers,
    neighbor_activation: &CellField<bool>,
) {
    for &idx in volume {
        let act = other.activation[idx];
        let hum = other.humidity[idx];
        target.activation[idx] = !act && hum && neighbor_activation[idx];
        target.humidity[idx] = hum && !act;
        target.cloud[idx] = other.cloud[idx] || act;
    }
}

/// Inject fresh humidity and activation into `target`
pub(super) fn supply_vapor<R: Rng>(
    volume: &[usize],
    humidity_probability: &CellField<f32>,
    activation_probability: &CellField<f32>,
    target: &mut CellLayers,
    rng: &mut R,
) {
    for &idx in volume {
        let hum = target.humidity[idx] || rng.random::<f32>() < humidity_probability[idx];
        target.humidity[idx] = hum;
        target.activation[idx] = hum
            && (target.activation[idx] || rng.random::<f32>() < activation_probability[idx]);
    }
}

/// Smooth the binary cloud layer into density with a 27-cell box average
///
/// Samples outside the grid count as empty, so density stays in `[0, 1]`.
pub(super) fn calculate_density(
    dims: &GridDims,
    volume: &[usize],
    cloud: &CellField<bool>,
    density: &mut CellField<f32>,
) {
    for &idx in volume {
        let c = dims.coord(idx);
        let (i, j, k) = (c.i as i32, c.j as i32, c.k as i32);
        let mut filled = 0_u32;
        for p in i - 1..=i + 1 {
            for q in j - 1..=j + 1 {
                for r in k - 1..=k + 1 {
                    if cloud.get(p, q, r) == Some(&true) {
                        filled += 1;
                    }
                }
            }
        }
        density[idx] = filled as f32 / 27.0;
    }
}

/// Cross-fade two density layers into `out`
pub(super) fn blend_density(
    volume: &[usize],
    last: &CellField<f32>,
    next: &CellField<f32>,
    alpha: f32,
    out: &mut CellField<f32>,
) {
    for &idx in volume {
        out[idx] = (1.0 - alpha) * last[idx] + alpha * next[idx];
    }
}
