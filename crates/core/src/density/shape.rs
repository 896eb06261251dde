//! Seed shapes that select the simulated working set

use crate::core_types::Vec3;
use crate::grid::{GridCoord, GridDims};
use serde::{Deserialize, Serialize};

/// Axis-aligned ellipsoid in grid space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub center: Vec3,
    pub radii: Vec3,
}

impl Ellipsoid {
    pub fn new(center: Vec3, radii: Vec3) -> Self {
        Self { center, radii }
    }

    /// Ellipsoid centred in the grid with radii equal to the half-extents
    pub fn inscribed(dims: &GridDims) -> Self {
        let half = dims.half_extents();
        Self::new(half, half)
    }

    /// Normalized squared distance of a cell from the centre; `< 1` is inside
    ///
    /// An axis with a non-positive radius contributes nothing, so a flat
    /// ellipsoid selects cells by its remaining axes only.
    pub fn normalized_distance(&self, coord: GridCoord) -> f64 {
        let p = [coord.i as f64, coord.j as f64, coord.k as f64];
        (0..3)
            .map(|axis| {
                let r = f64::from(self.radii[axis]);
                if r > 0.0 {
                    let d = p[axis] - f64::from(self.center[axis]);
                    d * d / (r * r)
                } else {
                    0.0
                }
            })
            .sum()
    }
}
