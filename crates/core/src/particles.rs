//! Cloud particles: one lightweight record per in-volume cell
//!
//! World positions live in the pool rather than in each particle so the whole
//! set can be double-buffered. Advection writes the back buffer from the
//! front buffer and then commits it with a flip, so a position read always
//! returns a fully advected frame.

use crate::core_types::{Color, Vec3};
use crate::error::CloudError;
use crate::grid::{GridCoord, PhaseBuffer};
use serde::{Deserialize, Serialize};

/// Wraps positions that drift below a floor back up by a fixed offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalWrap {
    pub floor: f32,
    pub offset: f32,
}

impl VerticalWrap {
    #[inline]
    pub fn apply(&self, p: &mut Vec3) {
        if p.z < self.floor {
            p.z += self.offset;
        }
    }
}

/// Per-cell render record
#[derive(Debug, Clone, PartialEq)]
pub struct CloudParticle {
    coord: GridCoord,
    index: usize,
    pub(crate) scattering_color: Color,
    pub(crate) visible: bool,
}

impl CloudParticle {
    fn new(coord: GridCoord, index: usize) -> Self {
        Self {
            coord,
            index,
            scattering_color: Color::WHITE,
            visible: false,
        }
    }

    /// Grid cell this particle represents
    pub fn coord(&self) -> GridCoord {
        self.coord
    }

    /// Slot in the pool (and in the emitter list)
    pub fn index(&self) -> usize {
        self.index
    }

    /// Last computed scattering colour
    pub fn scattering_color(&self) -> Color {
        self.scattering_color
    }

    /// False when the cell's density fell below the visibility threshold
    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Flat particle collection with double-buffered world positions
#[derive(Debug, Clone)]
pub struct CloudParticlePool {
    particles: Vec<CloudParticle>,
    positions: PhaseBuffer<Vec<Vec3>>,
    view_distances: Vec<f32>,
    draw_order: Vec<usize>,
}

impl CloudParticlePool {
    /// Create one particle per cell, placed at `origin + cell_size * (i, j, k)`
    ///
    /// # Errors
    ///
    /// Returns `CloudError::Allocation` if the particle buffers cannot be reserved.
    pub fn generate(
        cells: impl ExactSizeIterator<Item = GridCoord>,
        origin: Vec3,
        cell_size: f32,
    ) -> Result<Self, CloudError> {
        let len = cells.len();
        let mut particles = Vec::new();
        let mut positions = Vec::new();
        particles
            .try_reserve_exact(len)
            .map_err(|source| CloudError::Allocation {
                what: "cloud particles",
                len,
                source,
            })?;
        positions
            .try_reserve_exact(len)
            .map_err(|source| CloudError::Allocation {
                what: "particle positions",
                len,
                source,
            })?;

        for (index, coord) in cells.enumerate() {
            particles.push(CloudParticle::new(coord, index));
            positions.push(origin + coord.as_vec3() * cell_size);
        }

        Ok(Self {
            particles,
            positions: PhaseBuffer::new(positions.clone(), positions),
            view_distances: vec![0.0; len],
            draw_order: (0..len).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[CloudParticle] {
        &self.particles
    }

    pub(crate) fn particle_mut(&mut self, index: usize) -> &mut CloudParticle {
        &mut self.particles[index]
    }

    /// Particles paired with their committed positions
    pub(crate) fn particles_with_positions_mut(
        &mut self,
    ) -> impl Iterator<Item = (&mut CloudParticle, &Vec3)> {
        self.particles.iter_mut().zip(self.positions.front())
    }

    /// Committed world position of a particle
    pub fn position(&self, index: usize) -> Vec3 {
        self.positions.front()[index]
    }

    /// World position one advection earlier
    pub fn previous_position(&self, index: usize) -> Vec3 {
        self.positions.back()[index]
    }

    /// All committed positions, indexed like `particles()`
    pub fn positions(&self) -> &[Vec3] {
        self.positions.front()
    }

    /// Index of the buffer holding committed positions (0 or 1)
    pub fn current_buffer(&self) -> usize {
        self.positions.front_index()
    }

    /// Move every particle by `displacement` and commit the result
    pub fn advect(&mut self, displacement: Vec3, wrap: &VerticalWrap) {
        let (front, back) = self.positions.split_mut();
        for (dst, src) in back.iter_mut().zip(front) {
            let mut p = src + displacement;
            wrap.apply(&mut p);
            *dst = p;
        }
        self.positions.flip();
    }

    /// Order particles back-to-front along `look_dir`
    ///
    /// The distance of each particle is its projection onto the look
    /// direction relative to `reference` (usually the cloud origin).
    pub fn sort_by_view_distance(&mut self, look_dir: &Vec3, reference: &Vec3) {
        for (dist, pos) in self.view_distances.iter_mut().zip(self.positions.front()) {
            *dist = look_dir.dot(&(pos - reference));
        }
        let distances = &self.view_distances;
        self.draw_order
            .sort_by(|&a, &b| distances[b].total_cmp(&distances[a]));
    }

    /// Particle indices in draw order (identity until sorted)
    pub fn draw_order(&self) -> &[usize] {
        &self.draw_order
    }

    /// View distance computed by the last sort
    pub fn view_distance(&self, index: usize) -> f32 {
        self.view_distances[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const NO_WRAP: VerticalWrap = VerticalWrap {
        floor: f32::NEG_INFINITY,
        offset: 0.0,
    };

    fn pool() -> CloudParticlePool {
        let cells = vec![
            GridCoord::new(0, 0, 0),
            GridCoord::new(1, 0, 0),
            GridCoord::new(0, 2, 3),
        ];
        CloudParticlePool::generate(cells.into_iter(), Vec3::new(10.0, 0.0, 5.0), 2.0).unwrap()
    }

    #[test]
    fn test_generate_places_particles_on_cells() {
        let pool = pool();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.position(2), Vec3::new(10.0, 4.0, 11.0));
        assert_eq!(pool.previous_position(2), pool.position(2));
        assert_eq!(pool.particles()[2].index(), 2);
        assert_eq!(pool.particles()[2].coord(), GridCoord::new(0, 2, 3));
    }

    #[test]
    fn test_advect_commits_and_keeps_previous() {
        let mut pool = pool();
        let before = pool.positions().to_vec();
        let buffer = pool.current_buffer();
        pool.advect(Vec3::new(2.0, 0.0, 0.0), &NO_WRAP);
        assert_ne!(pool.current_buffer(), buffer);
        for (i, old) in before.iter().enumerate() {
            assert_relative_eq!(pool.position(i), old + Vec3::new(2.0, 0.0, 0.0));
            assert_eq!(pool.previous_position(i), *old);
        }
    }

    #[test]
    fn test_advect_wraps_below_floor() {
        let mut pool = pool();
        let wrap = VerticalWrap {
            floor: 0.0,
            offset: 100.0,
        };
        pool.advect(Vec3::new(0.0, 0.0, -6.0), &wrap);
        // z: 5 - 6 = -1 -> wrapped to 99; 11 - 6 = 5 stays
        assert_relative_eq!(pool.position(0).z, 99.0);
        assert_relative_eq!(pool.position(2).z, 5.0);
    }

    #[test]
    fn test_sort_back_to_front() {
        let mut pool = pool();
        let look = Vec3::new(1.0, 0.0, 0.0);
        pool.sort_by_view_distance(&look, &Vec3::new(10.0, 0.0, 5.0));
        // Particle 1 sits furthest along +x
        assert_eq!(pool.draw_order()[0], 1);
        assert_relative_eq!(pool.view_distance(1), 2.0);
    }
}
