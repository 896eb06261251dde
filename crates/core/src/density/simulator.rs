//! Density field simulator
//!
//! Owns every per-cell array, runs the automaton and answers density queries.

use super::automaton::{self, CellLayers};
use super::shape::Ellipsoid;
use crate::config::CloudConfig;
use crate::core_types::Vec3;
use crate::error::CloudError;
use crate::grid::{CellField, GridCoord, GridDims, PhaseBuffer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

/// Extinction scale applied inside the seed shape
const SEED_EXTINCTION_SCALE: f32 = 0.2;
/// Peak humidity probability contributed by a seed shape
const SEED_HUMIDITY_WEIGHT: f32 = 0.05;
/// Peak activation probability contributed by a seed shape
const SEED_ACTIVATION_WEIGHT: f32 = 0.001;

/// Which layer density queries read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CurrentDensity {
    /// The committed (last) phase
    Last,
    /// The cross-faded layer written by the most recent interpolation
    Blended,
}

/// 3-D cellular automaton producing a continuous cloud density
///
/// The phase buffer's front slot is the *last* phase and its back slot is the
/// *next* phase; `last_phase() + next_phase() == 1` always holds.
#[derive(Debug)]
pub struct DensityFieldSimulator<R = StdRng> {
    dims: GridDims,

    // Static fields, fixed once construction returns
    shape_mask: CellField<bool>,
    extinction_probability: CellField<f32>,
    humidity_probability: CellField<f32>,
    activation_probability: CellField<f32>,
    /// Linear indices of in-volume cells in storage order
    volume: Vec<usize>,

    phases: PhaseBuffer<CellLayers>,
    neighbor_activation: CellField<bool>,
    blended_density: CellField<f32>,
    current: CurrentDensity,

    neighbor_offsets: Vec<[i32; 3]>,
    supply_interval: u32,
    supply_countdown: u32,
    max_cells_in_volume: usize,
    rng: R,
}

impl DensityFieldSimulator<StdRng> {
    /// Build a simulator seeded with the grid-inscribed ellipsoid
    ///
    /// # Errors
    ///
    /// Returns `CloudError::InvalidProperties` for a bad configuration and
    /// `CloudError::Allocation` if any per-cell array cannot be allocated.
    pub fn new(dims: GridDims, config: &CloudConfig) -> Result<Self, CloudError> {
        Self::with_shapes(dims, config, &[Ellipsoid::inscribed(&dims)])
    }

    /// Build a simulator seeded with several shapes whose probabilities accumulate
    ///
    /// # Errors
    ///
    /// See [`DensityFieldSimulator::new`].
    pub fn with_shapes(
        dims: GridDims,
        config: &CloudConfig,
        shapes: &[Ellipsoid],
    ) -> Result<Self, CloudError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        DensityFieldSimulator::with_rng(dims, config, shapes, rng)
    }
}

impl<R: Rng> DensityFieldSimulator<R> {
    /// Build a simulator drawing its randomness from `rng`
    ///
    /// Allocates all arrays, seeds the cloud layer full on both phases, builds
    /// the vertical extinction gradient, applies each seed shape, then runs
    /// one automaton step and density pass to materialize the next phase.
    ///
    /// # Errors
    ///
    /// See [`DensityFieldSimulator::new`]. Arrays allocated before a failure
    /// are released on return.
    pub fn with_rng(
        dims: GridDims,
        config: &CloudConfig,
        shapes: &[Ellipsoid],
        rng: R,
    ) -> Result<Self, CloudError> {
        config
            .validate()
            .inspect_err(|e| warn!("Rejected cloud configuration: {}", e))?;

        let mut sim = Self {
            dims,
            shape_mask: CellField::try_new(dims, "shape mask")?,
            extinction_probability: CellField::try_new(dims, "extinction probability")?,
            humidity_probability: CellField::try_new(dims, "humidity probability")?,
            activation_probability: CellField::try_new(dims, "activation probability")?,
            volume: Vec::new(),
            phases: PhaseBuffer::new(CellLayers::seeded(dims)?, CellLayers::seeded(dims)?),
            neighbor_activation: CellField::try_new(dims, "neighbor activation")?,
            blended_density: CellField::try_new(dims, "blended density")?,
            current: CurrentDensity::Last,
            neighbor_offsets: config.neighbor_offsets.as_slice().to_vec(),
            supply_interval: config.supply_interval,
            supply_countdown: 0,
            max_cells_in_volume: config.max_cells_in_volume,
            rng,
        };

        sim.init_extinction_gradient();
        for shape in shapes {
            sim.seed_shape(shape);
        }
        sim.volume = (0..dims.cell_count())
            .filter(|&idx| sim.shape_mask[idx])
            .collect();

        let next = sim.next_phase();
        sim.step(next);
        sim.calculate_density(next);

        debug!(
            "Density field ready: {}x{}x{} grid, {} cells in volume",
            dims.length,
            dims.width,
            dims.height,
            sim.volume.len()
        );
        Ok(sim)
    }

    /// Clouds near the grid ceiling are far less likely to vanish than near the floor
    fn init_extinction_gradient(&mut self) {
        let top = self.dims.height - 1;
        for coord in self.dims.coords() {
            let idx = self.dims.index_of(coord);
            self.extinction_probability[idx] = (-((top - coord.k) as f32)).exp();
        }
    }

    /// Add every cell inside `shape` to the working set and blend its probabilities
    fn seed_shape(&mut self, shape: &Ellipsoid) {
        let mut in_volume = self.shape_mask.as_slice().iter().filter(|&&m| m).count();
        let mut rejected = 0_usize;

        for coord in self.dims.coords() {
            let distance = shape.normalized_distance(coord);
            if distance >= 1.0 {
                continue;
            }
            let idx = self.dims.index_of(coord);
            if !self.shape_mask[idx] {
                if in_volume >= self.max_cells_in_volume {
                    rejected += 1;
                    continue;
                }
                self.shape_mask[idx] = true;
                in_volume += 1;
            }

            let seed = (-distance).exp() as f32;
            let hum = SEED_HUMIDITY_WEIGHT * seed;
            let act = SEED_ACTIVATION_WEIGHT * seed;
            self.extinction_probability[idx] *= SEED_EXTINCTION_SCALE * (1.0 - seed);
            self.humidity_probability[idx] = self.humidity_probability[idx] * (1.0 - hum) + hum;
            self.activation_probability[idx] =
                self.activation_probability[idx] * (1.0 - act) + act;
        }

        if rejected > 0 {
            warn!(
                "Cloud volume capped at {} cells, ignoring {} more",
                self.max_cells_in_volume, rejected
            );
        }
    }

    /// Advance the automaton one step, writing phase `target` from the other phase
    pub fn step(&mut self, target: usize) {
        let other = 1 - target;
        let (source, dest) = self.phases.pair_mut(other);

        automaton::update_neighbor_activation(
            &self.dims,
            &self.volume,
            &self.neighbor_offsets,
            &source.activation,
            &mut self.neighbor_activation,
        );
        automaton::extinguish(
            &self.volume,
            &self.extinction_probability,
            &mut source.cloud,
            &mut self.rng,
        );
        automaton::grow(&self.volume, source, dest, &self.neighbor_activation);

        if self.supply_countdown == 0 {
            automaton::supply_vapor(
                &self.volume,
                &self.humidity_probability,
                &self.activation_probability,
                dest,
                &mut self.rng,
            );
            self.supply_countdown = self.supply_interval;
        } else {
            self.supply_countdown -= 1;
        }
    }

    /// Recompute the smoothed density of `phase` from its cloud layer
    pub fn calculate_density(&mut self, phase: usize) {
        let layers = self.phases.slot_mut(phase);
        automaton::calculate_density(
            &self.dims,
            &self.volume,
            &layers.cloud,
            &mut layers.density,
        );
    }

    /// Move the visible density toward the next phase
    ///
    /// * `alpha <= 0` shows the last phase.
    /// * `alpha >= 1` promotes the next phase to last, then steps the
    ///   automaton to produce a fresh next phase.
    /// * Otherwise the two phases are cross-faded.
    pub fn interpolate_density_space(&mut self, alpha: f32) {
        if alpha <= 0.0 {
            self.current = CurrentDensity::Last;
        } else if alpha >= 1.0 {
            self.phases.flip();
            self.current = CurrentDensity::Last;
            let next = self.next_phase();
            self.step(next);
            self.calculate_density(next);
            debug!("Density phase advanced, last = {}", self.last_phase());
        } else {
            let (last, next) = (self.phases.front(), self.phases.back());
            automaton::blend_density(
                &self.volume,
                &last.density,
                &next.density,
                alpha,
                &mut self.blended_density,
            );
            self.current = CurrentDensity::Blended;
        }
    }
}

impl<R> DensityFieldSimulator<R> {
    /// Density of a cell in the visible layer, 0 outside the grid
    pub fn cell_density(&self, i: i32, j: i32, k: i32) -> f32 {
        self.current_layer().get(i, j, k).copied().unwrap_or(0.0)
    }

    /// Trilinear density at a fractional grid-space point
    pub fn point_density(&self, point: &Vec3) -> f32 {
        let (fi, fj, fk) = (point.x.floor(), point.y.floor(), point.z.floor());
        let (r, s, t) = (point.x - fi, point.y - fj, point.z - fk);
        let (i, j, k) = (fi as i32, fj as i32, fk as i32);

        let d000 = self.cell_density(i, j, k);
        let d001 = self.cell_density(i, j, k + 1);
        let d010 = self.cell_density(i, j + 1, k);
        let d011 = self.cell_density(i, j + 1, k + 1);
        let d100 = self.cell_density(i + 1, j, k);
        let d101 = self.cell_density(i + 1, j, k + 1);
        let d110 = self.cell_density(i + 1, j + 1, k);
        let d111 = self.cell_density(i + 1, j + 1, k + 1);

        let z00 = (d001 - d000) * t + d000;
        let z01 = (d011 - d010) * t + d010;
        let z10 = (d101 - d100) * t + d100;
        let z11 = (d111 - d110) * t + d110;
        let x0 = (z10 - z00) * r + z00;
        let x1 = (z11 - z01) * r + z01;
        (x1 - x0) * s + x0
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Slot index of the committed phase
    pub fn last_phase(&self) -> usize {
        self.phases.front_index()
    }

    /// Slot index of the phase being approached
    pub fn next_phase(&self) -> usize {
        self.phases.back_index()
    }

    /// Number of cells in the working set
    pub fn cells_in_volume(&self) -> usize {
        self.volume.len()
    }

    /// In-volume cells in storage order
    pub fn volume_cells(&self) -> impl ExactSizeIterator<Item = GridCoord> + '_ {
        self.volume.iter().map(|&idx| self.dims.coord(idx))
    }

    pub fn is_cell_in_volume(&self, i: i32, j: i32, k: i32) -> bool {
        self.shape_mask.get(i, j, k).copied().unwrap_or(false)
    }

    /// True when a fractional grid-space point lies inside the grid
    pub fn is_point_in_space(&self, point: &Vec3) -> bool {
        self.dims.contains_point(point)
    }

    /// Density layer of one phase
    pub fn density_layer(&self, phase: usize) -> &[f32] {
        self.phases.slot(phase).density.as_slice()
    }

    /// Cloud occupancy layer of one phase
    pub fn cloud_layer(&self, phase: usize) -> &[bool] {
        self.phases.slot(phase).cloud.as_slice()
    }

    /// The layer density queries currently read
    pub fn current_density(&self) -> &[f32] {
        self.current_layer().as_slice()
    }

    /// Zero both density phases and show the last one
    #[cfg(test)]
    pub(crate) fn clear_density(&mut self) {
        self.phases.slot_mut(0).density.fill(0.0);
        self.phases.slot_mut(1).density.fill(0.0);
        self.current = CurrentDensity::Last;
    }

    fn current_layer(&self) -> &CellField<f32> {
        match self.current {
            CurrentDensity::Last => &self.phases.front().density,
            CurrentDensity::Blended => &self.blended_density,
        }
    }
}
