//! Tunables for the density automaton and the scattering model
//!
//! `CloudConfig::default()` carries the reference constants. `CloudQuality`
//! presets trade ray-march resolution against per-frame cost the same way grid
//! quality presets trade resolution for speed.

use crate::error::CloudError;
use serde::{Deserialize, Serialize};

/// Grid offsets whose activation state seeds a cell's neighbour-activation flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborOffsets(pub Vec<[i32; 3]>);

impl NeighborOffsets {
    /// Reference offset set. There is no `(0, 0, +2)` entry, so activation
    /// spreads two cells downward but only one cell upward.
    pub const REFERENCE: [[i32; 3]; 11] = [
        [1, 0, 0],
        [0, 1, 0],
        [0, 0, 1],
        [-1, 0, 0],
        [0, -1, 0],
        [0, 0, -1],
        [-2, 0, 0],
        [2, 0, 0],
        [0, -2, 0],
        [0, 2, 0],
        [0, 0, -2],
    ];

    /// Reference set plus `(0, 0, +2)`
    pub const SYMMETRIC: [[i32; 3]; 12] = [
        [1, 0, 0],
        [0, 1, 0],
        [0, 0, 1],
        [-1, 0, 0],
        [0, -1, 0],
        [0, 0, -1],
        [-2, 0, 0],
        [2, 0, 0],
        [0, -2, 0],
        [0, 2, 0],
        [0, 0, -2],
        [0, 0, 2],
    ];

    pub fn reference() -> Self {
        Self(Self::REFERENCE.to_vec())
    }

    pub fn symmetric() -> Self {
        Self(Self::SYMMETRIC.to_vec())
    }

    pub fn as_slice(&self) -> &[[i32; 3]] {
        &self.0
    }
}

impl Default for NeighborOffsets {
    fn default() -> Self {
        Self::reference()
    }
}

/// Simulation and lighting tunables for one cloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Ray-march step toward the light, in grid cells
    pub sample_length: f32,
    /// Optical depth per unit density (Beer-Lambert exponent scale)
    pub optical_length_factor: f32,
    /// Cells below this density render as fully transparent
    pub min_density: f32,
    /// Strength of the single-scatter term
    pub scatter_factor: f32,
    /// Fraction of incident light kept regardless of occlusion at each march step
    pub incident_blend: f32,
    /// Automaton steps between vapour supplies
    pub supply_interval: u32,
    /// Hard cap on in-volume cells (and therefore particles)
    pub max_cells_in_volume: usize,
    /// Neighbourhood used for activation spread
    pub neighbor_offsets: NeighborOffsets,
    /// Vertical world coordinate below which advected positions wrap
    pub wrap_floor: f32,
    /// Amount added to a vertical coordinate that fell below `wrap_floor`
    pub wrap_offset: f32,
    /// Frame counter ceiling for throttled colour updates
    pub color_counter_ceiling: u32,
    /// Sort particles back-to-front along the camera direction every frame
    pub sort_particles: bool,
    /// Seed for the automaton RNG; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            sample_length: 0.5,
            optical_length_factor: 1.5,
            min_density: 0.05,
            scatter_factor: 0.6,
            incident_blend: 0.8,
            supply_interval: 10,
            max_cells_in_volume: 2500,
            neighbor_offsets: NeighborOffsets::reference(),
            wrap_floor: -1000.0,
            wrap_offset: 1500.0,
            color_counter_ceiling: 1000,
            sort_particles: false,
            seed: None,
        }
    }
}

impl CloudConfig {
    /// Check every tunable is finite and in range
    ///
    /// # Errors
    ///
    /// Returns `CloudError::InvalidProperties` naming the first bad field.
    pub fn validate(&self) -> Result<(), CloudError> {
        if !(self.sample_length.is_finite() && self.sample_length > 0.0) {
            return Err(CloudError::invalid_property(
                "sample_length",
                format!("must be finite and positive, got {}", self.sample_length),
            ));
        }
        if !(self.optical_length_factor.is_finite() && self.optical_length_factor >= 0.0) {
            return Err(CloudError::invalid_property(
                "optical_length_factor",
                format!(
                    "must be finite and non-negative, got {}",
                    self.optical_length_factor
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_density) {
            return Err(CloudError::invalid_property(
                "min_density",
                format!("must lie in [0, 1], got {}", self.min_density),
            ));
        }
        if !self.scatter_factor.is_finite() {
            return Err(CloudError::invalid_property(
                "scatter_factor",
                format!("must be finite, got {}", self.scatter_factor),
            ));
        }
        if !(0.0..=1.0).contains(&self.incident_blend) {
            return Err(CloudError::invalid_property(
                "incident_blend",
                format!("must lie in [0, 1], got {}", self.incident_blend),
            ));
        }
        if self.max_cells_in_volume == 0 {
            return Err(CloudError::invalid_property(
                "max_cells_in_volume",
                "must be positive",
            ));
        }
        if !(self.wrap_floor.is_finite() && self.wrap_offset.is_finite() && self.wrap_offset > 0.0)
        {
            return Err(CloudError::invalid_property(
                "wrap_offset",
                format!(
                    "floor and offset must be finite with a positive offset, got {} / {}",
                    self.wrap_floor, self.wrap_offset
                ),
            ));
        }
        if self.color_counter_ceiling == 0 {
            return Err(CloudError::invalid_property(
                "color_counter_ceiling",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Lighting quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudQuality {
    /// Coarse march (one cell per sample), colours refreshed every 8 frames
    Low,
    /// Half-cell march, colours refreshed every 4 frames
    Medium,
    /// Quarter-cell march, colours refreshed every frame
    High,
}

impl CloudQuality {
    /// Ray-march sample length in grid cells for this preset
    pub const fn sample_length(&self) -> f32 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 0.5,
            Self::High => 0.25,
        }
    }

    /// Frames between full scattering-colour refreshes
    pub const fn color_update_interval(&self) -> u32 {
        match self {
            Self::Low => 8,
            Self::Medium => 4,
            Self::High => 1,
        }
    }

    /// Default configuration with this preset's march resolution
    pub fn config(&self) -> CloudConfig {
        CloudConfig {
            sample_length: self.sample_length(),
            ..CloudConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CloudConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_cells_in_volume, 2500);
        assert_eq!(config.neighbor_offsets.as_slice().len(), 11);
    }

    #[test]
    fn test_reference_offsets_lack_upward_two() {
        let offsets = NeighborOffsets::reference();
        assert!(!offsets.as_slice().contains(&[0, 0, 2]));
        assert!(offsets.as_slice().contains(&[0, 0, -2]));
        assert!(NeighborOffsets::symmetric().as_slice().contains(&[0, 0, 2]));
    }

    #[test]
    fn test_validate_rejects_bad_sample_length() {
        let config = CloudConfig {
            sample_length: 0.0,
            ..CloudConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CloudError::InvalidProperties {
                name: "sample_length",
                ..
            })
        ));
    }

    #[test]
    fn test_quality_presets() {
        assert!(CloudQuality::High.sample_length() < CloudQuality::Low.sample_length());
        assert_eq!(CloudQuality::Medium.config().sample_length, 0.5);
        assert_eq!(CloudQuality::High.color_update_interval(), 1);
    }
}
