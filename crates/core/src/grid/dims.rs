//! Grid extents and the single `(i, j, k)` -> linear index mapping

use crate::core_types::Vec3;
use crate::error::CloudError;
use serde::{Deserialize, Serialize};

/// Integer cell address inside a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCoord {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl GridCoord {
    pub const fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }

    /// Cell corner in grid space
    pub fn as_vec3(&self) -> Vec3 {
        Vec3::new(self.i as f32, self.j as f32, self.k as f32)
    }
}

/// Grid extents in cells: `length` along x (i), `width` along y (j) and
/// `height` along z (k)
///
/// Cells are stored with `k` varying fastest:
/// `index = (i * width + j) * height + k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    pub length: usize,
    pub width: usize,
    pub height: usize,
}

impl GridDims {
    /// Validate extents and build the grid shape
    ///
    /// # Errors
    ///
    /// Returns `CloudError::InvalidDimensions` if any extent is zero, the cell
    /// count overflows `usize`, or an extent does not fit in `i32` (neighbour
    /// offsets are evaluated in signed space).
    pub fn new(length: usize, width: usize, height: usize) -> Result<Self, CloudError> {
        let invalid = || CloudError::InvalidDimensions {
            length,
            width,
            height,
        };
        if length == 0 || width == 0 || height == 0 {
            return Err(invalid());
        }
        if [length, width, height]
            .iter()
            .any(|&n| i32::try_from(n).is_err())
        {
            return Err(invalid());
        }
        length
            .checked_mul(width)
            .and_then(|n| n.checked_mul(height))
            .ok_or_else(invalid)?;
        Ok(Self {
            length,
            width,
            height,
        })
    }

    /// Total number of cells
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.length * self.width * self.height
    }

    /// Linear index of an in-range cell
    #[inline(always)]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.length && j < self.width && k < self.height);
        (i * self.width + j) * self.height + k
    }

    /// Linear index of a coordinate
    #[inline(always)]
    pub fn index_of(&self, coord: GridCoord) -> usize {
        self.index(coord.i, coord.j, coord.k)
    }

    /// Linear index of a possibly out-of-range signed coordinate
    #[inline(always)]
    pub fn checked_index(&self, i: i32, j: i32, k: i32) -> Option<usize> {
        if self.contains(i, j, k) {
            Some(self.index(i as usize, j as usize, k as usize))
        } else {
            None
        }
    }

    /// True when the signed coordinate addresses a cell of this grid
    #[inline(always)]
    pub fn contains(&self, i: i32, j: i32, k: i32) -> bool {
        i >= 0
            && j >= 0
            && k >= 0
            && (i as usize) < self.length
            && (j as usize) < self.width
            && (k as usize) < self.height
    }

    /// True when a fractional grid-space point lies in `[0, extent)` on every axis
    pub fn contains_point(&self, p: &Vec3) -> bool {
        p.x >= 0.0
            && p.y >= 0.0
            && p.z >= 0.0
            && p.x < self.length as f32
            && p.y < self.width as f32
            && p.z < self.height as f32
    }

    /// Coordinate of a linear index
    pub fn coord(&self, index: usize) -> GridCoord {
        let k = index % self.height;
        let rest = index / self.height;
        GridCoord::new(rest / self.width, rest % self.width, k)
    }

    /// Grid half-extents, which are also the default ellipsoid centre and radii
    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(
            self.length as f32 / 2.0,
            self.width as f32 / 2.0,
            self.height as f32 / 2.0,
        )
    }

    /// Every coordinate in storage order
    pub fn coords(&self) -> impl Iterator<Item = GridCoord> {
        let Self {
            length,
            width,
            height,
        } = *self;
        (0..length).flat_map(move |i| {
            (0..width).flat_map(move |j| (0..height).map(move |k| GridCoord::new(i, j, k)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_extent() {
        assert!(matches!(
            GridDims::new(4, 0, 4),
            Err(CloudError::InvalidDimensions { width: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(GridDims::new(usize::MAX, 2, 2).is_err());
    }

    #[test]
    fn test_index_matches_storage_order() {
        let dims = GridDims::new(3, 4, 5).unwrap();
        for (expected, coord) in dims.coords().enumerate() {
            assert_eq!(dims.index_of(coord), expected);
            assert_eq!(dims.coord(expected), coord);
        }
        assert_eq!(dims.coords().count(), dims.cell_count());
    }

    #[test]
    fn test_checked_index_bounds() {
        let dims = GridDims::new(2, 2, 2).unwrap();
        assert_eq!(dims.checked_index(1, 1, 1), Some(7));
        assert_eq!(dims.checked_index(-1, 0, 0), None);
        assert_eq!(dims.checked_index(0, 2, 0), None);
    }

    #[test]
    fn test_contains_point_is_half_open() {
        let dims = GridDims::new(4, 4, 4).unwrap();
        assert!(dims.contains_point(&Vec3::new(0.0, 3.99, 2.0)));
        assert!(!dims.contains_point(&Vec3::new(4.0, 1.0, 1.0)));
        assert!(!dims.contains_point(&Vec3::new(-0.01, 1.0, 1.0)));
    }
}
