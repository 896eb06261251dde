//! Owned per-cell storage
//!
//! Stores one value per grid cell as a flat `Vec<T>` in the order defined by
//! [`GridDims::index`]. Construction reserves fallibly so an oversized grid
//! surfaces as a `CloudError` instead of aborting the process.

use super::dims::{GridCoord, GridDims};
use crate::error::CloudError;
use std::ops::{Index, IndexMut};

/// Field data container for one per-cell quantity
#[derive(Debug, Clone, PartialEq)]
pub struct CellField<T> {
    data: Vec<T>,
    dims: GridDims,
}

impl<T: Clone> CellField<T> {
    /// Create a field with every cell set to `value`
    ///
    /// # Arguments
    ///
    /// * `dims` - Grid shape
    /// * `value` - Initial value for all cells
    /// * `what` - Field name reported if the allocation fails
    ///
    /// # Errors
    ///
    /// Returns `CloudError::Allocation` if the buffer cannot be reserved.
    pub fn try_filled(dims: GridDims, value: T, what: &'static str) -> Result<Self, CloudError> {
        let len = dims.cell_count();
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|source| CloudError::Allocation { what, len, source })?;
        data.resize(len, value);
        Ok(Self { data, dims })
    }

    /// Set every cell to `value`
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T: Clone + Default> CellField<T> {
    /// Create a field initialized to `T::default()`
    ///
    /// # Errors
    ///
    /// Returns `CloudError::Allocation` if the buffer cannot be reserved.
    pub fn try_new(dims: GridDims, what: &'static str) -> Result<Self, CloudError> {
        Self::try_filled(dims, T::default(), what)
    }
}

impl<T> CellField<T> {
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Value at a signed coordinate, `None` outside the grid
    #[inline]
    pub fn get(&self, i: i32, j: i32, k: i32) -> Option<&T> {
        self.dims.checked_index(i, j, k).map(|idx| &self.data[idx])
    }

    /// Value at an in-range coordinate
    #[inline]
    pub fn at(&self, coord: GridCoord) -> &T {
        &self.data[self.dims.index_of(coord)]
    }
}

impl<T> Index<usize> for CellField<T> {
    type Output = T;

    #[inline(always)]
    fn index(&self, idx: usize) -> &T {
        &self.data[idx]
    }
}

impl<T> IndexMut<usize> for CellField<T> {
    #[inline(always)]
    fn index_mut(&mut self, idx: usize) -> &mut T {
        &mut self.data[idx]
    }
}
