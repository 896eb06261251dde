//! Grid storage shared by the density simulator and the particle pool
//!
//! Every per-cell array is a [`CellField`] built from the same [`GridDims`],
//! so all of them agree on one linearization of `(i, j, k)`.

pub mod cell_field;
pub mod dims;
pub mod phase_buffer;

// Re-export main types
pub use cell_field::CellField;
pub use dims::{GridCoord, GridDims};
pub use phase_buffer::PhaseBuffer;
