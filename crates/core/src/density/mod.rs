//! Cellular-automaton cloud density field
//!
//! Implements the humidity/activation/cloud automaton of Dobashi et al.,
//! "A Simple, Efficient Method for Realistic Animation of Clouds" (SIGGRAPH 2000),
//! restricted to an ellipsoidal working set and smoothed into a continuous
//! density with a 3x3x3 box filter.
//!
//! Two automaton phases are kept. Rendering reads either the committed (last)
//! phase or a cross-fade toward the next phase, so the binary automaton
//! animates smoothly between steps.

mod automaton;
pub mod shape;
mod simulator;

pub use shape::Ellipsoid;
pub use simulator::DensityFieldSimulator;
