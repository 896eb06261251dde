//! Error type for cloud setup
//!
//! Only construction can fail. Every per-frame operation (automaton steps,
//! density queries, ray marching) is total and degrades to zero density for
//! out-of-grid queries instead of erroring.

use std::collections::TryReserveError;
use thiserror::Error;

/// Failure while setting up a cloud, its simulator, or a cloud manager
#[derive(Debug, Error)]
pub enum CloudError {
    /// A grid dimension was zero or the cell count overflowed `usize`
    #[error("invalid grid dimensions {length}x{width}x{height}")]
    InvalidDimensions {
        length: usize,
        width: usize,
        height: usize,
    },

    /// A world-space property or tunable was non-finite or out of range
    #[error("invalid cloud property '{name}': {reason}")]
    InvalidProperties { name: &'static str, reason: String },

    /// A per-cell or per-particle buffer could not be allocated
    #[error("failed to allocate {what} ({len} elements)")]
    Allocation {
        what: &'static str,
        len: usize,
        #[source]
        source: TryReserveError,
    },

    /// The host could not provide an emitter for a particle
    #[error("emitter template {template} unavailable for particle {particle}")]
    EmitterUnavailable { template: u32, particle: usize },

    /// The worker pool for parallel cloud updates could not be built
    #[error("failed to build cloud worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl CloudError {
    pub(crate) fn invalid_property(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidProperties {
            name,
            reason: reason.into(),
        }
    }
}
