//! Owns many clouds and advances them in parallel
//!
//! Simulation and lighting run on a rayon pool because every cloud only
//! touches its own state. Emitter updates stay on the calling thread since
//! host renderers usually require it.

use crate::config::{CloudConfig, CloudQuality};
use crate::error::CloudError;
use crate::scattering::{
    CloudProperties, CloudScatteringEngine, EmitterFactory, FrameContext, ParticleEmitter,
};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// Handle returned by [`CloudManager::add_cloud`]
pub type CloudId = u32;

/// A set of clouds sharing one quality level and worker pool
pub struct CloudManager<E: ParticleEmitter> {
    clouds: FxHashMap<CloudId, CloudScatteringEngine<E>>,
    next_id: CloudId,
    quality: CloudQuality,
    pool: Option<ThreadPool>,
}

impl<E: ParticleEmitter> CloudManager<E> {
    /// Create an empty manager
    ///
    /// # Arguments
    ///
    /// * `num_threads` - Worker threads for parallel updates, 0 to use rayon's global pool
    /// * `quality` - Sets the colour refresh interval and default sample length
    ///
    /// # Errors
    ///
    /// Returns `CloudError::ThreadPool` if a dedicated pool cannot be built.
    pub fn new(num_threads: usize, quality: CloudQuality) -> Result<Self, CloudError> {
        let pool = if num_threads == 0 {
            None
        } else {
            let pool = ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("cloud-worker-{i}"))
                .build()?;
            info!("Cloud manager using {} worker threads", num_threads);
            Some(pool)
        };

        Ok(Self {
            clouds: FxHashMap::default(),
            next_id: 0,
            quality,
            pool,
        })
    }

    /// Create a cloud with the manager's quality defaults
    ///
    /// # Errors
    ///
    /// Propagates any setup failure from [`CloudScatteringEngine::new`].
    pub fn add_cloud<F>(
        &mut self,
        properties: CloudProperties,
        frame: &FrameContext,
        factory: &mut F,
    ) -> Result<CloudId, CloudError>
    where
        F: EmitterFactory<Emitter = E>,
    {
        self.add_cloud_with_config(properties, self.quality.config(), frame, factory)
    }

    /// Create a cloud with explicit tunables
    ///
    /// # Errors
    ///
    /// Propagates any setup failure from [`CloudScatteringEngine::new`].
    pub fn add_cloud_with_config<F>(
        &mut self,
        properties: CloudProperties,
        config: CloudConfig,
        frame: &FrameContext,
        factory: &mut F,
    ) -> Result<CloudId, CloudError>
    where
        F: EmitterFactory<Emitter = E>,
    {
        let engine = CloudScatteringEngine::new(properties, config, frame, factory)?;
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        debug!("Added cloud {} ({} particles)", id, engine.particles().len());
        self.clouds.insert(id, engine);
        Ok(id)
    }

    /// Remove and drop a cloud, deactivating its emitters
    pub fn remove_cloud(&mut self, id: CloudId) -> bool {
        self.clouds.remove(&id).is_some()
    }

    pub fn cloud(&self, id: CloudId) -> Option<&CloudScatteringEngine<E>> {
        self.clouds.get(&id)
    }

    pub fn cloud_mut(&mut self, id: CloudId) -> Option<&mut CloudScatteringEngine<E>> {
        self.clouds.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.clouds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clouds.is_empty()
    }

    pub fn quality(&self) -> CloudQuality {
        self.quality
    }

    pub fn set_quality(&mut self, quality: CloudQuality) {
        self.quality = quality;
    }

    /// Push every cloud's particles to its emitters
    pub fn prepare_render(&mut self, frame: &FrameContext) {
        for engine in self.clouds.values_mut() {
            engine.prepare_render(frame);
        }
    }

    /// Cloud ids ordered far-to-near from the camera
    pub fn clouds_by_view_distance(&self) -> Vec<CloudId> {
        let mut ordered: Vec<(CloudId, f32)> = self
            .clouds
            .iter()
            .map(|(&id, engine)| (id, engine.view_distance()))
            .collect();
        ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ordered.into_iter().map(|(id, _)| id).collect()
    }

    /// Total particles across all clouds
    pub fn particle_count(&self) -> usize {
        self.clouds.values().map(|c| c.particles().len()).sum()
    }
}

impl<E: ParticleEmitter + Send> CloudManager<E> {
    /// Advance every cloud in parallel
    pub fn advance_time(&mut self, frame: &FrameContext) {
        let interval = self.quality.color_update_interval();
        match &self.pool {
            Some(pool) => pool.install(|| advance_all(&mut self.clouds, frame, interval)),
            None => advance_all(&mut self.clouds, frame, interval),
        }
    }
}

fn advance_all<E: ParticleEmitter + Send>(
    clouds: &mut FxHashMap<CloudId, CloudScatteringEngine<E>>,
    frame: &FrameContext,
    interval: u32,
) {
    clouds
        .par_iter_mut()
        .for_each(|(_, engine)| engine.advance_time(frame, interval));
}
