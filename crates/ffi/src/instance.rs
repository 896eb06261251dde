use cloud_sim_core::{
    CloudConfig, CloudProperties, CloudQuality, CloudScatteringEngine, Color, EmitterTemplateId,
    FrameContext, Vec3,
};
use std::ptr;

use crate::emitter::{CloudEmitterCallbacks, EmitterVTable, HostEmitter};
use crate::error::{CloudSimErrorCode, DefaultCloudSimError};
use crate::helpers::{clear_last_error, track_error, track_result};
use crate::particles::CloudParticleState;

/// World-space description of a cloud.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CloudSimProperties {
    pub length: f32,
    pub width: f32,
    pub height: f32,
    pub cell_size: f32,
    /// Seconds per automaton phase; exactly 1.0 pauses evolution.
    pub evolving_speed: f32,
    /// World position of grid cell (0, 0, 0).
    pub position: [f32; 3],
    pub emitter_template: u32,
}

impl From<&CloudSimProperties> for CloudProperties {
    fn from(p: &CloudSimProperties) -> Self {
        Self {
            length: p.length,
            width: p.width,
            height: p.height,
            cell_size: p.cell_size,
            evolving_speed: p.evolving_speed,
            position: Vec3::from(p.position),
            emitter_template: p.emitter_template,
        }
    }
}

/// Rendering quality preset.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudSimQuality {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl From<CloudSimQuality> for CloudQuality {
    fn from(q: CloudSimQuality) -> Self {
        match q {
            CloudSimQuality::Low => Self::Low,
            CloudSimQuality::Medium => Self::Medium,
            CloudSimQuality::High => Self::High,
        }
    }
}

/// Creation options layered over the quality preset.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CloudSimOptions {
    pub quality: CloudSimQuality,
    /// Seed for the automaton; ignored unless `use_seed` is true.
    pub seed: u64,
    pub use_seed: bool,
    /// Maintain a back-to-front draw order every update.
    pub sort_particles: bool,
}

impl From<&CloudSimOptions> for CloudConfig {
    fn from(o: &CloudSimOptions) -> Self {
        Self {
            seed: o.use_seed.then_some(o.seed),
            sort_particles: o.sort_particles,
            ..CloudQuality::from(o.quality).config()
        }
    }
}

/// Scene inputs for one frame.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CloudSimFrame {
    /// Host clock in seconds.
    pub time: f32,
    pub wind: [f32; 3],
    /// Direction toward the light; normalized internally.
    pub light_direction: [f32; 3],
    pub light_color: [f32; 4],
    pub light_intensity: f32,
    pub camera_position: [f32; 3],
    pub camera_direction: [f32; 3],
}

impl From<&CloudSimFrame> for FrameContext {
    fn from(f: &CloudSimFrame) -> Self {
        Self {
            time: f.time,
            wind: Vec3::from(f.wind),
            light_direction: Vec3::from(f.light_direction),
            light_color: Color::from(f.light_color),
            light_intensity: f.light_intensity,
            camera_position: Vec3::from(f.camera_position),
            camera_direction: Vec3::from(f.camera_direction),
        }
    }
}

/// One animated cloud bound to host emitters.
///
/// # Threading
/// Emitter callbacks run on whichever thread calls `cloud_sim_advance_time`,
/// `cloud_sim_prepare_render` or `cloud_sim_destroy`. Use an instance from one
/// thread at a time; separate instances are independent.
pub struct CloudSimInstance {
    pub(crate) engine: CloudScatteringEngine<HostEmitter>,
    /// Reused buffer for `cloud_sim_get_particles`.
    pub(crate) particle_snapshot: Vec<CloudParticleState>,
}

impl CloudSimInstance {
    /// Creates a cloud and one host emitter per particle.
    ///
    /// # Errors
    ///
    /// Returns `MissingCallback` for an incomplete callback table, otherwise
    /// the mapped core setup error.
    pub(crate) fn new(
        properties: &CloudSimProperties,
        options: &CloudSimOptions,
        frame: &CloudSimFrame,
        callbacks: &CloudEmitterCallbacks,
    ) -> Result<Box<Self>, DefaultCloudSimError> {
        let vtable = EmitterVTable::new(callbacks)?;
        let mut factory = |template: EmitterTemplateId| vtable.create(template);
        let engine = CloudScatteringEngine::new(
            properties.into(),
            options.into(),
            &frame.into(),
            &mut factory,
        )?;

        Ok(Box::new(Self {
            engine,
            particle_snapshot: Vec::new(),
        }))
    }
}

/// Reborrow an instance pointer, recording a null-pointer error.
///
/// # Safety
/// `ptr` must be null or a live pointer returned by `cloud_sim_new`.
pub(crate) unsafe fn instance_mut<'a>(
    ptr: *mut CloudSimInstance,
) -> Result<&'a mut CloudSimInstance, CloudSimErrorCode> {
    // SAFETY: guaranteed by the caller.
    unsafe { ptr.as_mut() }.ok_or_else(|| track_error(&DefaultCloudSimError::null_pointer("instance")))
}

/// Read a frame pointer, recording a null-pointer error.
///
/// # Safety
/// `frame` must be null or point to a readable `CloudSimFrame`.
pub(crate) unsafe fn read_frame(frame: *const CloudSimFrame) -> Result<FrameContext, CloudSimErrorCode> {
    // SAFETY: guaranteed by the caller.
    unsafe { frame.as_ref() }
        .map(FrameContext::from)
        .ok_or_else(|| track_error(&DefaultCloudSimError::null_pointer("frame")))
}

/// Create a cloud, its particles, and one host emitter per particle.
///
/// Parameters
/// - `properties`: Cloud extents, cell size, evolving speed and position.
/// - `options`: Quality preset, optional seed, particle sorting.
/// - `frame`: Scene state at creation; its `time` starts the first phase.
/// - `callbacks`: Host emitter callbacks. `create`, `set_position`, `set_tint`
///   and `set_active` are required.
/// - `out_instance`: Receives the instance on success, null on failure.
///
/// Returns
/// - `CloudSimErrorCode::Ok` (0) on success
/// - `NullPointer` if any pointer argument is null
/// - `MissingCallback`, `InvalidCloudProperties`, `AllocationFailed` or
///   `EmitterUnavailable` on setup failure; emitters created before the failure
///   are released
///
/// # Safety
///
/// - All pointer arguments must be valid for reads (or writes for `out_instance`).
/// - The callbacks and `user_data` must remain valid until `cloud_sim_destroy`.
/// - The caller MUST call `cloud_sim_destroy` exactly once on the returned instance.
///
/// Example (C++)
/// ```cpp
/// CloudSimInstance* cloud = nullptr;
/// if (cloud_sim_new(&props, &options, &frame, callbacks, &cloud) != CloudSimErrorCode::Ok) {
///     fprintf(stderr, "%s\n", cloud_sim_get_last_error());
///     return;
/// }
/// // ... per frame: cloud_sim_advance_time, cloud_sim_prepare_render ...
/// cloud_sim_destroy(cloud);
/// ```
#[no_mangle]
pub unsafe extern "C" fn cloud_sim_new(
    properties: *const CloudSimProperties,
    options: *const CloudSimOptions,
    frame: *const CloudSimFrame,
    callbacks: CloudEmitterCallbacks,
    out_instance: *mut *mut CloudSimInstance,
) -> CloudSimErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultCloudSimError::null_pointer("out_instance"));
    }
    unsafe {
        *out_instance = ptr::null_mut();
    }

    // SAFETY: the caller guarantees each pointer is null or readable.
    let Some(properties) = (unsafe { properties.as_ref() }) else {
        return track_error(&DefaultCloudSimError::null_pointer("properties"));
    };
    let Some(options) = (unsafe { options.as_ref() }) else {
        return track_error(&DefaultCloudSimError::null_pointer("options"));
    };
    let Some(frame) = (unsafe { frame.as_ref() }) else {
        return track_error(&DefaultCloudSimError::null_pointer("frame"));
    };

    match track_result(CloudSimInstance::new(properties, options, frame, &callbacks)) {
        Ok(instance) => {
            unsafe {
                *out_instance = Box::into_raw(instance);
            }
            CloudSimErrorCode::Ok
        }
        Err(code) => code,
    }
}

/// Destroy a cloud created by `cloud_sim_new`.
///
/// Every emitter is deactivated and then released. A null pointer is a no-op.
///
/// # Safety
/// - The pointer MUST have been created by `cloud_sim_new` and not freed already.
/// - The caller must not use the pointer again.
#[no_mangle]
pub unsafe extern "C" fn cloud_sim_destroy(ptr: *mut CloudSimInstance) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: the pointer came from `Box::into_raw` in `cloud_sim_new` and
    // has not been freed; dropping the Box runs the engine's teardown.
    unsafe {
        drop(Box::from_raw(ptr));
    }
}

/// Advance automaton, wind advection and (throttled) particle lighting.
///
/// Call once per frame from the update phase. Colours are recomputed on
/// every `color_update_interval`-th call (0 behaves like 1).
///
/// # Safety
/// `instance` must be a live instance; `frame` must be readable.
#[no_mangle]
pub unsafe extern "C" fn cloud_sim_advance_time(
    instance: *mut CloudSimInstance,
    frame: *const CloudSimFrame,
    color_update_interval: u32,
) -> CloudSimErrorCode {
    let result = unsafe { instance_mut(instance) }.and_then(|instance| {
        let frame = unsafe { read_frame(frame) }?;
        instance.engine.advance_time(&frame, color_update_interval);
        Ok(())
    });
    finish(result)
}

/// Push particle positions and colours to the host emitters.
///
/// # Safety
/// `instance` must be a live instance; `frame` must be readable.
#[no_mangle]
pub unsafe extern "C" fn cloud_sim_prepare_render(
    instance: *mut CloudSimInstance,
    frame: *const CloudSimFrame,
) -> CloudSimErrorCode {
    let result = unsafe { instance_mut(instance) }.and_then(|instance| {
        let frame = unsafe { read_frame(frame) }?;
        instance.engine.prepare_render(&frame);
        Ok(())
    });
    finish(result)
}

/// Change seconds per automaton phase; 1.0 pauses evolution.
///
/// # Safety
/// `instance` must be a live instance.
#[no_mangle]
pub unsafe extern "C" fn cloud_sim_set_evolving_speed(
    instance: *mut CloudSimInstance,
    speed: f32,
) -> CloudSimErrorCode {
    if !speed.is_finite() {
        return track_error(&DefaultCloudSimError::invalid_parameter(format!(
            "evolving speed must be finite, got {speed}"
        )));
    }
    let result = unsafe { instance_mut(instance) }.map(|instance| {
        instance.engine.set_evolving_speed(speed);
    });
    finish(result)
}

/// Write the advected world position of grid cell (0, 0, 0) to `out_position`.
///
/// # Safety
/// `instance` must be a live instance; `out_position` must point to 3 writable floats.
#[no_mangle]
pub unsafe extern "C" fn cloud_sim_get_origin(
    instance: *mut CloudSimInstance,
    out_position: *mut [f32; 3],
) -> CloudSimErrorCode {
    if out_position.is_null() {
        return track_error(&DefaultCloudSimError::null_pointer("out_position"));
    }
    let result = unsafe { instance_mut(instance) }.map(|instance| {
        let origin = instance.engine.origin();
        unsafe {
            *out_position = [origin.x, origin.y, origin.z];
        }
    });
    finish(result)
}

/// Distance from `camera_position` of the last frame to the cloud centre.
///
/// Returns a negative value if `instance` is null.
///
/// # Safety
/// `instance` must be null or a live instance.
#[no_mangle]
pub unsafe extern "C" fn cloud_sim_get_view_distance(instance: *mut CloudSimInstance) -> f32 {
    match unsafe { instance_mut(instance) } {
        Ok(instance) => {
            clear_last_error();
            instance.engine.view_distance()
        }
        Err(_) => -1.0,
    }
}

fn finish(result: Result<(), CloudSimErrorCode>) -> CloudSimErrorCode {
    match result {
        Ok(()) => {
            clear_last_error();
            CloudSimErrorCode::Ok
        }
        Err(code) => code,
    }
}
