use cloud_sim_core::CloudParticle;
use std::ptr;

use crate::error::{CloudSimErrorCode, DefaultCloudSimError};
use crate::helpers::{clear_last_error, track_error};
use crate::instance::{instance_mut, CloudSimInstance};

#[repr(C)]
/// FFI-friendly snapshot of one cloud particle.
/// Keep this layout stable for C/C++/C# consumers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudParticleState {
    /// Grid cell of the particle.
    pub cell: [u32; 3],
    /// Committed world position.
    pub position: [f32; 3],
    /// Last computed scattering colour (linear RGBA).
    pub color: [f32; 4],
    /// False when the cell is too thin to draw.
    pub visible: bool,
}

impl CloudParticleState {
    fn new(particle: &CloudParticle, position: [f32; 3]) -> Self {
        let c = particle.coord();
        Self {
            cell: [c.i as u32, c.j as u32, c.k as u32],
            position,
            color: particle.scattering_color().to_array(),
            visible: particle.is_visible(),
        }
    }
}

/// Number of particles (and emitters) in a cloud, 0 for a null instance.
///
/// # Safety
/// `instance` must be null or a live instance.
#[no_mangle]
pub unsafe extern "C" fn cloud_sim_get_particle_count(instance: *mut CloudSimInstance) -> usize {
    match unsafe { instance_mut(instance) } {
        Ok(instance) => {
            clear_last_error();
            instance.engine.particles().len()
        }
        Err(_) => 0,
    }
}

/// Return a borrowed pointer to a snapshot of every particle.
///
/// The snapshot is rebuilt into an internal buffer on each call, in draw
/// order when particle sorting is enabled and storage order otherwise.
/// The pointer stays valid until the next call to this function or
/// `cloud_sim_destroy`. **DO NOT FREE THIS POINTER**.
///
/// # Safety
/// `instance` must be a live instance; `out_array` and `out_len` must be writable.
#[no_mangle]
pub unsafe extern "C" fn cloud_sim_get_particles(
    instance: *mut CloudSimInstance,
    out_array: *mut *const CloudParticleState,
    out_len: *mut usize,
) -> CloudSimErrorCode {
    if out_array.is_null() {
        return track_error(&DefaultCloudSimError::null_pointer("out_array"));
    }
    if out_len.is_null() {
        return track_error(&DefaultCloudSimError::null_pointer("out_len"));
    }
    unsafe {
        *out_array = ptr::null();
        *out_len = 0;
    }

    let instance = match unsafe { instance_mut(instance) } {
        Ok(instance) => instance,
        Err(code) => return code,
    };

    let CloudSimInstance {
        engine,
        particle_snapshot,
    } = instance;
    let pool = engine.pool();
    particle_snapshot.clear();
    particle_snapshot.extend(pool.draw_order().iter().map(|&i| {
        let p = pool.position(i);
        CloudParticleState::new(&pool.particles()[i], [p.x, p.y, p.z])
    }));

    unsafe {
        *out_array = particle_snapshot.as_ptr();
        *out_len = particle_snapshot.len();
    }
    clear_last_error();
    CloudSimErrorCode::Ok
}
