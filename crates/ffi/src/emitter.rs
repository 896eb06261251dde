use cloud_sim_core::{Color, EmitterTemplateId, ParticleEmitter, Vec3};
use std::os::raw::c_void;

use crate::error::DefaultCloudSimError;

/// Host callbacks that create and drive billboard emitters.
///
/// Every callback receives `user_data` unchanged as its first argument.
/// `create` returns an opaque emitter handle (null if none is available);
/// the other callbacks receive that handle. `release` is optional and is
/// called once per handle when the cloud is destroyed.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CloudEmitterCallbacks {
    pub user_data: *mut c_void,
    pub create: Option<unsafe extern "C" fn(user_data: *mut c_void, template: u32) -> *mut c_void>,
    pub set_position:
        Option<unsafe extern "C" fn(user_data: *mut c_void, emitter: *mut c_void, x: f32, y: f32, z: f32)>,
    pub set_tint: Option<
        unsafe extern "C" fn(user_data: *mut c_void, emitter: *mut c_void, r: f32, g: f32, b: f32, a: f32),
    >,
    pub set_active:
        Option<unsafe extern "C" fn(user_data: *mut c_void, emitter: *mut c_void, active: bool)>,
    pub release: Option<unsafe extern "C" fn(user_data: *mut c_void, emitter: *mut c_void)>,
}

/// Validated callback table with the required entries unwrapped.
#[derive(Clone, Copy)]
pub(crate) struct EmitterVTable {
    user_data: *mut c_void,
    create: unsafe extern "C" fn(*mut c_void, u32) -> *mut c_void,
    set_position: unsafe extern "C" fn(*mut c_void, *mut c_void, f32, f32, f32),
    set_tint: unsafe extern "C" fn(*mut c_void, *mut c_void, f32, f32, f32, f32),
    set_active: unsafe extern "C" fn(*mut c_void, *mut c_void, bool),
    release: Option<unsafe extern "C" fn(*mut c_void, *mut c_void)>,
}

impl EmitterVTable {
    /// # Errors
    ///
    /// Returns a `MissingCallback` error naming the first required callback that is null.
    pub fn new(callbacks: &CloudEmitterCallbacks) -> Result<Self, DefaultCloudSimError> {
        Ok(Self {
            user_data: callbacks.user_data,
            create: callbacks
                .create
                .ok_or_else(|| DefaultCloudSimError::missing_callback("create"))?,
            set_position: callbacks
                .set_position
                .ok_or_else(|| DefaultCloudSimError::missing_callback("set_position"))?,
            set_tint: callbacks
                .set_tint
                .ok_or_else(|| DefaultCloudSimError::missing_callback("set_tint"))?,
            set_active: callbacks
                .set_active
                .ok_or_else(|| DefaultCloudSimError::missing_callback("set_active"))?,
            release: callbacks.release,
        })
    }

    /// Ask the host for an emitter, `None` if it returned null
    pub fn create(&self, template: EmitterTemplateId) -> Option<HostEmitter> {
        // SAFETY: the caller of `cloud_sim_new` guarantees the callbacks and
        // `user_data` stay valid for the lifetime of the instance.
        let handle = unsafe { (self.create)(self.user_data, template) };
        (!handle.is_null()).then_some(HostEmitter {
            vtable: *self,
            handle,
        })
    }
}

/// One host-owned emitter handle
pub(crate) struct HostEmitter {
    vtable: EmitterVTable,
    handle: *mut c_void,
}

impl ParticleEmitter for HostEmitter {
    fn set_position(&mut self, position: &Vec3) {
        // SAFETY: see `EmitterVTable::create`; `handle` came from `create`.
        unsafe {
            (self.vtable.set_position)(
                self.vtable.user_data,
                self.handle,
                position.x,
                position.y,
                position.z,
            );
        }
    }

    fn set_tint(&mut self, color: Color) {
        // SAFETY: see `EmitterVTable::create`; `handle` came from `create`.
        unsafe {
            (self.vtable.set_tint)(
                self.vtable.user_data,
                self.handle,
                color.r,
                color.g,
                color.b,
                color.a,
            );
        }
    }

    fn set_active(&mut self, active: bool) {
        // SAFETY: see `EmitterVTable::create`; `handle` came from `create`.
        unsafe { (self.vtable.set_active)(self.vtable.user_data, self.handle, active) }
    }
}

impl Drop for HostEmitter {
    fn drop(&mut self) {
        if let Some(release) = self.vtable.release {
            // SAFETY: each handle is released exactly once, after its last use.
            unsafe { release(self.vtable.user_data, self.handle) }
        }
    }
}
