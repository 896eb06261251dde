//! C ABI for the volumetric cloud simulation
//!
//! Hosts create clouds with `cloud_sim_new`, supplying a table of emitter
//! callbacks, then call `cloud_sim_advance_time` and `cloud_sim_prepare_render`
//! once per frame. Failed calls return a non-zero `CloudSimErrorCode` and leave
//! a message for `cloud_sim_get_last_error`.

mod emitter;
mod error;
mod helpers;
mod instance;
mod particles;

pub use emitter::CloudEmitterCallbacks;
pub use error::{cloud_sim_get_last_error, cloud_sim_get_last_error_code, CloudSimErrorCode};
pub use instance::{
    cloud_sim_advance_time, cloud_sim_destroy, cloud_sim_get_origin, cloud_sim_get_view_distance,
    cloud_sim_new, cloud_sim_prepare_render, cloud_sim_set_evolving_speed, CloudSimFrame,
    CloudSimInstance, CloudSimOptions, CloudSimProperties, CloudSimQuality,
};
pub use particles::{cloud_sim_get_particle_count, cloud_sim_get_particles, CloudParticleState};

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::os::raw::c_void;
    use std::ptr;

    #[derive(Default)]
    struct Host {
        created: usize,
        released: usize,
        active: Vec<bool>,
        fail_after: Option<usize>,
    }

    unsafe fn host<'a>(user_data: *mut c_void) -> &'a mut Host {
        unsafe { &mut *user_data.cast::<Host>() }
    }

    unsafe extern "C" fn create(user_data: *mut c_void, _template: u32) -> *mut c_void {
        let host = unsafe { host(user_data) };
        if host.fail_after == Some(host.created) {
            return ptr::null_mut();
        }
        host.created += 1;
        host.active.push(false);
        // Handles are 1-based slot numbers
        host.created as *mut c_void
    }

    unsafe extern "C" fn set_position(_: *mut c_void, _: *mut c_void, _: f32, _: f32, _: f32) {}

    unsafe extern "C" fn set_tint(_: *mut c_void, _: *mut c_void, _: f32, _: f32, _: f32, _: f32) {}

    unsafe extern "C" fn set_active(user_data: *mut c_void, emitter: *mut c_void, active: bool) {
        let host = unsafe { host(user_data) };
        host.active[emitter as usize - 1] = active;
    }

    unsafe extern "C" fn release(user_data: *mut c_void, _: *mut c_void) {
        unsafe { host(user_data) }.released += 1;
    }

    fn callbacks(host: &mut Host) -> CloudEmitterCallbacks {
        CloudEmitterCallbacks {
            user_data: ptr::from_mut(host).cast(),
            create: Some(create),
            set_position: Some(set_position),
            set_tint: Some(set_tint),
            set_active: Some(set_active),
            release: Some(release),
        }
    }

    fn properties() -> CloudSimProperties {
        CloudSimProperties {
            length: 8.0,
            width: 8.0,
            height: 5.0,
            cell_size: 2.0,
            evolving_speed: 3.0,
            position: [0.0, 0.0, 300.0],
            emitter_template: 7,
        }
    }

    const OPTIONS: CloudSimOptions = CloudSimOptions {
        quality: CloudSimQuality::Medium,
        seed: 42,
        use_seed: true,
        sort_particles: false,
    };

    fn frame(time: f32) -> CloudSimFrame {
        CloudSimFrame {
            time,
            wind: [1.0, 0.0, 0.0],
            light_direction: [0.0, 0.0, 1.0],
            light_color: [1.0, 1.0, 1.0, 1.0],
            light_intensity: 1.0,
            camera_position: [0.0, -50.0, 300.0],
            camera_direction: [0.0, 1.0, 0.0],
        }
    }

    #[test]
    fn test_lifecycle_creates_and_releases_every_emitter() {
        let mut host = Host::default();
        let mut cloud: *mut CloudSimInstance = ptr::null_mut();
        let code = unsafe {
            cloud_sim_new(&properties(), &OPTIONS, &frame(0.0), callbacks(&mut host), &mut cloud)
        };
        assert_eq!(code, CloudSimErrorCode::Ok);
        assert!(!cloud.is_null());

        let count = unsafe { cloud_sim_get_particle_count(cloud) };
        assert_eq!(count, host.created);
        assert!(host.active.iter().all(|&a| a));

        unsafe {
            assert_eq!(cloud_sim_advance_time(cloud, &frame(1.0), 1), CloudSimErrorCode::Ok);
            assert_eq!(cloud_sim_prepare_render(cloud, &frame(1.0)), CloudSimErrorCode::Ok);
        }

        let mut array: *const CloudParticleState = ptr::null();
        let mut len: usize = 0;
        assert_eq!(
            unsafe { cloud_sim_get_particles(cloud, &mut array, &mut len) },
            CloudSimErrorCode::Ok
        );
        assert_eq!(len, count);
        let particles = unsafe { std::slice::from_raw_parts(array, len) };
        for (state, &active) in particles.iter().zip(&host.active) {
            assert_eq!(state.visible, active);
        }

        let mut origin = [0.0_f32; 3];
        unsafe { cloud_sim_get_origin(cloud, &mut origin) };
        assert!((origin[0] - 1.0).abs() < 1e-5);

        unsafe { cloud_sim_destroy(cloud) };
        assert_eq!(host.released, host.created);
        assert!(host.active.iter().all(|&a| !a));
    }

    #[test]
    fn test_emitter_shortage_releases_partial_set() {
        let mut host = Host {
            fail_after: Some(3),
            ..Host::default()
        };
        let mut cloud: *mut CloudSimInstance = ptr::null_mut();
        let code = unsafe {
            cloud_sim_new(&properties(), &OPTIONS, &frame(0.0), callbacks(&mut host), &mut cloud)
        };
        assert_eq!(code, CloudSimErrorCode::EmitterUnavailable);
        assert!(cloud.is_null());
        assert_eq!(host.created, 3);
        assert_eq!(host.released, 3);
        assert_eq!(cloud_sim_get_last_error_code(), CloudSimErrorCode::EmitterUnavailable);
        let msg = unsafe { CStr::from_ptr(cloud_sim_get_last_error()) };
        assert!(msg.to_string_lossy().contains("template 7"));
    }

    #[test]
    fn test_missing_callback_and_null_pointers() {
        let mut host = Host::default();
        let mut table = callbacks(&mut host);
        table.set_tint = None;
        let mut cloud: *mut CloudSimInstance = ptr::null_mut();
        let code = unsafe { cloud_sim_new(&properties(), &OPTIONS, &frame(0.0), table, &mut cloud) };
        assert_eq!(code, CloudSimErrorCode::MissingCallback);
        assert_eq!(host.created, 0);

        let code = unsafe { cloud_sim_advance_time(ptr::null_mut(), &frame(0.0), 1) };
        assert_eq!(code, CloudSimErrorCode::NullPointer);
        assert!(!cloud_sim_get_last_error().is_null());
        assert_eq!(unsafe { cloud_sim_get_particle_count(ptr::null_mut()) }, 0);
    }

    #[test]
    fn test_invalid_properties_are_reported() {
        let mut host = Host::default();
        let props = CloudSimProperties {
            cell_size: -1.0,
            ..properties()
        };
        let mut cloud: *mut CloudSimInstance = ptr::null_mut();
        let code = unsafe { cloud_sim_new(&props, &OPTIONS, &frame(0.0), callbacks(&mut host), &mut cloud) };
        assert_eq!(code, CloudSimErrorCode::InvalidCloudProperties);
        assert!(cloud.is_null());
    }
}
