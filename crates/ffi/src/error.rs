use cloud_sim_core::CloudError;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Common interface for errors crossing the FFI boundary.
///
/// - `code()` - Returns the error code handed back to the caller
/// - `msg()` - Returns the message exposed through `cloud_sim_get_last_error`
pub(crate) trait CloudSimError {
    /// Returns the error code to be returned across the FFI boundary.
    fn code(&self) -> CloudSimErrorCode;

    /// Returns the human-readable error message.
    fn msg(&self) -> &str;
}

/// Error code plus message, built from argument checks or from a core `CloudError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultCloudSimError {
    code: CloudSimErrorCode,
    msg: String,
}

impl DefaultCloudSimError {
    /// Create error for null pointer passed where non-null required.
    ///
    /// # Arguments
    /// * `param_name` - The name of the parameter that was null (e.g., `"out_instance"`)
    pub fn null_pointer(param_name: &str) -> Self {
        Self {
            code: CloudSimErrorCode::NullPointer,
            msg: format!("Parameter '{param_name}' cannot be null"),
        }
    }

    /// Create error for a missing emitter callback.
    ///
    /// # Arguments
    /// * `callback` - The callback field that was null (e.g., `"set_tint"`)
    pub fn missing_callback(callback: &str) -> Self {
        Self {
            code: CloudSimErrorCode::MissingCallback,
            msg: format!("Emitter callback '{callback}' must be provided"),
        }
    }

    /// Create error for invalid parameter.
    ///
    /// # Arguments
    /// * `message` - Description of the error
    pub fn invalid_parameter(message: String) -> Self {
        Self {
            code: CloudSimErrorCode::InvalidParameter,
            msg: message,
        }
    }
}

impl From<CloudError> for DefaultCloudSimError {
    fn from(error: CloudError) -> Self {
        let code = match error {
            CloudError::InvalidDimensions { .. } | CloudError::InvalidProperties { .. } => {
                CloudSimErrorCode::InvalidCloudProperties
            }
            CloudError::Allocation { .. } => CloudSimErrorCode::AllocationFailed,
            CloudError::EmitterUnavailable { .. } => CloudSimErrorCode::EmitterUnavailable,
            CloudError::ThreadPool(_) => CloudSimErrorCode::InvalidParameter,
        };
        Self {
            code,
            msg: error.to_string(),
        }
    }
}

impl CloudSimError for DefaultCloudSimError {
    fn code(&self) -> CloudSimErrorCode {
        self.code
    }

    fn msg(&self) -> &str {
        &self.msg
    }
}

/// FFI error codes returned by cloud simulation functions.
/// Follows standard C convention: 0 = success, non-zero = error.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudSimErrorCode {
    /// Operation completed successfully.
    Ok = 0,

    /// Invalid pointer: null pointer passed where non-null required.
    NullPointer = 1,

    /// Cloud extents, cell size, evolving speed or tunables are invalid.
    InvalidCloudProperties = 2,

    /// A per-cell or per-particle buffer could not be allocated.
    AllocationFailed = 3,

    /// The host's `create` callback returned null for a particle.
    EmitterUnavailable = 4,

    /// A required emitter callback was null.
    MissingCallback = 5,

    /// Invalid parameter passed to function.
    InvalidParameter = 6,
}

impl From<DefaultCloudSimError> for CloudSimErrorCode {
    fn from(error: DefaultCloudSimError) -> Self {
        error.code
    }
}

thread_local! {
    /// Most recent FFI error on this thread (message, code).
    /// The CString is kept here so the pointer handed to C stays valid.
    static LAST_ERROR: RefCell<(Option<CString>, CloudSimErrorCode)> = const { RefCell::new((None, CloudSimErrorCode::Ok)) };
}

/// Internal helper to read `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error<F, R>(f: F) -> R
where
    F: FnOnce(&(Option<CString>, CloudSimErrorCode)) -> R,
{
    LAST_ERROR.with_borrow(f)
}

/// Internal helper to mutate `LAST_ERROR` thread-local storage (cstring, code).
pub(crate) fn with_last_error_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut (Option<CString>, CloudSimErrorCode)) -> R,
{
    LAST_ERROR.with_borrow_mut(f)
}

/// Retrieve the most recent FFI error message as a null-terminated C string.
///
/// Returns:
/// - A borrowed pointer to the error message if an error occurred.
/// - `null` if the last call on this thread succeeded.
///
/// # Lifetime
/// The returned pointer is valid until the next FFI call on this thread.
///
/// **DO NOT FREE THIS POINTER** - it is managed internally.
///
/// Example:
/// ```cpp
/// CloudSimInstance* cloud = nullptr;
/// CloudSimErrorCode err = cloud_sim_new(&props, &options, &frame, callbacks, &cloud);
/// if (err != CloudSimErrorCode::Ok) {
///     printf("Cloud setup failed: %s\n", cloud_sim_get_last_error());
/// }
/// ```
#[no_mangle]
pub extern "C" fn cloud_sim_get_last_error() -> *const c_char {
    with_last_error(|(cstring, _code)| cstring.as_ref().map_or(ptr::null(), |cs| cs.as_ptr()))
}

/// Retrieve the most recent FFI error code, `Ok` if the last call succeeded.
#[no_mangle]
pub extern "C" fn cloud_sim_get_last_error_code() -> CloudSimErrorCode {
    with_last_error(|(_cstring, code)| *code)
}
