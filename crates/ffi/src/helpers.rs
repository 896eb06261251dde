use crate::error::{with_last_error_mut, CloudSimError, CloudSimErrorCode, DefaultCloudSimError};
use std::ffi::CString;

/// Set the thread-local error message and code.
pub(crate) fn set_last_error(error: &impl CloudSimError) {
    with_last_error_mut(|(cstring, code)| {
        *cstring = CString::new(error.msg()).ok();
        *code = error.code();
    });
}

/// Record an error and return its code.
#[inline]
pub(crate) fn track_error(error: &impl CloudSimError) -> CloudSimErrorCode {
    set_last_error(error);
    error.code()
}

/// Record the error of a failed result, clear the error state on success.
pub(crate) fn track_result<T>(result: Result<T, DefaultCloudSimError>) -> Result<T, CloudSimErrorCode> {
    match result {
        Ok(value) => {
            clear_last_error();
            Ok(value)
        }
        Err(error) => Err(track_error(&error)),
    }
}

/// Clear the thread-local error message and code.
pub(crate) fn clear_last_error() {
    with_last_error_mut(|(cstring, code)| {
        *cstring = None;
        *code = CloudSimErrorCode::Ok;
    });
}
