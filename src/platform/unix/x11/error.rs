// vaglx/src/platform/unix/x11/error.rs
//
//! Collection of X11 protocol errors.

use std::cell::Cell;
use std::os::raw::{c_char, c_int};
use x11_dl::xlib::{Display, XErrorEvent, Xlib};

thread_local! {
    static LAST_X_ERROR_CODE: Cell<u8> = Cell::new(0);
}

/// Records the error instead of letting Xlib abort the process.
pub(crate) unsafe extern "C" fn xlib_error_handler(_: *mut Display, event: *mut XErrorEvent)
                                                   -> c_int {
    if !event.is_null() {
        let error_code = (*event).error_code;
        LAST_X_ERROR_CODE.with(|last_x_error_code| last_x_error_code.set(error_code));
    }
    0
}

pub(crate) fn reset_last_error() {
    LAST_X_ERROR_CODE.with(|last_x_error_code| last_x_error_code.set(0));
}

/// Returns the code of the last error caught on this thread, if any.
pub(crate) fn take_last_error() -> Option<u8> {
    match LAST_X_ERROR_CODE.with(|last_x_error_code| last_x_error_code.replace(0)) {
        0 => None,
        error_code => Some(error_code),
    }
}

/// Asks the server for a description of an error code, e.g. `BadMatch` or `GLXBadFBConfig`.
pub(crate) fn error_text(xlib: &Xlib, display: *mut Display, error_code: u8) -> String {
    let mut error_text: Vec<u8> = vec![0; 256];
    unsafe {
        (xlib.XGetErrorText)(display,
                             error_code as c_int,
                             error_text.as_mut_ptr() as *mut c_char,
                             error_text.len() as c_int - 1);
    }
    let length = error_text.iter().position(|&byte| byte == 0).unwrap_or(error_text.len());
    String::from_utf8_lossy(&error_text[..length]).into_owned()
}
