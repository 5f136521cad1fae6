//! Thread cancellation entry points.

use libc::{c_int, pthread_t};

pub(crate) const PTHREAD_CANCEL_ENABLE: c_int = 0;
pub(crate) const PTHREAD_CANCEL_DISABLE: c_int = 1;

extern "C" {
    pub(crate) fn pthread_cancel(thread: pthread_t) -> c_int;
    pub(crate) fn pthread_setcancelstate(state: c_int, oldstate: *mut c_int) -> c_int;
}

// Cancellation points unwind the caller's stack when a request is pending.
extern "C-unwind" {
    pub(crate) fn pthread_testcancel();
}
