//! Controls that act on the calling thread.

use crate::ffi;
use std::marker::PhantomData;

/// Operations on the calling thread.
#[derive(Debug)]
pub enum ThisThread {}

impl ThisThread {
    /// Act on a pending cancellation request, if any. With a request
    /// pending and cancellation enabled this does not return.
    pub fn test_cancel() {
        unsafe { ffi::pthread_testcancel() }
    }

    /// Enable or disable cancellation and return whether it was enabled.
    pub fn set_cancel(enabled: bool) -> bool {
        let state = if enabled {
            ffi::PTHREAD_CANCEL_ENABLE
        } else {
            ffi::PTHREAD_CANCEL_DISABLE
        };
        let mut previous = ffi::PTHREAD_CANCEL_ENABLE;
        let ret = unsafe { ffi::pthread_setcancelstate(state, &mut previous) };
        assert_eq!(ret, 0, "pthread_setcancelstate: invalid state");
        previous == ffi::PTHREAD_CANCEL_ENABLE
    }

    /// The calling thread's native id.
    pub fn id() -> libc::pthread_t {
        unsafe { libc::pthread_self() }
    }
}

/// Disables cancellation of the calling thread until dropped, then restores
/// the previous state.
#[derive(Debug)]
pub struct CancelInhibitor {
    previous: bool,
    // The state belongs to the thread that created the guard.
    _thread: PhantomData<*const ()>,
}

impl CancelInhibitor {
    /// Disable cancellation for the guard's scope.
    pub fn new() -> Self {
        Self {
            previous: ThisThread::set_cancel(false),
            _thread: PhantomData,
        }
    }
}

impl Default for CancelInhibitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CancelInhibitor {
    fn drop(&mut self) {
        ThisThread::set_cancel(self.previous);
    }
}
