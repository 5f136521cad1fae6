//! A native, non-recursive mutex.

use metasys_core::outcome::Outcome;
use metasys_core::{contract, SysResult};
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;

// EDEADLK (relock by the owner) and EPERM (unlock by a non-owner) are
// returned as errors, not treated as violations.
contract!(LOCK: "pthread_mutex_lock" => EAGAIN, EBUSY, EINVAL, ENOTRECOVERABLE, EOWNERDEAD);
contract!(TRYLOCK: "pthread_mutex_trylock" => EAGAIN, EINVAL, ENOTRECOVERABLE, EOWNERDEAD);
contract!(UNLOCK: "pthread_mutex_unlock" => EAGAIN, EBUSY, EINVAL, ENOTRECOVERABLE, EOWNERDEAD);

/// A `pthread_mutex_t` with default attributes.
///
/// The native mutex lives in its own allocation so it never moves. Locking
/// is exclusive and not re-entrant; waiters are served in no particular
/// order.
pub struct PthreadMutex {
    inner: Box<UnsafeCell<libc::pthread_mutex_t>>,
}

// SAFETY: the native mutex is designed to be shared between threads.
unsafe impl Send for PthreadMutex {}
unsafe impl Sync for PthreadMutex {}

impl PthreadMutex {
    /// An unlocked mutex.
    pub fn new() -> Self {
        Self {
            inner: Box::new(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER)),
        }
    }

    fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.inner.get()
    }

    /// Raw `pthread_mutex_lock(3)`.
    pub fn lock_with<H, R>(&self, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::c_int>) -> R,
    {
        handler(Outcome::status(unsafe { libc::pthread_mutex_lock(self.raw()) }))
    }

    /// Block until the mutex is acquired.
    pub fn lock(&self) -> SysResult<()> {
        self.lock_with(|outcome| outcome.check_code(&LOCK))
    }

    /// Raw `pthread_mutex_trylock(3)`.
    pub fn try_lock_with<H, R>(&self, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::c_int>) -> R,
    {
        handler(Outcome::status(unsafe { libc::pthread_mutex_trylock(self.raw()) }))
    }

    /// Acquire the mutex if it is free. `Ok(false)` means it is held.
    pub fn try_lock(&self) -> SysResult<bool> {
        self.try_lock_with(|outcome| match outcome.value() {
            0 => Ok(true),
            libc::EBUSY => Ok(false),
            _ => outcome.check_code(&TRYLOCK).map(|()| false),
        })
    }

    /// Raw `pthread_mutex_unlock(3)`.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the mutex.
    pub unsafe fn unlock_with<H, R>(&self, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::c_int>) -> R,
    {
        handler(Outcome::status(libc::pthread_mutex_unlock(self.raw())))
    }

    /// Release the mutex.
    ///
    /// # Safety
    ///
    /// The calling thread must hold the mutex.
    pub unsafe fn unlock(&self) -> SysResult<()> {
        self.unlock_with(|outcome| outcome.check_code(&UNLOCK))
    }

    /// Lock and return a guard that unlocks when dropped.
    pub fn guard(&self) -> SysResult<MutexGuard<'_>> {
        self.lock()?;
        Ok(MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        })
    }
}

impl Default for PthreadMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PthreadMutex {
    fn drop(&mut self) {
        let ret = unsafe { libc::pthread_mutex_destroy(self.raw()) };
        if ret != 0 {
            log::warn!("destroying mutex failed: {}", std::io::Error::from_raw_os_error(ret));
        }
    }
}

impl fmt::Debug for PthreadMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PthreadMutex").finish_non_exhaustive()
    }
}

/// Holds a [`PthreadMutex`] until dropped.
///
/// The mutex must be released by the thread that locked it, so the guard
/// cannot be sent to another thread:
///
/// ```compile_fail
/// use metasys_sched::PthreadMutex;
///
/// let mutex = PthreadMutex::new();
/// let guard = mutex.guard().unwrap();
/// std::thread::scope(|s| {
///     s.spawn(move || drop(guard));
/// });
/// ```
#[derive(Debug)]
pub struct MutexGuard<'a> {
    mutex: &'a PthreadMutex,
    _not_send: PhantomData<*const ()>,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: the guard exists only while this thread holds the mutex.
        if let Err(e) = unsafe { self.mutex.unlock() } {
            log::warn!("unlocking mutex failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metasys_core::SystemError;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_try_lock_when_held() {
        let mutex = PthreadMutex::new();
        assert_eq!(mutex.try_lock(), Ok(true));
        assert_eq!(mutex.try_lock(), Ok(false));
        unsafe { mutex.unlock() }.unwrap();
        assert_eq!(mutex.try_lock(), Ok(true));
        unsafe { mutex.unlock() }.unwrap();
    }

    #[test]
    fn test_guard_releases() {
        let mutex = PthreadMutex::default();
        {
            let _guard = mutex.guard().unwrap();
            assert_eq!(mutex.try_lock(), Ok(false));
        }
        assert_eq!(mutex.try_lock(), Ok(true));
        unsafe { mutex.unlock() }.unwrap();
    }

    #[test]
    fn test_owner_errors_are_returned() {
        let deadlock = Outcome::status(libc::EDEADLK).check_code(&LOCK);
        assert_eq!(deadlock, Err(SystemError::Deadlock));
        let foreign = Outcome::status(libc::EPERM).check_code(&UNLOCK);
        assert_eq!(foreign, Err(SystemError::OperationNotPermitted));
    }

    #[test]
    fn test_held_across_threads() {
        let mutex = Arc::new(PthreadMutex::new());
        let guard = mutex.guard().unwrap();

        let other = Arc::clone(&mutex);
        let busy = thread::spawn(move || other.try_lock()).join().unwrap();
        assert_eq!(busy, Ok(false));

        drop(guard);
        let other = Arc::clone(&mutex);
        let free = thread::spawn(move || {
            let acquired = other.try_lock();
            unsafe { other.unlock() }.unwrap();
            acquired
        })
        .join()
        .unwrap();
        assert_eq!(free, Ok(true));
    }
}
