//! POSIX threads with a type-level lifecycle.
//!
//! A [`Pthread`] runs a typed closure on a native thread. What happens when
//! the handle is dropped while the thread is still bound is fixed by its
//! policy parameter:
//!
//! | Alias | Policy | On drop |
//! |---|---|---|
//! | [`Thread`] | `Terminate` | abort the process |
//! | [`Jthread`] | `JoinAfterCancel` | cancel, then join |
//! | [`DetachedThread`] | `Detach` | detach |
//! | `Pthread<T, JoinAfterKill<SIG>>` | `JoinAfterKill` | signal, then join |
//!
//! Cancellation unwinds the canceled thread's stack. Closures meant to be
//! canceled should not hold values with destructors across cancellation
//! points. A panic escaping the closure aborts the process.

use crate::ffi;
use metasys_core::lifecycle::{
    Detach, Finalize, Join, JoinAfterCancel, JoinAfterKill, Nothing, Policy, Terminate,
};
use metasys_core::outcome::Outcome;
use metasys_core::{contract, finalize, Handle, Resource, SysResult, SystemError};
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr;

contract!(CREATE: "pthread_create" => EINVAL);
contract!(JOIN: "pthread_join" => EDEADLK, EINVAL, ESRCH);
contract!(DETACH: "pthread_detach" => EINVAL, ESRCH);
contract!(CANCEL: "pthread_cancel" => ESRCH);
contract!(KILL: "pthread_kill" => EINVAL, ESRCH);

// glibc's PTHREAD_CANCELED, ((void *) -1).
const CANCELED: *mut c_void = usize::MAX as *mut c_void;

/// Resource kind for thread ids.
#[derive(Debug)]
pub enum PthreadId {}

impl Resource for PthreadId {
    type Id = libc::pthread_t;
    const SENTINEL: libc::pthread_t = 0;
    const NAME: &'static str = "thread";

    fn release(_id: libc::pthread_t) {
        // A bare id owns nothing; bound threads are settled by the policy.
    }
}

/// Policies a thread handle can carry.
pub trait ThreadPolicy: Policy {}

impl ThreadPolicy for Nothing {}
impl ThreadPolicy for Terminate {}
impl ThreadPolicy for Detach {}
impl ThreadPolicy for Join {}
impl ThreadPolicy for JoinAfterCancel {}
impl<const SIG: i32> ThreadPolicy for JoinAfterKill<SIG> {}

/// How a joined thread ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadExit<T> {
    /// The closure returned this value.
    Returned(T),
    /// The thread acted on a cancellation request.
    Canceled,
}

impl<T> ThreadExit<T> {
    /// The returned value, if the thread was not canceled.
    pub fn returned(self) -> Option<T> {
        match self {
            Self::Returned(value) => Some(value),
            Self::Canceled => None,
        }
    }

    /// Whether the thread was canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

type StartRoutine = extern "C" fn(*mut c_void) -> *mut c_void;
type UnwindingStartRoutine = extern "C-unwind" fn(*mut c_void) -> *mut c_void;

extern "C-unwind" fn start<F, T>(packet: *mut c_void) -> *mut c_void
where
    F: FnOnce() -> T,
{
    // SAFETY: spawn_with hands over a leaked Box<F> and nothing else
    // touches it.
    let routine = unsafe { *Box::from_raw(packet.cast::<F>()) };
    Box::into_raw(Box::new(routine())).cast()
}

/// A native thread returning `T`, finalized by policy `P`.
pub struct Pthread<T, P: ThreadPolicy = Terminate> {
    handle: Handle<PthreadId>,
    _marker: PhantomData<(fn() -> T, fn() -> P)>,
}

/// Must be joined or detached before it is dropped.
pub type Thread<T = ()> = Pthread<T, Terminate>;

/// Canceled and joined when dropped.
pub type Jthread<T = ()> = Pthread<T, JoinAfterCancel>;

/// Detached when dropped.
///
/// The closure's return value is boxed for a join that never comes, so a
/// `T` with a destructor leaks. Detached routines should return `()` or
/// release what they hold before returning.
pub type DetachedThread<T = ()> = Pthread<T, Detach>;

impl<T, P: ThreadPolicy> Pthread<T, P> {
    /// A handle bound to no thread.
    pub const fn new() -> Self {
        Self {
            handle: Handle::new(),
            _marker: PhantomData,
        }
    }

    /// Whether a thread is bound.
    pub fn valid(&self) -> bool {
        self.handle.valid()
    }

    /// The native thread id, zero when unbound.
    pub fn id(&self) -> libc::pthread_t {
        self.handle.raw()
    }

    /// Raw `pthread_join(3)`. On success the handle is unbound and the
    /// handler also receives how the thread ended.
    ///
    /// # Panics
    ///
    /// Panics if no thread is bound.
    pub fn join_with<H, R>(&mut self, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::c_int>, Option<ThreadExit<T>>) -> R,
    {
        JOIN.require(self.valid(), "no thread is bound");
        let mut ret: *mut c_void = ptr::null_mut();
        let outcome = Outcome::status(unsafe { libc::pthread_join(self.handle.raw(), &mut ret) });
        let exit = if outcome.value() == 0 {
            let tid = self.handle.take();
            log::trace!("joined thread {}", tid);
            Some(if ret == CANCELED {
                ThreadExit::Canceled
            } else {
                // SAFETY: a thread bound to this handle was started by
                // `start::<_, T>`, which returns a leaked Box<T>.
                ThreadExit::Returned(*unsafe { Box::from_raw(ret.cast::<T>()) })
            })
        } else {
            None
        };
        handler(outcome, exit)
    }

    /// Wait for the thread to end.
    pub fn join(&mut self) -> SysResult<ThreadExit<T>> {
        self.join_with(|outcome, exit| {
            outcome.check_code(&JOIN)?;
            exit.ok_or(SystemError::NoSuchProcess)
        })
    }

    /// Raw `pthread_detach(3)`. On success the handle is unbound.
    ///
    /// # Panics
    ///
    /// Panics if no thread is bound.
    pub fn detach_with<H, R>(&mut self, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::c_int>) -> R,
    {
        DETACH.require(self.valid(), "no thread is bound");
        let outcome = Outcome::status(unsafe { libc::pthread_detach(self.handle.raw()) });
        if outcome.value() == 0 {
            let tid = self.handle.take();
            log::trace!("detached thread {}", tid);
        }
        handler(outcome)
    }

    /// Let the thread run on its own.
    ///
    /// Its return value is never collected: the boxed `T` is leaked and
    /// its destructor does not run.
    pub fn detach(&mut self) -> SysResult<()> {
        self.detach_with(|outcome| outcome.check_code(&DETACH))
    }

    /// Raw `pthread_cancel(3)`.
    ///
    /// # Panics
    ///
    /// Panics if no thread is bound.
    pub fn cancel_with<H, R>(&self, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::c_int>) -> R,
    {
        CANCEL.require(self.valid(), "no thread is bound");
        handler(Outcome::status(unsafe { ffi::pthread_cancel(self.handle.raw()) }))
    }

    /// Send a cancellation request.
    pub fn cancel(&self) -> SysResult<()> {
        self.cancel_with(|outcome| outcome.check_code(&CANCEL))
    }

    /// Raw `pthread_kill(3)`.
    ///
    /// # Panics
    ///
    /// Panics if no thread is bound.
    pub fn kill_with<H, R>(&self, signal: i32, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::c_int>) -> R,
    {
        KILL.require(self.valid(), "no thread is bound");
        handler(Outcome::status(unsafe { libc::pthread_kill(self.handle.raw(), signal) }))
    }

    /// Deliver `signal` to the thread.
    pub fn kill(&self, signal: i32) -> SysResult<()> {
        self.kill_with(signal, |outcome| outcome.check_code(&KILL))
    }
}

impl<T, P> Pthread<T, P>
where
    T: Send + 'static,
    P: ThreadPolicy,
{
    /// Raw `pthread_create(3)` running `routine`.
    ///
    /// # Panics
    ///
    /// Panics if a thread is already bound.
    pub fn spawn_with<F, H, R>(&mut self, routine: F, handler: H) -> R
    where
        F: FnOnce() -> T + Send + 'static,
        H: FnOnce(Outcome<libc::c_int>) -> R,
    {
        CREATE.require(!self.valid(), "a thread is already bound");
        let packet = Box::into_raw(Box::new(routine)).cast::<c_void>();
        // SAFETY: both types describe the same C calling convention; the
        // routine only unwinds through forced cancellation.
        let entry = unsafe { mem::transmute::<UnwindingStartRoutine, StartRoutine>(start::<F, T>) };
        let mut tid: libc::pthread_t = 0;
        let outcome = Outcome::status(unsafe { libc::pthread_create(&mut tid, ptr::null(), entry, packet) });
        if outcome.value() == 0 {
            log::trace!("spawned thread {}", tid);
            // SAFETY: the id belongs to the thread just created.
            unsafe { self.handle.reset(tid) };
        } else {
            // SAFETY: no thread was created, so the routine is still ours.
            drop(unsafe { Box::from_raw(packet.cast::<F>()) });
        }
        handler(outcome)
    }

    /// Start a thread running `routine`.
    pub fn spawn<F>(&mut self, routine: F) -> SysResult<()>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.spawn_with(routine, |outcome| outcome.check_code(&CREATE))
    }

    /// A handle bound to a new thread running `routine`.
    pub fn spawn_init<F>(routine: F) -> SysResult<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let mut thread = Self::new();
        thread.spawn(routine)?;
        Ok(thread)
    }

    /// A handle after one raw spawn; unbound if it failed.
    pub fn spawn_init_with<F, H>(routine: F, handler: H) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
        H: FnOnce(Outcome<libc::c_int>),
    {
        let mut thread = Self::new();
        thread.spawn_with(routine, handler);
        thread
    }
}

impl<T, P: ThreadPolicy> Default for Pthread<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P: ThreadPolicy> fmt::Debug for Pthread<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pthread")
            .field("id", &self.handle.raw())
            .field("lifecycle", &P::LIFECYCLE)
            .finish()
    }
}

impl<T, P: ThreadPolicy> Finalize for Pthread<T, P> {
    fn is_bound(&self) -> bool {
        self.valid()
    }

    fn describe(&self) -> String {
        format!("thread {}", self.handle.raw())
    }

    fn cancel(&mut self) -> SysResult<()> {
        Pthread::cancel(self)
    }

    fn signal(&mut self, signal: i32) -> SysResult<()> {
        self.kill(signal)
    }

    fn detach(&mut self) -> SysResult<()> {
        Pthread::detach(self)
    }

    fn join(&mut self) -> SysResult<()> {
        Pthread::join(self).map(|_| ())
    }
}

impl<T, P: ThreadPolicy> Drop for Pthread<T, P> {
    fn drop(&mut self) {
        finalize(self, P::LIFECYCLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_join_returns_value() {
        let mut thread = Thread::<u64>::spawn_init(|| (1..=10).sum()).unwrap();
        assert!(thread.valid());
        assert_eq!(thread.join(), Ok(ThreadExit::Returned(55)));
        assert!(!thread.valid());
    }

    #[test]
    fn test_join_policy_waits_on_drop() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let counter = Arc::clone(&counter);
            let _thread = Pthread::<(), Join>::spawn_init(move || {
                for _ in 0..1000 {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1000);
    }

    #[test]
    fn test_join_policy_runs_routine_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let counter = Arc::clone(&counter);
            let _thread = Pthread::<(), Join>::spawn_init(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detached_drop_does_not_wait() {
        let release = Arc::new(AtomicUsize::new(0));
        {
            let release = Arc::clone(&release);
            let _thread = DetachedThread::<()>::spawn_init(move || {
                while release.load(Ordering::SeqCst) == 0 {
                    std::hint::spin_loop();
                }
            })
            .unwrap();
        }
        release.store(1, Ordering::SeqCst);
    }

    #[test]
    fn test_detach_unbinds() {
        let mut thread = Thread::<()>::spawn_init(|| ()).unwrap();
        thread.detach().unwrap();
        assert!(!thread.valid());
        assert_eq!(thread.id(), 0);
    }

    #[test]
    fn test_raw_spawn_reports_status() {
        let mut code = -1;
        let mut thread = Thread::<i32>::spawn_init_with(|| 7, |outcome| code = outcome.value());
        assert_eq!(code, 0);
        assert_eq!(thread.join().map(ThreadExit::returned), Ok(Some(7)));
    }

    #[test]
    fn test_unbound_drop_is_silent() {
        let thread = Thread::<()>::new();
        assert!(!thread.valid());
        drop(thread);
    }

    #[test]
    #[should_panic(expected = "no thread is bound")]
    fn test_join_unbound_panics() {
        let mut thread = Jthread::<()>::default();
        let _ = thread.join();
    }

    #[test]
    fn test_thread_exit_accessors() {
        assert_eq!(ThreadExit::Returned(3).returned(), Some(3));
        assert!(ThreadExit::<i32>::Canceled.is_canceled());
        assert_eq!(ThreadExit::<i32>::Canceled.returned(), None);
    }
}
