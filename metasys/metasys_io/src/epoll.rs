//! Epoll interest sets.
//!
//! [`Epoll`] owns an epoll instance. Registrations carry a user-data word,
//! typed through [`EpollData`] so that the word read back from
//! [`Epoll::wait`] has the type it was registered with.

use bitflags::bitflags;
use metasys_core::descriptor::FdHandle;
use metasys_core::outcome::Outcome;
use metasys_core::{contract, owned_descriptor, Closable, SysResult};
use std::marker::PhantomData;
use std::os::fd::{AsRawFd, RawFd};

contract!(CREATE: "epoll_create" => EINVAL);
contract!(CTL: "epoll_ctl" => EBADF, EEXIST, EINVAL, ELOOP, ENOENT, EPERM);
contract!(WAIT: "epoll_wait" => EBADF, EFAULT, EINVAL);

bitflags! {
    /// Event bits of an epoll registration or readiness report.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct EpollFlags: u32 {
        /// Readable.
        const IN = libc::EPOLLIN as u32;
        /// Writable.
        const OUT = libc::EPOLLOUT as u32;
        /// Peer closed its writing half.
        const RDHUP = libc::EPOLLRDHUP as u32;
        /// Urgent data.
        const PRI = libc::EPOLLPRI as u32;
        /// Error condition.
        const ERR = libc::EPOLLERR as u32;
        /// Hang up.
        const HUP = libc::EPOLLHUP as u32;
        /// Edge triggered.
        const ET = libc::EPOLLET as u32;
        /// Disarm after one report.
        const ONESHOT = libc::EPOLLONESHOT as u32;
        /// Keep the system awake while the event is pending.
        const WAKEUP = libc::EPOLLWAKEUP as u32;
        /// Wake only one of several waiters.
        const EXCLUSIVE = libc::EPOLLEXCLUSIVE as u32;
    }
}

/// Values that fit in the 64-bit epoll user-data word.
pub trait EpollData: Copy {
    /// Encode into the data word.
    fn into_word(self) -> u64;

    /// Decode from the data word.
    fn from_word(word: u64) -> Self;
}

impl EpollData for u64 {
    fn into_word(self) -> u64 {
        self
    }

    fn from_word(word: u64) -> Self {
        word
    }
}

impl EpollData for u32 {
    fn into_word(self) -> u64 {
        u64::from(self)
    }

    fn from_word(word: u64) -> Self {
        word as u32
    }
}

impl EpollData for i32 {
    fn into_word(self) -> u64 {
        u64::from(self as u32)
    }

    fn from_word(word: u64) -> Self {
        word as u32 as i32
    }
}

impl EpollData for usize {
    fn into_word(self) -> u64 {
        self as u64
    }

    fn from_word(word: u64) -> Self {
        word as usize
    }
}

/// One registration or readiness report. Layout-compatible with
/// `struct epoll_event`.
#[repr(transparent)]
pub struct EpollEvent<T: EpollData = u64> {
    raw: libc::epoll_event,
    _data: PhantomData<T>,
}

impl<T: EpollData> EpollEvent<T> {
    /// An event with the given bits and data.
    pub fn new(flags: EpollFlags, data: T) -> Self {
        Self {
            raw: libc::epoll_event {
                events: flags.bits(),
                u64: data.into_word(),
            },
            _data: PhantomData,
        }
    }

    /// The event bits.
    pub fn flags(&self) -> EpollFlags {
        EpollFlags::from_bits_retain(self.raw.events)
    }

    /// The data registered with the descriptor.
    pub fn data(&self) -> T {
        let word = self.raw.u64;
        T::from_word(word)
    }
}

impl<T: EpollData> Clone for EpollEvent<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: EpollData> Copy for EpollEvent<T> {}

impl<T: EpollData + Default> Default for EpollEvent<T> {
    fn default() -> Self {
        Self::new(EpollFlags::empty(), T::default())
    }
}

impl<T: EpollData + std::fmt::Debug> std::fmt::Debug for EpollEvent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpollEvent")
            .field("flags", &self.flags())
            .field("data", &self.data())
            .finish()
    }
}

/// `epoll_ctl` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpollOp {
    /// Register a descriptor.
    Add,
    /// Change a registration.
    Modify,
    /// Remove a registration.
    Delete,
}

impl EpollOp {
    fn as_raw(self) -> libc::c_int {
        match self {
            Self::Add => libc::EPOLL_CTL_ADD,
            Self::Modify => libc::EPOLL_CTL_MOD,
            Self::Delete => libc::EPOLL_CTL_DEL,
        }
    }
}

/// An epoll instance.
#[derive(Debug, Default)]
pub struct Epoll {
    handle: FdHandle,
}

owned_descriptor!(Epoll, handle);
impl Closable for Epoll {}

impl Epoll {
    /// An epoll handle holding nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `epoll_create1(2)`.
    ///
    /// # Panics
    ///
    /// Panics if an instance is already held.
    pub fn create_with<F, R>(&mut self, cloexec: bool, handler: F) -> R
    where
        F: FnOnce(Outcome<RawFd>) -> R,
    {
        CREATE.require(!self.handle.valid(), "epoll instance is already open");
        let flags = if cloexec { libc::EPOLL_CLOEXEC } else { 0 };
        let outcome = Outcome::invoke(|| unsafe { libc::epoll_create1(flags) });
        if outcome.value() >= 0 {
            log::trace!("created epoll instance {}", outcome.value());
            // SAFETY: the descriptor was just created and is unowned.
            unsafe { self.handle.reset(outcome.value()) };
        }
        handler(outcome)
    }

    /// Create the instance.
    pub fn create(&mut self, cloexec: bool) -> SysResult<()> {
        self.create_with(cloexec, |outcome| {
            outcome.check(|fd| fd < 0, &CREATE).map(|_| ())
        })
    }

    /// A new epoll instance.
    pub fn create_init(cloexec: bool) -> SysResult<Self> {
        let mut epoll = Self::new();
        epoll.create(cloexec)?;
        Ok(epoll)
    }

    /// A new epoll handle after one raw create; invalid if it failed.
    pub fn create_init_with<F>(cloexec: bool, handler: F) -> Self
    where
        F: FnOnce(Outcome<RawFd>),
    {
        let mut epoll = Self::new();
        epoll.create_with(cloexec, handler);
        epoll
    }

    /// Raw `epoll_ctl(2)`. `event` may be `None` only for
    /// [`EpollOp::Delete`].
    pub fn ctl_with<T, F, R>(
        &self,
        op: EpollOp,
        target: RawFd,
        event: Option<EpollEvent<T>>,
        handler: F,
    ) -> R
    where
        T: EpollData,
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        CTL.require(self.handle.valid(), "epoll instance is not open");
        let epfd = self.handle.raw();
        let mut event = event;
        let ptr = match event.as_mut() {
            Some(event) => &mut event.raw as *mut libc::epoll_event,
            None => std::ptr::null_mut(),
        };
        handler(Outcome::invoke(|| unsafe {
            libc::epoll_ctl(epfd, op.as_raw(), target, ptr)
        }))
    }

    /// Change the interest list.
    pub fn ctl<T: EpollData>(
        &self,
        op: EpollOp,
        target: RawFd,
        event: Option<EpollEvent<T>>,
    ) -> SysResult<()> {
        self.ctl_with(op, target, event, |outcome| outcome.check_status(&CTL))
    }

    /// Register `target` with the given interest and data.
    pub fn add<T: EpollData>(
        &self,
        target: &impl AsRawFd,
        flags: EpollFlags,
        data: T,
    ) -> SysResult<()> {
        self.ctl(EpollOp::Add, target.as_raw_fd(), Some(EpollEvent::new(flags, data)))
    }

    /// Replace the interest and data of a registered `target`.
    pub fn modify<T: EpollData>(
        &self,
        target: &impl AsRawFd,
        flags: EpollFlags,
        data: T,
    ) -> SysResult<()> {
        self.ctl(EpollOp::Modify, target.as_raw_fd(), Some(EpollEvent::new(flags, data)))
    }

    /// Remove `target` from the interest list.
    pub fn delete(&self, target: &impl AsRawFd) -> SysResult<()> {
        self.ctl::<u64>(EpollOp::Delete, target.as_raw_fd(), None)
    }

    /// Raw `epoll_wait(2)` with a timeout in milliseconds (`-1` blocks).
    /// The handler receives the number of ready events or `-1`.
    pub fn wait_with<T, F, R>(&self, events: &mut [EpollEvent<T>], timeout_ms: i32, handler: F) -> R
    where
        T: EpollData,
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        WAIT.require(self.handle.valid(), "epoll instance is not open");
        let epfd = self.handle.raw();
        let capacity = events.len().min(libc::c_int::MAX as usize) as libc::c_int;
        let ptr = events.as_mut_ptr().cast::<libc::epoll_event>();
        handler(Outcome::invoke(|| unsafe {
            libc::epoll_wait(epfd, ptr, capacity, timeout_ms)
        }))
    }

    /// Wait for readiness and return how many leading entries of `events`
    /// were filled. Interrupted waits are restarted with the same timeout.
    pub fn wait<T: EpollData>(&self, events: &mut [EpollEvent<T>], timeout_ms: i32) -> SysResult<usize> {
        loop {
            let (ready, errno) = self.wait_with(events, timeout_ms, |outcome| {
                (outcome.value(), outcome.errno())
            });
            if ready >= 0 {
                return Ok(ready as usize);
            }
            if errno != libc::EINTR {
                return Err(WAIT.raise(errno));
            }
        }
    }

    /// Wait for readiness and return the filled events.
    pub fn wait_ready<'e, T: EpollData>(
        &self,
        events: &'e mut [EpollEvent<T>],
        timeout_ms: i32,
    ) -> SysResult<&'e [EpollEvent<T>]> {
        let ready = self.wait(events, timeout_ms)?;
        Ok(&events[..ready])
    }
}
