//! Child processes with a type-level lifecycle.

use bitflags::bitflags;
use metasys_core::lifecycle::{Finalize, Join, JoinAfterKill, Nothing, Policy, Terminate};
use metasys_core::outcome::Outcome;
use metasys_core::{contract, finalize, Handle, Resource, SysResult, SystemError};
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

contract!(FORK: "fork" => EINVAL);
contract!(WAIT: "waitpid" => ECHILD, EINVAL);
contract!(KILL: "kill" => EINVAL);

/// Exit code of a spawned child whose closure panicked.
pub const PANIC_EXIT_CODE: i32 = 101;

/// Resource kind for child process ids. Only positive ids are processes.
#[derive(Debug)]
pub enum Pid {}

impl Resource for Pid {
    type Id = libc::pid_t;
    const SENTINEL: libc::pid_t = 0;
    const NAME: &'static str = "process";

    fn is_valid(id: libc::pid_t) -> bool {
        id > 0
    }

    fn release(_id: libc::pid_t) {
        // A bare pid owns nothing; bound children are settled by the policy.
    }
}

/// Policies a process handle can carry. Processes cannot be detached or
/// canceled.
pub trait ProcessPolicy: Policy {}

impl ProcessPolicy for Nothing {}
impl ProcessPolicy for Terminate {}
impl ProcessPolicy for Join {}
impl<const SIG: i32> ProcessPolicy for JoinAfterKill<SIG> {}

bitflags! {
    /// Options for [`Process::wait`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WaitOptions: i32 {
        /// Return immediately if the child has not changed state
        const NOHANG = libc::WNOHANG;
        /// Also report stopped children
        const UNTRACED = libc::WUNTRACED;
        /// Also report continued children
        const CONTINUED = libc::WCONTINUED;
    }
}

/// A decoded `waitpid` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Exited normally with this code
    Exited(i32),
    /// Terminated by this signal
    Signaled(i32),
    /// Stopped by this signal
    Stopped(i32),
    /// Resumed by `SIGCONT`
    Continued,
    /// No state change yet (`NOHANG`)
    Running,
}

impl WaitStatus {
    /// Decode a raw status word.
    pub fn from_raw(status: libc::c_int) -> Self {
        if libc::WIFEXITED(status) {
            Self::Exited(libc::WEXITSTATUS(status))
        } else if libc::WIFSIGNALED(status) {
            Self::Signaled(libc::WTERMSIG(status))
        } else if libc::WIFSTOPPED(status) {
            Self::Stopped(libc::WSTOPSIG(status))
        } else {
            Self::Continued
        }
    }

    /// Whether the child exited normally.
    pub fn exited(&self) -> bool {
        matches!(self, Self::Exited(_))
    }

    /// The exit code of a normal exit.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            _ => None,
        }
    }

    /// Whether a signal terminated the child.
    pub fn signaled(&self) -> bool {
        matches!(self, Self::Signaled(_))
    }

    /// The signal that terminated the child.
    pub fn term_signal(&self) -> Option<i32> {
        match self {
            Self::Signaled(signal) => Some(*signal),
            _ => None,
        }
    }

    /// Whether the child is stopped.
    pub fn stopped(&self) -> bool {
        matches!(self, Self::Stopped(_))
    }

    /// Whether the child has ended and been reaped.
    pub fn is_terminal(&self) -> bool {
        self.exited() || self.signaled()
    }
}

impl fmt::Display for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {}", code),
            Self::Signaled(signal) => write!(f, "terminated by signal {}", signal),
            Self::Stopped(signal) => write!(f, "stopped by signal {}", signal),
            Self::Continued => write!(f, "continued"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// A child process finalized by policy `P`.
pub struct Process<P: ProcessPolicy = Nothing> {
    handle: Handle<Pid>,
    _policy: PhantomData<fn() -> P>,
}

/// Sent `SIGTERM` and waited for when dropped.
pub type Subprocess = Process<JoinAfterKill<{ libc::SIGTERM }>>;

/// Waited for when dropped.
pub type ChildProcess = Process<Join>;

/// Left running when dropped.
pub type OrphanProcess = Process<Nothing>;

impl<P: ProcessPolicy> Process<P> {
    /// A handle bound to no process.
    pub const fn new() -> Self {
        Self {
            handle: Handle::new(),
            _policy: PhantomData,
        }
    }

    /// Take charge of an existing child.
    ///
    /// # Safety
    ///
    /// `pid` must be a child of the calling process that no other handle
    /// will wait for.
    pub unsafe fn from_pid(pid: libc::pid_t) -> Self {
        Self {
            handle: Handle::from_raw(pid),
            _policy: PhantomData,
        }
    }

    /// Whether a child is bound.
    pub fn valid(&self) -> bool {
        self.handle.valid()
    }

    /// The child's pid, zero when unbound.
    pub fn pid(&self) -> libc::pid_t {
        self.handle.raw()
    }

    /// Raw `fork(2)`. In the parent the handle is bound to the child; in
    /// the child it stays unbound and the handler sees a value of zero.
    ///
    /// # Panics
    ///
    /// Panics if a child is already bound.
    pub fn fork_with<H, R>(&mut self, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::pid_t>) -> R,
    {
        FORK.require(!self.valid(), "a process is already bound");
        let outcome = Outcome::invoke(|| unsafe { libc::fork() });
        if outcome.value() > 0 {
            log::trace!("forked process {}", outcome.value());
            // SAFETY: the pid is a fresh child of this process.
            unsafe { self.handle.reset(outcome.value()) };
        }
        handler(outcome)
    }

    /// Fork. Afterwards the handle is bound in the parent and unbound in
    /// the child.
    pub fn fork(&mut self) -> SysResult<()> {
        self.fork_with(|outcome| outcome.check(|pid| pid < 0, &FORK).map(|_| ()))
    }

    /// A handle after a fork: bound in the parent, unbound in the child.
    pub fn fork_init() -> SysResult<Self> {
        let mut process = Self::new();
        process.fork()?;
        Ok(process)
    }

    /// A handle after one raw fork.
    pub fn fork_init_with<H>(handler: H) -> Self
    where
        H: FnOnce(Outcome<libc::pid_t>),
    {
        let mut process = Self::new();
        process.fork_with(handler);
        process
    }

    /// Fork a child that runs `child` and exits with the code it returns.
    /// The child never returns from this call.
    pub fn spawn<F>(child: F) -> SysResult<Self>
    where
        F: FnOnce() -> i32,
    {
        let process = Self::fork_init()?;
        if !process.valid() {
            let code = panic::catch_unwind(AssertUnwindSafe(child)).unwrap_or(PANIC_EXIT_CODE);
            // SAFETY: _exit skips the parent's atexit handlers and buffers.
            unsafe { libc::_exit(code) };
        }
        Ok(process)
    }

    /// Raw `waitpid(2)`. When the child has ended it is reaped and the
    /// handle becomes unbound. The handler receives the decoded status,
    /// which is meaningless when the call failed.
    ///
    /// # Panics
    ///
    /// Panics if no child is bound.
    pub fn wait_with<H, R>(&mut self, options: WaitOptions, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::pid_t>, WaitStatus) -> R,
    {
        WAIT.require(self.valid(), "no process is bound");
        let pid = self.handle.raw();
        let mut raw: libc::c_int = 0;
        let outcome = Outcome::invoke(|| unsafe { libc::waitpid(pid, &mut raw, options.bits()) });
        let status = if outcome.value() == 0 {
            WaitStatus::Running
        } else {
            WaitStatus::from_raw(raw)
        };
        if outcome.value() == pid && status.is_terminal() {
            log::trace!("reaped process {}: {}", pid, status);
            self.handle.take();
        }
        handler(outcome, status)
    }

    /// Wait for a state change of the child.
    pub fn wait(&mut self, options: WaitOptions) -> SysResult<WaitStatus> {
        self.wait_with(options, |outcome, status| {
            outcome.check(|pid| pid < 0, &WAIT).map(|_| status)
        })
    }

    /// Raw `kill(2)`.
    ///
    /// # Panics
    ///
    /// Panics if no child is bound.
    pub fn kill_with<H, R>(&self, signal: i32, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::c_int>) -> R,
    {
        KILL.require(self.valid(), "no process is bound");
        let pid = self.handle.raw();
        handler(Outcome::invoke(|| unsafe { libc::kill(pid, signal) }))
    }

    /// Deliver `signal` to the child.
    pub fn kill(&self, signal: i32) -> SysResult<()> {
        self.kill_with(signal, |outcome| outcome.check_status(&KILL))
    }
}

impl<P: ProcessPolicy> Default for Process<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ProcessPolicy> fmt::Debug for Process<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.handle.raw())
            .field("lifecycle", &P::LIFECYCLE)
            .finish()
    }
}

impl<P: ProcessPolicy> Finalize for Process<P> {
    fn is_bound(&self) -> bool {
        self.valid()
    }

    fn describe(&self) -> String {
        format!("process {}", self.handle.raw())
    }

    fn cancel(&mut self) -> SysResult<()> {
        Err(SystemError::InvalidArgument)
    }

    fn signal(&mut self, signal: i32) -> SysResult<()> {
        self.kill(signal)
    }

    fn detach(&mut self) -> SysResult<()> {
        Err(SystemError::InvalidArgument)
    }

    fn join(&mut self) -> SysResult<()> {
        while self.valid() {
            match self.wait(WaitOptions::empty()) {
                Err(SystemError::Interrupted) => continue,
                Err(e) => return Err(e),
                Ok(_) => {}
            }
        }
        Ok(())
    }
}

impl<P: ProcessPolicy> Drop for Process<P> {
    fn drop(&mut self) {
        match P::LIFECYCLE.for_process() {
            Ok(lifecycle) => finalize(self, lifecycle),
            Err(e) => log::warn!("{} not finalized: {}", self.describe(), e),
        }
    }
}
