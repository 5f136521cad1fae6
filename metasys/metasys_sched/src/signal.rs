//! Signal dispositions.

use bitflags::bitflags;
use metasys_core::outcome::Outcome;
use metasys_core::{contract, SysResult};
use std::fmt;
use std::mem;
use std::ptr;

contract!(INSTALL: "sigaction" => EFAULT, EINVAL);
contract!(SAVE: "sigaction" => EFAULT, EINVAL);
contract!(MASK: "sigset" => EINVAL);

/// A plain signal handler.
pub type SignalHandler = extern "C" fn(libc::c_int);

/// A handler that also receives `siginfo_t` and the interrupted context.
pub type InfoHandler = extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void);

bitflags! {
    /// `SA_*` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SigFlags: i32 {
        /// Do not report stopped children
        const NOCLDSTOP = libc::SA_NOCLDSTOP;
        /// Do not turn dead children into zombies
        const NOCLDWAIT = libc::SA_NOCLDWAIT;
        /// Do not block the signal inside its own handler
        const NODEFER = libc::SA_NODEFER;
        /// Run the handler on the alternate stack
        const ONSTACK = libc::SA_ONSTACK;
        /// Restore the default action after one delivery
        const RESETHAND = libc::SA_RESETHAND;
        /// Restart interruptible system calls
        const RESTART = libc::SA_RESTART;
        /// The handler takes `siginfo_t`
        const SIGINFO = libc::SA_SIGINFO;
    }
}

/// A `struct sigaction`: the action taken on delivery of one signal.
#[derive(Clone, Copy)]
pub struct Sigaction {
    raw: libc::sigaction,
}

impl Sigaction {
    fn with_action(action: libc::sighandler_t, flags: SigFlags) -> Self {
        // SAFETY: struct sigaction is plain data; zero is SIG_DFL.
        let mut raw: libc::sigaction = unsafe { mem::zeroed() };
        raw.sa_sigaction = action;
        raw.sa_flags = flags.bits();
        let mut sigaction = Self { raw };
        sigaction.empty_mask();
        sigaction
    }

    /// The default action.
    pub fn default_action() -> Self {
        Self::with_action(libc::SIG_DFL, SigFlags::empty())
    }

    /// Ignore the signal.
    pub fn ignore() -> Self {
        Self::with_action(libc::SIG_IGN, SigFlags::empty())
    }

    /// Run `handler` on delivery.
    pub fn handler(handler: SignalHandler, flags: SigFlags) -> Self {
        Self::with_action(handler as libc::sighandler_t, flags - SigFlags::SIGINFO)
    }

    /// Run `handler` with signal information on delivery.
    pub fn info_handler(handler: InfoHandler, flags: SigFlags) -> Self {
        Self::with_action(handler as libc::sighandler_t, flags | SigFlags::SIGINFO)
    }

    /// The same action with `signals` blocked while the handler runs.
    ///
    /// # Panics
    ///
    /// Panics if a signal number is invalid.
    pub fn with_mask(mut self, signals: &[i32]) -> Self {
        for &signal in signals {
            self.add_mask(signal);
        }
        self
    }

    /// The action flags.
    pub fn flags(&self) -> SigFlags {
        SigFlags::from_bits_truncate(self.raw.sa_flags)
    }

    /// Whether this is the default action.
    pub fn is_default(&self) -> bool {
        !self.flags().contains(SigFlags::SIGINFO) && self.raw.sa_sigaction == libc::SIG_DFL
    }

    /// Whether the signal is ignored.
    pub fn is_ignore(&self) -> bool {
        !self.flags().contains(SigFlags::SIGINFO) && self.raw.sa_sigaction == libc::SIG_IGN
    }

    /// Block no signals during the handler.
    pub fn empty_mask(&mut self) {
        unsafe { libc::sigemptyset(&mut self.raw.sa_mask) };
    }

    /// Block every signal during the handler.
    pub fn fill_mask(&mut self) {
        unsafe { libc::sigfillset(&mut self.raw.sa_mask) };
    }

    /// Block `signal` during the handler.
    ///
    /// # Panics
    ///
    /// Panics if `signal` is not a valid signal number.
    pub fn add_mask(&mut self, signal: i32) {
        let ret = unsafe { libc::sigaddset(&mut self.raw.sa_mask, signal) };
        MASK.require(ret == 0, "invalid signal number");
    }

    /// Stop blocking `signal` during the handler.
    ///
    /// # Panics
    ///
    /// Panics if `signal` is not a valid signal number.
    pub fn del_mask(&mut self, signal: i32) {
        let ret = unsafe { libc::sigdelset(&mut self.raw.sa_mask, signal) };
        MASK.require(ret == 0, "invalid signal number");
    }

    /// Whether `signal` is blocked during the handler.
    ///
    /// # Panics
    ///
    /// Panics if `signal` is not a valid signal number.
    pub fn is_masked(&self, signal: i32) -> bool {
        let ret = unsafe { libc::sigismember(&self.raw.sa_mask, signal) };
        MASK.require(ret >= 0, "invalid signal number");
        ret == 1
    }

    /// Raw `sigaction(2)` installing this action for `signal`. The
    /// previous action is stored in `previous` when given.
    ///
    /// # Safety
    ///
    /// A handler must only do async-signal-safe work.
    pub unsafe fn install_with<H, R>(&self, signal: i32, previous: Option<&mut Sigaction>, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::c_int>) -> R,
    {
        let old = previous.map_or(ptr::null_mut(), |previous| &mut previous.raw as *mut libc::sigaction);
        handler(Outcome::invoke(|| libc::sigaction(signal, &self.raw, old)))
    }

    /// Install this action for `signal` and return the one it replaces.
    ///
    /// # Safety
    ///
    /// A handler must only do async-signal-safe work.
    pub unsafe fn install(&self, signal: i32) -> SysResult<Sigaction> {
        let mut previous = Self::default_action();
        self.install_with(signal, Some(&mut previous), |outcome| outcome.check_status(&INSTALL))?;
        log::debug!("installed {:?} for signal {}", self, signal);
        Ok(previous)
    }

    /// Install `action` for `signal`; the previous action after one raw
    /// call, or the default action if it failed.
    ///
    /// # Safety
    ///
    /// A handler must only do async-signal-safe work.
    pub unsafe fn install_init_with<H>(action: &Sigaction, signal: i32, handler: H) -> Self
    where
        H: FnOnce(Outcome<libc::c_int>),
    {
        let mut previous = Self::default_action();
        action.install_with(signal, Some(&mut previous), handler);
        previous
    }

    /// Raw `sigaction(2)` reading the current action for `signal` into
    /// `self`.
    pub fn save_with<H, R>(&mut self, signal: i32, handler: H) -> R
    where
        H: FnOnce(Outcome<libc::c_int>) -> R,
    {
        let raw = &mut self.raw as *mut libc::sigaction;
        handler(Outcome::invoke(|| unsafe { libc::sigaction(signal, ptr::null(), raw) }))
    }

    /// Read the current action for `signal` into `self`.
    pub fn save(&mut self, signal: i32) -> SysResult<()> {
        self.save_with(signal, |outcome| outcome.check_status(&SAVE))
    }

    /// The current action for `signal`.
    pub fn save_init(signal: i32) -> SysResult<Self> {
        let mut sigaction = Self::default_action();
        sigaction.save(signal)?;
        Ok(sigaction)
    }

    /// The action after one raw read; the default action if it failed.
    pub fn save_init_with<H>(signal: i32, handler: H) -> Self
    where
        H: FnOnce(Outcome<libc::c_int>),
    {
        let mut sigaction = Self::default_action();
        sigaction.save_with(signal, handler);
        sigaction
    }

    /// The native record.
    pub fn as_raw(&self) -> &libc::sigaction {
        &self.raw
    }
}

impl Default for Sigaction {
    fn default() -> Self {
        Self::default_action()
    }
}

impl fmt::Debug for Sigaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = if self.is_default() {
            "default".to_string()
        } else if self.is_ignore() {
            "ignore".to_string()
        } else {
            format!("{:#x}", self.raw.sa_sigaction)
        };
        f.debug_struct("Sigaction")
            .field("action", &action)
            .field("flags", &self.flags())
            .finish()
    }
}
