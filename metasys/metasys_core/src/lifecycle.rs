//! End-of-life policies for threads and processes.
//!
//! A thread or child process cannot simply be "released" when its handle
//! goes away; someone has to decide whether to wait for it, let it go, or
//! stop it first. A [`Lifecycle`] records that decision as a terminal
//! action optionally preceded by a signal, and a [`Policy`] marker type
//! fixes one lifecycle per handle type:
//!
//! ```
//! use metasys_core::lifecycle::{Lifecycle, Policy, PreSignal, TerminalAction};
//!
//! struct StopThenWait;
//!
//! impl Policy for StopThenWait {
//!     const LIFECYCLE: Lifecycle = Lifecycle::new(TerminalAction::Join, PreSignal::Kill(15));
//! }
//!
//! assert_eq!(StopThenWait::LIFECYCLE.pre_signal(), PreSignal::Kill(15));
//! ```
//!
//! [`finalize`] runs a lifecycle against anything implementing [`Finalize`].

use crate::error::{PolicyError, SysResult};
use serde::{Deserialize, Serialize};

/// What happens to a still-bound entity when its handle is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalAction {
    /// Do nothing; the entity is someone else's concern.
    Nothing,
    /// Destroying a bound handle is a fatal programming error.
    Terminate,
    /// Disassociate without blocking.
    Detach,
    /// Block until the entity ends.
    Join,
}

/// Signal delivered before the terminal action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreSignal {
    /// No signal.
    None,
    /// Request native cancellation.
    Cancel,
    /// Deliver the given signal number.
    Kill(i32),
}

/// A validated pair of terminal action and pre-signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LifecycleRecord")]
pub struct Lifecycle {
    terminal: TerminalAction,
    pre_signal: PreSignal,
}

impl Lifecycle {
    /// Leave the entity alone.
    pub const NOTHING: Self = Self::new(TerminalAction::Nothing, PreSignal::None);
    /// Refuse to destroy a bound handle.
    pub const TERMINATE: Self = Self::new(TerminalAction::Terminate, PreSignal::None);
    /// Detach on destruction.
    pub const DETACH: Self = Self::new(TerminalAction::Detach, PreSignal::None);
    /// Join on destruction.
    pub const JOIN: Self = Self::new(TerminalAction::Join, PreSignal::None);
    /// Cancel, then join.
    pub const JOIN_AFTER_CANCEL: Self = Self::new(TerminalAction::Join, PreSignal::Cancel);

    /// Build a lifecycle, failing to compile when used in a constant with a
    /// conflicting combination.
    ///
    /// # Panics
    ///
    /// Panics if [`Lifecycle::try_new`] would fail.
    pub const fn new(terminal: TerminalAction, pre_signal: PreSignal) -> Self {
        match Self::validate(terminal, pre_signal) {
            Ok(()) => Self {
                terminal,
                pre_signal,
            },
            Err(PolicyError::SignalBeforeTerminate) => {
                panic!("a pre-signal cannot be combined with the Terminate action")
            }
            Err(_) => panic!("Kill needs a positive signal number"),
        }
    }

    /// Build a lifecycle, rejecting conflicting combinations.
    pub fn try_new(terminal: TerminalAction, pre_signal: PreSignal) -> Result<Self, PolicyError> {
        Self::validate(terminal, pre_signal)?;
        Ok(Self {
            terminal,
            pre_signal,
        })
    }

    /// Kill with `signal`, then join.
    pub const fn join_after_kill(signal: i32) -> Self {
        Self::new(TerminalAction::Join, PreSignal::Kill(signal))
    }

    const fn validate(terminal: TerminalAction, pre_signal: PreSignal) -> Result<(), PolicyError> {
        match (terminal, pre_signal) {
            (_, PreSignal::Kill(signal)) if signal <= 0 => Err(PolicyError::InvalidSignal(signal)),
            (TerminalAction::Terminate, PreSignal::Cancel | PreSignal::Kill(_)) => {
                Err(PolicyError::SignalBeforeTerminate)
            }
            _ => Ok(()),
        }
    }

    /// Check that this lifecycle is usable for processes, which cannot be
    /// detached.
    pub fn for_process(self) -> Result<Self, PolicyError> {
        match self.terminal {
            TerminalAction::Detach => Err(PolicyError::DetachedProcess),
            _ => Ok(self),
        }
    }

    /// The terminal action.
    pub const fn terminal(&self) -> TerminalAction {
        self.terminal
    }

    /// The pre-signal action.
    pub const fn pre_signal(&self) -> PreSignal {
        self.pre_signal
    }
}

#[derive(Deserialize)]
struct LifecycleRecord {
    terminal: TerminalAction,
    pre_signal: PreSignal,
}

impl TryFrom<LifecycleRecord> for Lifecycle {
    type Error = PolicyError;

    fn try_from(record: LifecycleRecord) -> Result<Self, Self::Error> {
        Self::try_new(record.terminal, record.pre_signal)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::TERMINATE
    }
}

/// Type-level selection of a lifecycle.
pub trait Policy {
    /// The lifecycle applied when a bound handle is destroyed.
    const LIFECYCLE: Lifecycle;
}

/// Leave the entity alone.
#[derive(Debug)]
pub enum Nothing {}

/// Abort if the handle is destroyed while bound.
#[derive(Debug)]
pub enum Terminate {}

/// Detach on destruction.
#[derive(Debug)]
pub enum Detach {}

/// Join (or wait) on destruction.
#[derive(Debug)]
pub enum Join {}

/// Cancel, then join.
#[derive(Debug)]
pub enum JoinAfterCancel {}

/// Deliver `SIG`, then join.
#[derive(Debug)]
pub enum JoinAfterKill<const SIG: i32> {}

impl Policy for Nothing {
    const LIFECYCLE: Lifecycle = Lifecycle::NOTHING;
}

impl Policy for Terminate {
    const LIFECYCLE: Lifecycle = Lifecycle::TERMINATE;
}

impl Policy for Detach {
    const LIFECYCLE: Lifecycle = Lifecycle::DETACH;
}

impl Policy for Join {
    const LIFECYCLE: Lifecycle = Lifecycle::JOIN;
}

impl Policy for JoinAfterCancel {
    const LIFECYCLE: Lifecycle = Lifecycle::JOIN_AFTER_CANCEL;
}

impl<const SIG: i32> Policy for JoinAfterKill<SIG> {
    const LIFECYCLE: Lifecycle = Lifecycle::join_after_kill(SIG);
}

/// The native steps a lifecycle is built from.
pub trait Finalize {
    /// Whether a native entity is still bound to the handle.
    fn is_bound(&self) -> bool;

    /// Short description for logs.
    fn describe(&self) -> String;

    /// Request native cancellation.
    fn cancel(&mut self) -> SysResult<()>;

    /// Deliver `signal`.
    fn signal(&mut self, signal: i32) -> SysResult<()>;

    /// Disassociate without blocking. Leaves the handle unbound.
    fn detach(&mut self) -> SysResult<()>;

    /// Block until the entity ends. Leaves the handle unbound.
    fn join(&mut self) -> SysResult<()>;
}

/// Apply `lifecycle` to `target`: the pre-signal first, then the terminal
/// action. Unbound targets are left alone. Failures of either step are
/// logged, since there is no caller left to report them to.
///
/// # Aborts
///
/// Aborts the process when the terminal action is `Terminate` and the
/// target is still bound.
pub fn finalize<T: Finalize + ?Sized>(target: &mut T, lifecycle: Lifecycle) {
    if !target.is_bound() {
        return;
    }

    let delivered = match lifecycle.pre_signal() {
        PreSignal::None => Ok(()),
        PreSignal::Cancel => target.cancel(),
        PreSignal::Kill(signal) => target.signal(signal),
    };
    if let Err(e) = delivered {
        log::warn!(
            "pre-signal {:?} to {} failed: {}",
            lifecycle.pre_signal(),
            target.describe(),
            e
        );
    }

    let result = match lifecycle.terminal() {
        TerminalAction::Nothing => Ok(()),
        TerminalAction::Terminate => {
            if target.is_bound() {
                log::error!("{} destroyed while still running", target.describe());
                std::process::abort();
            }
            Ok(())
        }
        TerminalAction::Detach => target.detach(),
        TerminalAction::Join => target.join(),
    };
    if let Err(e) = result {
        log::warn!(
            "{:?} of {} failed: {}",
            lifecycle.terminal(),
            target.describe(),
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SystemError;

    #[derive(Default)]
    struct Recorder {
        bound: bool,
        steps: Vec<String>,
        fail_signal: bool,
    }

    impl Finalize for Recorder {
        fn is_bound(&self) -> bool {
            self.bound
        }

        fn describe(&self) -> String {
            "recorder".to_string()
        }

        fn cancel(&mut self) -> SysResult<()> {
            self.steps.push("cancel".to_string());
            Ok(())
        }

        fn signal(&mut self, signal: i32) -> SysResult<()> {
            self.steps.push(format!("kill {}", signal));
            if self.fail_signal {
                Err(SystemError::NoSuchProcess)
            } else {
                Ok(())
            }
        }

        fn detach(&mut self) -> SysResult<()> {
            self.steps.push("detach".to_string());
            self.bound = false;
            Ok(())
        }

        fn join(&mut self) -> SysResult<()> {
            self.steps.push("join".to_string());
            self.bound = false;
            Ok(())
        }
    }

    fn bound() -> Recorder {
        Recorder {
            bound: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_pre_signal_runs_before_terminal() {
        let mut target = bound();
        finalize(&mut target, Lifecycle::join_after_kill(libc::SIGUSR1));
        assert_eq!(target.steps, vec![format!("kill {}", libc::SIGUSR1), "join".to_string()]);
        assert!(!target.bound);
    }

    #[test]
    fn test_cancel_then_join() {
        let mut target = bound();
        finalize(&mut target, JoinAfterCancel::LIFECYCLE);
        assert_eq!(target.steps, vec!["cancel", "join"]);
    }

    #[test]
    fn test_detach_and_nothing() {
        let mut target = bound();
        finalize(&mut target, Detach::LIFECYCLE);
        assert_eq!(target.steps, vec!["detach"]);

        let mut target = bound();
        finalize(&mut target, Nothing::LIFECYCLE);
        assert!(target.steps.is_empty());
        assert!(target.bound);
    }

    #[test]
    fn test_unbound_target_is_skipped() {
        let mut target = Recorder::default();
        finalize(&mut target, Lifecycle::TERMINATE);
        finalize(&mut target, Lifecycle::JOIN_AFTER_CANCEL);
        assert!(target.steps.is_empty());
    }

    #[test]
    fn test_failed_signal_still_joins() {
        let mut target = Recorder {
            fail_signal: true,
            ..bound()
        };
        finalize(&mut target, JoinAfterKill::<15>::LIFECYCLE);
        assert_eq!(target.steps, vec!["kill 15", "join"]);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            Lifecycle::try_new(TerminalAction::Terminate, PreSignal::Cancel),
            Err(PolicyError::SignalBeforeTerminate)
        );
        assert_eq!(
            Lifecycle::try_new(TerminalAction::Join, PreSignal::Kill(0)),
            Err(PolicyError::InvalidSignal(0))
        );
        assert_eq!(
            Lifecycle::try_new(TerminalAction::Detach, PreSignal::Cancel)
                .map(|lifecycle| lifecycle.terminal()),
            Ok(TerminalAction::Detach)
        );
        assert_eq!(Lifecycle::DETACH.for_process(), Err(PolicyError::DetachedProcess));
        assert!(Lifecycle::JOIN.for_process().is_ok());
    }

    #[test]
    #[should_panic(expected = "Terminate")]
    fn test_new_rejects_conflict() {
        let terminal = std::hint::black_box(TerminalAction::Terminate);
        let _ = Lifecycle::new(terminal, PreSignal::Kill(9));
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&Lifecycle::JOIN_AFTER_CANCEL).unwrap();
        let back: Lifecycle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Lifecycle::JOIN_AFTER_CANCEL);

        let conflicting = r#"{"terminal":"Terminate","pre_signal":"Cancel"}"#;
        assert!(serde_json::from_str::<Lifecycle>(conflicting).is_err());
    }
}
