//! Raw outcomes and the checked calling convention.
//!
//! Every wrapped operation comes in three forms:
//!
//! 1. a raw form, `op_with(args, handler)`, which performs the native call
//!    once and hands the unmodified [`Outcome`] to `handler`;
//! 2. a checked form, `op(args)`, built on the raw form, which turns a
//!    failed outcome into a [`SystemError`] through the operation's
//!    [`Contract`];
//! 3. an init form, `op_init(args)` / `op_init_with(args, handler)`, a
//!    factory that starts from the sentinel, performs one acquisition and
//!    returns the handle whatever happened.
//!
//! A contract lists the errno values that can only come from a caller bug
//! (bad descriptor, bad pointer, disallowed flag). Those are asserted
//! against instead of being reported.

use crate::error::{SysResult, SystemError};
use std::io;

/// Read the calling thread's `errno`.
pub fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

fn clear_errno() {
    // SAFETY: __errno_location always returns the thread's errno slot.
    unsafe { *libc::__errno_location() = 0 };
}

/// The native result of one call together with the `errno` observed
/// right after it.
///
/// `errno` is cleared before the call, so it is zero whenever the call
/// did not set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome<T> {
    value: T,
    errno: i32,
}

impl<T: Copy> Outcome<T> {
    /// Run a native call and capture its result and `errno`.
    pub fn invoke(call: impl FnOnce() -> T) -> Self {
        clear_errno();
        let value = call();
        Self {
            value,
            errno: last_errno(),
        }
    }

    /// Build an outcome from parts.
    pub const fn new(value: T, errno: i32) -> Self {
        Self { value, errno }
    }

    /// The native return value.
    pub fn value(&self) -> T {
        self.value
    }

    /// The `errno` captured after the call.
    pub fn errno(&self) -> i32 {
        self.errno
    }

    /// The captured `errno` as an error value, without contract checks.
    pub fn error(&self) -> SystemError {
        SystemError::from_errno(self.errno)
    }

    /// Classify the outcome with `failed` and raise through `contract`
    /// when it denotes failure.
    pub fn check(self, failed: impl FnOnce(T) -> bool, contract: &Contract) -> SysResult<T> {
        if failed(self.value) {
            Err(contract.raise(self.errno))
        } else {
            Ok(self.value)
        }
    }
}

impl Outcome<libc::c_int> {
    /// Outcome of a call that returns its error code directly, as the
    /// pthread functions do. The code doubles as the errno.
    pub fn status(code: libc::c_int) -> Self {
        Self {
            value: code,
            errno: code,
        }
    }

    /// Check a call whose failure sentinel is `-1`.
    pub fn check_status(self, contract: &Contract) -> SysResult<()> {
        self.check(|ret| ret == -1, contract).map(|_| ())
    }

    /// Check a call that returns zero on success and an error code otherwise.
    pub fn check_code(self, contract: &Contract) -> SysResult<()> {
        self.check(|ret| ret != 0, contract).map(|_| ())
    }
}

/// The error table of one operation: which codes are contract violations.
#[derive(Debug, Clone, Copy)]
pub struct Contract {
    operation: &'static str,
    violations: &'static [i32],
}

impl Contract {
    /// Declare the contract of `operation`.
    pub const fn new(operation: &'static str, violations: &'static [i32]) -> Self {
        Self {
            operation,
            violations,
        }
    }

    /// Name of the guarded operation.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Whether `errno` indicates a caller bug for this operation.
    pub fn is_violation(&self, errno: i32) -> bool {
        self.violations.contains(&errno)
    }

    /// Turn a failure code into an error value.
    ///
    /// # Panics
    ///
    /// Panics when `errno` is one of the contract's violation codes.
    pub fn raise(&self, errno: i32) -> SystemError {
        assert!(
            !self.is_violation(errno),
            "{}: contract violation: {}",
            self.operation,
            io::Error::from_raw_os_error(errno)
        );
        let error = SystemError::from_errno(errno);
        log::debug!("{} failed: {} ({})", self.operation, error, error.name());
        error
    }

    /// Assert an operation precondition on handle state.
    ///
    /// # Panics
    ///
    /// Panics with `what` when `holds` is false.
    pub fn require(&self, holds: bool, what: &str) {
        assert!(holds, "{}: {}", self.operation, what);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: Contract = Contract::new("sample", &[libc::EBADF, libc::EFAULT]);

    #[test]
    fn test_invoke_captures_errno() {
        let outcome = Outcome::invoke(|| unsafe { libc::close(-1) });
        assert_eq!(outcome.value(), -1);
        assert_eq!(outcome.errno(), libc::EBADF);
    }

    #[test]
    fn test_invoke_clears_stale_errno() {
        let _ = Outcome::invoke(|| unsafe { libc::close(-1) });
        let outcome = Outcome::invoke(|| unsafe { libc::getpid() });
        assert!(outcome.value() > 0);
        assert_eq!(outcome.errno(), 0);
    }

    #[test]
    fn test_check_success_passes_value() {
        let outcome = Outcome::new(7isize, 0);
        assert_eq!(outcome.check(|n| n < 0, &SAMPLE), Ok(7));
    }

    #[test]
    fn test_check_failure_raises() {
        let outcome = Outcome::new(-1isize, libc::EAGAIN);
        assert_eq!(outcome.check(|n| n < 0, &SAMPLE), Err(SystemError::WouldBlock));
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_violation_panics() {
        let _ = Outcome::new(-1isize, libc::EBADF).check(|n| n < 0, &SAMPLE);
    }

    #[test]
    fn test_status_outcome() {
        let outcome = Outcome::status(libc::EBUSY);
        assert_eq!(outcome.errno(), libc::EBUSY);
        assert_eq!(outcome.check_code(&SAMPLE), Err(SystemError::Busy));
        assert_eq!(Outcome::status(0).check_code(&SAMPLE), Ok(()));
    }

    #[test]
    fn test_contract_accessors() {
        assert_eq!(SAMPLE.operation(), "sample");
        assert!(SAMPLE.is_violation(libc::EFAULT));
        assert!(!SAMPLE.is_violation(libc::EINTR));
    }
}
