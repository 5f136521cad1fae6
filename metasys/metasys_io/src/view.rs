//! Non-owning descriptor views with one direction each.
//!
//! Views never close their descriptor, so they are what a pipe hands out
//! for its ends and what the standard streams are exposed as.

use metasys_core::descriptor::{Descriptor, FdView};
use metasys_core::{Readable, View, Writable};
use std::os::fd::RawFd;

/// A readable view of a descriptor owned elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct InputView<'a> {
    view: FdView<'a>,
}

/// A writable view of a descriptor owned elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct OutputView<'a> {
    view: FdView<'a>,
}

impl<'a> InputView<'a> {
    /// Wrap a borrowed descriptor.
    pub fn new(view: FdView<'a>) -> Self {
        Self { view }
    }
}

impl<'a> OutputView<'a> {
    /// Wrap a borrowed descriptor.
    pub fn new(view: FdView<'a>) -> Self {
        Self { view }
    }
}

impl Descriptor for InputView<'_> {
    fn fd(&self) -> RawFd {
        self.view.raw()
    }
}

impl Descriptor for OutputView<'_> {
    fn fd(&self) -> RawFd {
        self.view.raw()
    }
}

impl Readable for InputView<'_> {}
impl Writable for OutputView<'_> {}

/// Standard input.
pub fn stdin() -> InputView<'static> {
    // SAFETY: descriptor 0 belongs to the process for its whole lifetime.
    InputView::new(unsafe { View::from_raw(libc::STDIN_FILENO) })
}

/// Standard output.
pub fn stdout() -> OutputView<'static> {
    // SAFETY: descriptor 1 belongs to the process for its whole lifetime.
    OutputView::new(unsafe { View::from_raw(libc::STDOUT_FILENO) })
}

/// Standard error.
pub fn stderr() -> OutputView<'static> {
    // SAFETY: descriptor 2 belongs to the process for its whole lifetime.
    OutputView::new(unsafe { View::from_raw(libc::STDERR_FILENO) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_streams() {
        assert_eq!(stdin().fd(), 0);
        assert_eq!(stdout().fd(), 1);
        assert_eq!(stderr().fd(), 2);
    }

    #[test]
    fn test_views_copy() {
        let out = stderr();
        let copy = out;
        assert_eq!(out.fd(), copy.fd());
        assert!(copy.valid());
    }
}
