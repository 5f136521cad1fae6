//! File descriptors as a handle kind.

use crate::handle::{Handle, Resource, View};
use std::os::fd::{AsRawFd, RawFd};

/// Resource kind for file descriptors. The sentinel is `-1` and any
/// non-negative value is a descriptor.
#[derive(Debug)]
pub enum Fd {}

impl Resource for Fd {
    type Id = RawFd;
    const SENTINEL: RawFd = -1;
    const NAME: &'static str = "descriptor";

    fn is_valid(id: RawFd) -> bool {
        id >= 0
    }

    fn release(id: RawFd) {
        // SAFETY: the handle owned `id` and gives it up here.
        unsafe { libc::close(id) };
    }
}

/// Owning descriptor handle.
pub type FdHandle = Handle<Fd>;

/// Borrowed descriptor.
pub type FdView<'a> = View<'a, Fd>;

/// Anything backed by a single descriptor. Capability layers build on this.
pub trait Descriptor {
    /// The raw descriptor, `-1` when none is held.
    fn fd(&self) -> RawFd;

    /// Whether a descriptor is held.
    fn valid(&self) -> bool {
        Fd::is_valid(self.fd())
    }

    /// Whether the kernel still knows the descriptor (`fcntl(F_GETFD)`).
    fn is_open(&self) -> bool {
        self.valid() && unsafe { libc::fcntl(self.fd(), libc::F_GETFD) } != -1
    }
}

/// A descriptor composite that owns its handle.
pub trait OwnedDescriptor: Descriptor {
    /// The owned handle.
    fn handle(&self) -> &FdHandle;

    /// The owned handle, mutably.
    fn handle_mut(&mut self) -> &mut FdHandle;

    /// A non-owning view of the descriptor.
    fn view(&self) -> FdView<'_> {
        self.handle().view()
    }
}

impl Descriptor for FdHandle {
    fn fd(&self) -> RawFd {
        self.raw()
    }
}

impl Descriptor for FdView<'_> {
    fn fd(&self) -> RawFd {
        self.raw()
    }
}

impl AsRawFd for FdHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.raw()
    }
}

impl AsRawFd for FdView<'_> {
    fn as_raw_fd(&self) -> RawFd {
        self.raw()
    }
}

/// Implement [`Descriptor`] and [`OwnedDescriptor`] for a struct whose
/// named field holds an [`FdHandle`].
#[macro_export]
macro_rules! owned_descriptor {
    ($type:ty, $field:ident) => {
        impl $crate::descriptor::Descriptor for $type {
            fn fd(&self) -> ::std::os::fd::RawFd {
                self.$field.raw()
            }
        }

        impl $crate::descriptor::OwnedDescriptor for $type {
            fn handle(&self) -> &$crate::descriptor::FdHandle {
                &self.$field
            }

            fn handle_mut(&mut self) -> &mut $crate::descriptor::FdHandle {
                &mut self.$field
            }
        }

        impl ::std::os::fd::AsRawFd for $type {
            fn as_raw_fd(&self) -> ::std::os::fd::RawFd {
                self.$field.raw()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dup_stdout() -> FdHandle {
        unsafe { FdHandle::from_raw(libc::dup(1)) }
    }

    #[test]
    fn test_sentinel_descriptor() {
        let handle = FdHandle::new();
        assert_eq!(handle.fd(), -1);
        assert!(!Descriptor::valid(&handle));
        assert!(!handle.is_open());
    }

    #[test]
    fn test_drop_closes_descriptor() {
        let mut fds = [-1; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let reader = unsafe { FdHandle::from_raw(fds[0]) };
        let writer = unsafe { FdHandle::from_raw(fds[1]) };
        assert!(writer.is_open());
        drop(writer);

        // With the only write end closed the reader sees end-of-stream.
        let mut buf = [0u8; 4];
        let n = unsafe { libc::read(reader.fd(), buf.as_mut_ptr().cast(), buf.len()) };
        assert_eq!(n, 0);
    }

    #[test]
    fn test_view_does_not_close() {
        let handle = dup_stdout();
        {
            let view = handle.view();
            assert!(view.is_open());
        }
        assert!(handle.is_open());
    }
}
