//! Capability layers for descriptor-backed handles.
//!
//! Each layer is a trait with default methods only. A composite type gains
//! a layer with an empty `impl Readable for MyType {}`; the layer reads the
//! descriptor through [`Descriptor`] and stores nothing of its own, so the
//! layers a type carries can be listed in any order.
//!
//! Releasing on drop is not a layer: it belongs to [`crate::handle::Handle`]
//! itself, which every owning composite holds directly. [`Closable`] only
//! adds the explicit, reporting `close`.

use crate::contract;
use crate::descriptor::{Descriptor, OwnedDescriptor};
use crate::error::SysResult;
use crate::outcome::Outcome;

contract!(READ: "read" => EBADF, EFAULT, EISDIR);
contract!(WRITE: "write" => EBADF, EDESTADDRREQ, EFAULT, EINVAL, EISDIR);
contract!(SEEK: "seek" => EBADF, ESPIPE);
contract!(CLOSE: "close" => EBADF);

/// Reference point for [`Seekable::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the file
    Start,
    /// From the current offset
    Current,
    /// From the end of the file
    End,
}

impl Whence {
    fn as_raw(self) -> libc::c_int {
        match self {
            Self::Start => libc::SEEK_SET,
            Self::Current => libc::SEEK_CUR,
            Self::End => libc::SEEK_END,
        }
    }
}

/// Read bytes from the descriptor.
pub trait Readable: Descriptor {
    /// Raw `read(2)`: the handler receives the signed byte count.
    ///
    /// # Panics
    ///
    /// Panics if no descriptor is held.
    fn read_with<F, R>(&self, buf: &mut [u8], handler: F) -> R
    where
        F: FnOnce(Outcome<isize>) -> R,
    {
        READ.require(self.valid(), "descriptor is not open");
        let fd = self.fd();
        handler(Outcome::invoke(|| unsafe {
            libc::read(fd, buf.as_mut_ptr().cast(), buf.len())
        }))
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` is end of stream.
    fn read(&self, buf: &mut [u8]) -> SysResult<usize> {
        self.read_with(buf, |outcome| {
            outcome.check(|n| n < 0, &READ).map(|n| n as usize)
        })
    }
}

/// Write bytes to the descriptor.
pub trait Writable: Descriptor {
    /// Raw `write(2)`, retried while it fails with `EINTR`. The handler
    /// receives the signed byte count of the final attempt.
    ///
    /// # Panics
    ///
    /// Panics if no descriptor is held.
    fn write_with<F, R>(&self, buf: &[u8], handler: F) -> R
    where
        F: FnOnce(Outcome<isize>) -> R,
    {
        WRITE.require(self.valid(), "descriptor is not open");
        let fd = self.fd();
        let outcome = loop {
            let outcome =
                Outcome::invoke(|| unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) });
            if outcome.value() < 0 && outcome.errno() == libc::EINTR {
                continue;
            }
            break outcome;
        };
        handler(outcome)
    }

    /// Write up to `buf.len()` bytes and return how many were written.
    /// A short write is a success. Writing nothing from a non-empty buffer
    /// is a failure.
    fn write(&self, buf: &[u8]) -> SysResult<usize> {
        let empty = buf.is_empty();
        self.write_with(buf, |outcome| {
            outcome
                .check(|n| n < 0 || (n == 0 && !empty), &WRITE)
                .map(|n| n as usize)
        })
    }
}

/// Reposition the descriptor's file offset.
pub trait Seekable: Descriptor {
    /// Raw `lseek(2)`: the handler receives the resulting offset or `-1`.
    ///
    /// # Panics
    ///
    /// Panics if no descriptor is held.
    fn seek_with<F, R>(&self, offset: i64, whence: Whence, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::off_t>) -> R,
    {
        SEEK.require(self.valid(), "descriptor is not open");
        let fd = self.fd();
        handler(Outcome::invoke(|| unsafe {
            libc::lseek(fd, offset as libc::off_t, whence.as_raw())
        }))
    }

    /// Move the offset and return the new position from the start.
    fn seek(&self, offset: i64, whence: Whence) -> SysResult<u64> {
        self.seek_with(offset, whence, |outcome| {
            outcome.check(|pos| pos == -1, &SEEK).map(|pos| pos as u64)
        })
    }

    /// The current offset.
    fn position(&self) -> SysResult<u64> {
        self.seek(0, Whence::Current)
    }

    /// Move the offset back to the start.
    fn rewind(&self) -> SysResult<()> {
        self.seek(0, Whence::Start).map(|_| ())
    }
}

/// Explicit, reporting close. The handle is at the sentinel afterwards
/// whatever the outcome.
pub trait Closable: OwnedDescriptor {
    /// Raw `close(2)`.
    ///
    /// # Panics
    ///
    /// Panics if no descriptor is held.
    fn close_with<F, R>(&mut self, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        CLOSE.require(self.valid(), "descriptor is not open");
        let fd = self.handle_mut().take();
        log::trace!("closing descriptor {}", fd);
        handler(Outcome::invoke(|| unsafe { libc::close(fd) }))
    }

    /// Close the descriptor.
    fn close(&mut self) -> SysResult<()> {
        self.close_with(|outcome| outcome.check_status(&CLOSE))
    }
}
