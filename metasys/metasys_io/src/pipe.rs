//! Anonymous pipes.
//!
//! A [`Pipe`] owns both ends. The ends can be used in place through views
//! ([`Pipe::read_end`], [`Pipe::write_end`]) or moved out as owning
//! halves ([`Pipe::take_reader`], [`Pipe::take_writer`]) so that, for
//! example, the write end can be closed to signal end-of-stream.

use crate::view::{InputView, OutputView};
use bitflags::bitflags;
use metasys_core::descriptor::{Descriptor, FdHandle};
use metasys_core::outcome::Outcome;
use metasys_core::{contract, owned_descriptor, Closable, Readable, SysResult, Writable};

contract!(PIPE: "pipe" => EFAULT, EINVAL);

bitflags! {
    /// Flags accepted by `pipe2(2)`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct PipeFlags: i32 {
        /// Close both ends on exec.
        const CLOEXEC = libc::O_CLOEXEC;
        /// Non-blocking ends.
        const NONBLOCK = libc::O_NONBLOCK;
        /// Packet mode.
        const DIRECT = libc::O_DIRECT;
    }
}

/// Both ends of a pipe.
#[derive(Debug, Default)]
pub struct Pipe {
    reader: FdHandle,
    writer: FdHandle,
}

/// Owning read end taken out of a [`Pipe`].
#[derive(Debug, Default)]
pub struct PipeReader {
    handle: FdHandle,
}

/// Owning write end taken out of a [`Pipe`].
#[derive(Debug, Default)]
pub struct PipeWriter {
    handle: FdHandle,
}

owned_descriptor!(PipeReader, handle);
owned_descriptor!(PipeWriter, handle);

impl Readable for PipeReader {}
impl Closable for PipeReader {}
impl Writable for PipeWriter {}
impl Closable for PipeWriter {}

impl Pipe {
    /// A pipe holding neither end.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both ends are held.
    pub fn valid(&self) -> bool {
        self.reader.valid() && self.writer.valid()
    }

    /// Raw `pipe2(2)`.
    ///
    /// # Panics
    ///
    /// Panics if either end is already held.
    pub fn open_with<F, R>(&mut self, flags: PipeFlags, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        PIPE.require(
            !self.reader.valid() && !self.writer.valid(),
            "pipe is already open",
        );
        let mut fds: [libc::c_int; 2] = [-1; 2];
        let outcome = Outcome::invoke(|| unsafe { libc::pipe2(fds.as_mut_ptr(), flags.bits()) });
        if outcome.value() == 0 {
            log::trace!("opened pipe {} -> {}", fds[1], fds[0]);
            // SAFETY: both descriptors were just created and are unowned.
            unsafe {
                self.reader.reset(fds[0]);
                self.writer.reset(fds[1]);
            }
        }
        handler(outcome)
    }

    /// Create the pipe.
    pub fn open(&mut self, flags: PipeFlags) -> SysResult<()> {
        self.open_with(flags, |outcome| outcome.check_status(&PIPE))
    }

    /// A new open pipe.
    pub fn open_init(flags: PipeFlags) -> SysResult<Self> {
        let mut pipe = Self::new();
        pipe.open(flags)?;
        Ok(pipe)
    }

    /// A new pipe after one raw open; both ends are at the sentinel if it
    /// failed.
    pub fn open_init_with<F>(flags: PipeFlags, handler: F) -> Self
    where
        F: FnOnce(Outcome<libc::c_int>),
    {
        let mut pipe = Self::new();
        pipe.open_with(flags, handler);
        pipe
    }

    /// View of the read end.
    pub fn read_end(&self) -> InputView<'_> {
        InputView::new(self.reader.view())
    }

    /// View of the write end.
    pub fn write_end(&self) -> OutputView<'_> {
        OutputView::new(self.writer.view())
    }

    /// Move the read end out, leaving the sentinel behind.
    pub fn take_reader(&mut self) -> PipeReader {
        PipeReader {
            handle: std::mem::take(&mut self.reader),
        }
    }

    /// Move the write end out, leaving the sentinel behind.
    pub fn take_writer(&mut self) -> PipeWriter {
        PipeWriter {
            handle: std::mem::take(&mut self.writer),
        }
    }

    /// Move another pipe's ends into this one. Ends this pipe held are
    /// released unless the other pipe holds the same descriptor.
    pub fn assign(&mut self, mut other: Pipe) {
        self.reader.assign(std::mem::take(&mut other.reader));
        self.writer.assign(std::mem::take(&mut other.writer));
    }
}

impl PipeReader {
    /// Whether this end still reads from an open pipe.
    pub fn is_readable(&self) -> bool {
        self.is_open()
    }
}

impl PipeWriter {
    /// Whether this end still writes to an open pipe.
    pub fn is_writable(&self) -> bool {
        self.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metasys_core::SystemError;

    #[test]
    fn test_new_pipe_is_invalid() {
        let pipe = Pipe::new();
        assert!(!pipe.valid());
        assert!(!pipe.read_end().valid());
    }

    #[test]
    fn test_open_init() {
        let pipe = Pipe::open_init(PipeFlags::CLOEXEC).unwrap();
        assert!(pipe.valid());
        assert!(pipe.read_end().is_open());
        assert!(pipe.write_end().is_open());
    }

    #[test]
    fn test_open_init_with_reports_outcome() {
        let mut seen = None;
        let pipe = Pipe::open_init_with(PipeFlags::CLOEXEC, |outcome| seen = Some(outcome.value()));
        assert_eq!(seen, Some(0));
        assert!(pipe.valid());
    }

    #[test]
    #[should_panic(expected = "pipe is already open")]
    fn test_open_twice_panics() {
        let mut pipe = Pipe::open_init(PipeFlags::CLOEXEC).unwrap();
        let _ = pipe.open(PipeFlags::CLOEXEC);
    }

    #[test]
    fn test_nonblocking_read_would_block() {
        let pipe = Pipe::open_init(PipeFlags::CLOEXEC | PipeFlags::NONBLOCK).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(pipe.read_end().read(&mut buf), Err(SystemError::WouldBlock));
    }

    #[test]
    fn test_take_halves() {
        let mut pipe = Pipe::open_init(PipeFlags::CLOEXEC).unwrap();
        let reader = pipe.take_reader();
        let mut writer = pipe.take_writer();
        assert!(!pipe.valid());
        assert!(reader.is_readable());

        assert_eq!(writer.write(b"ok"), Ok(2));
        assert_eq!(writer.close(), Ok(()));
        assert!(!writer.is_writable());

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf), Ok(2));
        assert_eq!(reader.read(&mut buf), Ok(0));
    }

    #[test]
    fn test_assign_moves_ends() {
        let mut target = Pipe::open_init(PipeFlags::CLOEXEC).unwrap();
        let source = Pipe::open_init(PipeFlags::CLOEXEC).unwrap();
        let source_reader = source.read_end().fd();
        target.assign(source);
        assert_eq!(target.read_end().fd(), source_reader);
        assert!(target.valid());
    }
}
