//! Files opened for reading, writing, or both.
//!
//! Each file type fixes its access mode and checks the caller's flags
//! against its [`FlagTable`]. Passing a flag the type does not accept is a
//! programming error and panics.

use crate::flags::{FlagTable, OpenFlags};
use metasys_core::descriptor::FdHandle;
use metasys_core::outcome::{Contract, Outcome};
use metasys_core::utils::with_c_path;
use metasys_core::{contract, owned_descriptor, Closable, Readable, Seekable, SysResult, Writable};
use std::os::fd::RawFd;
use std::path::Path;

contract!(OPEN_READ: "open" => EFAULT, ENAMETOOLONG, EOPNOTSUPP, EROFS, ETXTBSY);
contract!(OPEN_WRITE: "open" => EFAULT, ENAMETOOLONG, EOPNOTSUPP, ETXTBSY);

/// Default permission bits for created files.
pub const DEFAULT_MODE: u32 = 0o644;

fn acquire<F, R>(
    handle: &mut FdHandle,
    contract: &Contract,
    path: &Path,
    bits: i32,
    mode: u32,
    handler: F,
) -> R
where
    F: FnOnce(Outcome<RawFd>) -> R,
{
    contract.require(!handle.valid(), "file is already open");
    let outcome = with_c_path(path, -1, |c_path| unsafe {
        libc::open(c_path.as_ptr(), bits, mode as libc::c_uint)
    });
    if outcome.value() >= 0 {
        log::trace!("opened {} as descriptor {}", path.display(), outcome.value());
        // SAFETY: the descriptor was just opened and is unowned.
        unsafe { handle.reset(outcome.value()) };
    }
    handler(outcome)
}

macro_rules! file_type {
    ($(#[$doc:meta])* $name:ident, $table:expr, $contract:ident) => {
        $(#[$doc])*
        #[derive(Debug, Default)]
        pub struct $name {
            handle: FdHandle,
        }

        owned_descriptor!($name, handle);
        impl Closable for $name {}

        impl $name {
            /// Flags this file type accepts.
            pub const FLAGS: FlagTable = $table;

            /// A file holding no descriptor.
            pub fn new() -> Self {
                Self::default()
            }

            /// Whether a descriptor is held.
            pub fn valid(&self) -> bool {
                self.handle.valid()
            }

            /// Raw `open(2)` of an existing file.
            ///
            /// # Panics
            ///
            /// Panics if a descriptor is already held or `flags` contains a
            /// flag this type does not accept.
            pub fn open_with<F, R>(&mut self, path: impl AsRef<Path>, flags: OpenFlags, handler: F) -> R
            where
                F: FnOnce(Outcome<RawFd>) -> R,
            {
                $contract.require(Self::FLAGS.allows_open(flags), "flag not accepted for open");
                let bits = Self::FLAGS.open_bits(flags);
                acquire(&mut self.handle, &$contract, path.as_ref(), bits, 0, handler)
            }

            /// Open an existing file.
            pub fn open(&mut self, path: impl AsRef<Path>, flags: OpenFlags) -> SysResult<()> {
                self.open_with(path, flags, |outcome| {
                    outcome.check(|fd| fd < 0, &$contract).map(|_| ())
                })
            }

            /// A newly opened file.
            pub fn open_init(path: impl AsRef<Path>, flags: OpenFlags) -> SysResult<Self> {
                let mut file = Self::new();
                file.open(path, flags)?;
                Ok(file)
            }

            /// A file after one raw open; invalid if the open failed.
            pub fn open_init_with<F>(path: impl AsRef<Path>, flags: OpenFlags, handler: F) -> Self
            where
                F: FnOnce(Outcome<RawFd>),
            {
                let mut file = Self::new();
                file.open_with(path, flags, handler);
                file
            }
        }
    };
}

macro_rules! creatable {
    ($name:ident, $contract:ident) => {
        impl $name {
            /// Raw `open(2)` with `O_CREAT`. With [`OpenFlags::TMPFILE`],
            /// `path` names the directory the unnamed file is created in.
            ///
            /// # Panics
            ///
            /// Panics if a descriptor is already held or `flags` contains a
            /// flag this type does not accept.
            pub fn create_with<F, R>(
                &mut self,
                path: impl AsRef<Path>,
                flags: OpenFlags,
                mode: u32,
                handler: F,
            ) -> R
            where
                F: FnOnce(Outcome<RawFd>) -> R,
            {
                $contract.require(Self::FLAGS.allows_create(flags), "flag not accepted for create");
                let bits = Self::FLAGS.create_bits(flags);
                acquire(&mut self.handle, &$contract, path.as_ref(), bits, mode, handler)
            }

            /// Create (or open) a file with the given permission bits.
            pub fn create(&mut self, path: impl AsRef<Path>, flags: OpenFlags, mode: u32) -> SysResult<()> {
                self.create_with(path, flags, mode, |outcome| {
                    outcome.check(|fd| fd < 0, &$contract).map(|_| ())
                })
            }

            /// A newly created file.
            pub fn create_init(path: impl AsRef<Path>, flags: OpenFlags, mode: u32) -> SysResult<Self> {
                let mut file = Self::new();
                file.create(path, flags, mode)?;
                Ok(file)
            }

            /// A file after one raw create; invalid if it failed.
            pub fn create_init_with<F>(
                path: impl AsRef<Path>,
                flags: OpenFlags,
                mode: u32,
                handler: F,
            ) -> Self
            where
                F: FnOnce(Outcome<RawFd>),
            {
                let mut file = Self::new();
                file.create_with(path, flags, mode, handler);
                file
            }
        }
    };
}

file_type!(
    /// A file opened read-only.
    ReadableFile,
    FlagTable::READ_ONLY,
    OPEN_READ
);

file_type!(
    /// A file opened write-only.
    WritableFile,
    FlagTable::WRITE_ONLY,
    OPEN_WRITE
);

file_type!(
    /// A file opened for reading and writing.
    ReadWriteFile,
    FlagTable::READ_WRITE,
    OPEN_WRITE
);

creatable!(WritableFile, OPEN_WRITE);
creatable!(ReadWriteFile, OPEN_WRITE);

impl Readable for ReadableFile {}
impl Seekable for ReadableFile {}

impl Writable for WritableFile {}
impl Seekable for WritableFile {}

impl Readable for ReadWriteFile {}
impl Writable for ReadWriteFile {}
impl Seekable for ReadWriteFile {}

#[cfg(test)]
mod tests {
    use super::*;
    use metasys_core::{Descriptor, SystemError, Whence};

    #[test]
    fn test_new_file_is_invalid() {
        assert!(!ReadableFile::new().valid());
        assert!(!WritableFile::new().valid());
        assert!(!ReadWriteFile::new().valid());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReadableFile::open_init(dir.path().join("missing"), OpenFlags::CLOEXEC);
        assert_eq!(result.err(), Some(SystemError::NotFound));
    }

    #[test]
    fn test_init_with_returns_invalid_handle_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut errno = 0;
        let file = ReadableFile::open_init_with(dir.path().join("missing"), OpenFlags::empty(), |outcome| {
            errno = outcome.errno()
        });
        assert!(!file.valid());
        assert_eq!(errno, libc::ENOENT);
    }

    #[test]
    fn test_interior_nul_path() {
        let mut file = ReadableFile::new();
        let result = file.open("bad\0path", OpenFlags::empty());
        assert_eq!(result, Err(SystemError::InvalidArgument));
    }

    #[test]
    #[should_panic(expected = "flag not accepted for open")]
    fn test_disallowed_flag_panics() {
        let dir = tempfile::tempdir().unwrap();
        let _ = ReadableFile::open_init(dir.path(), OpenFlags::TRUNC);
    }

    #[test]
    fn test_create_write_seek_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let file = ReadWriteFile::create_init(&path, OpenFlags::CLOEXEC, DEFAULT_MODE).unwrap();
        assert!(file.is_open());
        assert_eq!(file.write(b"metasys"), Ok(7));
        assert_eq!(file.position(), Ok(7));
        assert_eq!(file.seek(-3, Whence::End), Ok(4));

        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf), Ok(3));
        assert_eq!(&buf[..3], b"sys");
    }

    #[test]
    fn test_tmpfile_has_no_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut supported = false;
        let file = WritableFile::create_init_with(
            dir.path(),
            OpenFlags::TMPFILE | OpenFlags::CLOEXEC,
            0o600,
            |outcome| supported = outcome.value() >= 0,
        );
        // Not every filesystem supports unnamed temporary files.
        if supported {
            assert_eq!(file.write(b"scratch"), Ok(7));
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        } else {
            assert!(!file.valid());
        }
    }
}
