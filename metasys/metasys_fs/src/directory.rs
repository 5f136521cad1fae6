//! Directory streams.

use crate::stat::FileKind;
use metasys_core::descriptor::{FdHandle, FdView};
use metasys_core::outcome::Outcome;
use metasys_core::utils::with_c_path;
use metasys_core::{contract, Handle, Resource, SysResult, View};
use std::ffi::{CStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

contract!(OPENDIR: "opendir" => EBADF, EFAULT, ENAMETOOLONG);
contract!(READDIR: "readdir" => EBADF);
contract!(CLOSEDIR: "closedir" => EBADF);

/// Resource kind for `DIR*` streams.
#[derive(Debug)]
pub enum DirStream {}

impl Resource for DirStream {
    type Id = *mut libc::DIR;
    const SENTINEL: *mut libc::DIR = ptr::null_mut();
    const NAME: &'static str = "directory stream";

    fn release(id: *mut libc::DIR) {
        // SAFETY: the handle owned the stream and gives it up here.
        unsafe { libc::closedir(id) };
    }
}

/// One entry read from a [`Directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name, without the directory part.
    pub name: OsString,
    /// Inode number.
    pub inode: u64,
    /// Object type, when the filesystem reports it.
    pub kind: FileKind,
}

impl DirEntry {
    /// Whether this is the `.` or `..` entry.
    pub fn is_dot(&self) -> bool {
        let name = self.name.as_bytes();
        name == b"." || name == b".."
    }
}

/// An open directory stream.
#[derive(Debug, Default)]
pub struct Directory {
    handle: Handle<DirStream>,
}

impl Directory {
    /// A directory holding no stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a stream is held.
    pub fn valid(&self) -> bool {
        self.handle.valid()
    }

    fn bind(&mut self, stream: *mut libc::DIR) {
        if !stream.is_null() {
            // SAFETY: the stream was just opened and is unowned.
            unsafe { self.handle.reset(stream) };
        }
    }

    /// Raw `opendir(3)`.
    ///
    /// # Panics
    ///
    /// Panics if a stream is already held.
    pub fn open_with<F, R>(&mut self, path: impl AsRef<Path>, handler: F) -> R
    where
        F: FnOnce(Outcome<*mut libc::DIR>) -> R,
    {
        OPENDIR.require(!self.valid(), "directory is already open");
        let outcome = with_c_path(path.as_ref(), ptr::null_mut(), |c_path| unsafe {
            libc::opendir(c_path.as_ptr())
        });
        self.bind(outcome.value());
        handler(outcome)
    }

    /// Open the directory at `path`.
    pub fn open(&mut self, path: impl AsRef<Path>) -> SysResult<()> {
        self.open_with(path, |outcome| {
            outcome.check(|dir| dir.is_null(), &OPENDIR).map(|_| ())
        })
    }

    /// A newly opened directory.
    pub fn open_init(path: impl AsRef<Path>) -> SysResult<Self> {
        let mut dir = Self::new();
        dir.open(path)?;
        Ok(dir)
    }

    /// A directory after one raw open; invalid if it failed.
    pub fn open_init_with<F>(path: impl AsRef<Path>, handler: F) -> Self
    where
        F: FnOnce(Outcome<*mut libc::DIR>),
    {
        let mut dir = Self::new();
        dir.open_with(path, handler);
        dir
    }

    /// Raw `fdopendir(3)`. On success the stream takes over `fd`; on
    /// failure `fd` is closed.
    ///
    /// # Panics
    ///
    /// Panics if a stream is already held.
    pub fn open_fd_with<F, R>(&mut self, fd: FdHandle, handler: F) -> R
    where
        F: FnOnce(Outcome<*mut libc::DIR>) -> R,
    {
        OPENDIR.require(!self.valid(), "directory is already open");
        let raw = fd.raw();
        let outcome = Outcome::invoke(|| unsafe { libc::fdopendir(raw) });
        if !outcome.value().is_null() {
            let _ = fd.into_raw();
        }
        self.bind(outcome.value());
        handler(outcome)
    }

    /// Open a stream over a directory descriptor.
    pub fn open_fd(&mut self, fd: FdHandle) -> SysResult<()> {
        self.open_fd_with(fd, |outcome| {
            outcome.check(|dir| dir.is_null(), &OPENDIR).map(|_| ())
        })
    }

    /// A stream over a directory descriptor.
    pub fn open_fd_init(fd: FdHandle) -> SysResult<Self> {
        let mut dir = Self::new();
        dir.open_fd(fd)?;
        Ok(dir)
    }

    /// Raw `readdir(3)`. A null pointer with a zero errno is end of
    /// stream. The entry pointer is only valid inside the handler.
    ///
    /// # Panics
    ///
    /// Panics if no stream is held.
    pub fn read_with<F, R>(&mut self, handler: F) -> R
    where
        F: FnOnce(Outcome<*mut libc::dirent>) -> R,
    {
        READDIR.require(self.valid(), "directory is not open");
        let stream = self.handle.raw();
        handler(Outcome::invoke(|| unsafe { libc::readdir(stream) }))
    }

    /// The next entry, or `None` at the end of the stream.
    pub fn read(&mut self) -> SysResult<Option<DirEntry>> {
        self.read_with(|outcome| {
            let entry = outcome.value();
            if entry.is_null() {
                return match outcome.errno() {
                    0 => Ok(None),
                    errno => Err(READDIR.raise(errno)),
                };
            }
            // SAFETY: readdir returned a valid entry that lives until the
            // next call on this stream.
            let entry = unsafe { &*entry };
            let name = unsafe { CStr::from_ptr(entry.d_name.as_ptr()) };
            Ok(Some(DirEntry {
                name: OsString::from(std::ffi::OsStr::from_bytes(name.to_bytes())),
                inode: entry.d_ino as u64,
                kind: FileKind::from_dirent_type(entry.d_type),
            }))
        })
    }

    /// Iterate over the remaining entries.
    pub fn entries(&mut self) -> Entries<'_> {
        Entries { dir: self }
    }

    /// Restart the stream from the first entry.
    ///
    /// # Panics
    ///
    /// Panics if no stream is held.
    pub fn rewind(&mut self) {
        READDIR.require(self.valid(), "directory is not open");
        unsafe { libc::rewinddir(self.handle.raw()) };
    }

    /// View of the descriptor underlying the stream, for `*at` calls.
    ///
    /// # Panics
    ///
    /// Panics if no stream is held.
    pub fn descriptor(&self) -> FdView<'_> {
        READDIR.require(self.valid(), "directory is not open");
        let fd = unsafe { libc::dirfd(self.handle.raw()) };
        // SAFETY: the descriptor lives as long as the stream, which the
        // returned view borrows.
        unsafe { View::from_raw(fd) }
    }

    /// Raw `closedir(3)`. The handle is at the sentinel afterwards.
    ///
    /// # Panics
    ///
    /// Panics if no stream is held.
    pub fn close_with<F, R>(&mut self, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        CLOSEDIR.require(self.valid(), "directory is not open");
        let stream = self.handle.take();
        handler(Outcome::invoke(|| unsafe { libc::closedir(stream) }))
    }

    /// Close the stream.
    pub fn close(&mut self) -> SysResult<()> {
        self.close_with(|outcome| outcome.check_status(&CLOSEDIR))
    }
}

/// Iterator over directory entries.
#[derive(Debug)]
pub struct Entries<'a> {
    dir: &'a mut Directory,
}

impl Iterator for Entries<'_> {
    type Item = SysResult<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.dir.read().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metasys_core::SystemError;

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = Directory::open_init(dir.path().join("missing"));
        assert_eq!(result.err(), Some(SystemError::NotFound));
    }

    #[test]
    fn test_empty_directory_has_dot_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = Directory::open_init(dir.path()).unwrap();
        let entries: Vec<DirEntry> = stream.entries().map(Result::unwrap).collect();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(DirEntry::is_dot));
        assert_eq!(stream.read(), Ok(None));
    }

    #[test]
    fn test_close_leaves_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = Directory::open_init(dir.path()).unwrap();
        assert!(stream.valid());
        stream.close().unwrap();
        assert!(!stream.valid());
    }

    #[test]
    fn test_rewind() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = Directory::open_init(dir.path()).unwrap();
        assert_eq!(stream.entries().count(), 2);
        stream.rewind();
        assert_eq!(stream.entries().count(), 2);
    }
}
