//! File status records.

use bitflags::bitflags;
use metasys_core::descriptor::{Descriptor, FdView};
use metasys_core::outcome::Outcome;
use metasys_core::utils::with_c_path;
use metasys_core::{contract, SysResult};
use std::mem;
use std::path::Path;
use std::time::{Duration, SystemTime};

contract!(SCAN: "stat" => EBADF, EFAULT, EINVAL, ENAMETOOLONG);

bitflags! {
    /// Flags for [`Stat::scan_at`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct AtFlags: i32 {
        /// An empty path refers to the directory descriptor itself.
        const EMPTY_PATH = libc::AT_EMPTY_PATH;
        /// Do not trigger automounts.
        const NO_AUTOMOUNT = libc::AT_NO_AUTOMOUNT;
        /// Describe a trailing symlink rather than its target.
        const SYMLINK_NOFOLLOW = libc::AT_SYMLINK_NOFOLLOW;
    }
}

/// Type of a filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file
    Regular,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Named pipe
    Fifo,
    /// Unix domain socket
    Socket,
    /// Character device
    CharDevice,
    /// Block device
    BlockDevice,
    /// Not reported
    Unknown,
}

impl FileKind {
    /// Kind encoded in an `st_mode` value.
    pub fn from_mode(mode: u32) -> Self {
        match mode & libc::S_IFMT {
            libc::S_IFREG => Self::Regular,
            libc::S_IFDIR => Self::Directory,
            libc::S_IFLNK => Self::Symlink,
            libc::S_IFIFO => Self::Fifo,
            libc::S_IFSOCK => Self::Socket,
            libc::S_IFCHR => Self::CharDevice,
            libc::S_IFBLK => Self::BlockDevice,
            _ => Self::Unknown,
        }
    }

    /// Kind encoded in a directory entry's `d_type`.
    pub fn from_dirent_type(d_type: u8) -> Self {
        match d_type {
            libc::DT_REG => Self::Regular,
            libc::DT_DIR => Self::Directory,
            libc::DT_LNK => Self::Symlink,
            libc::DT_FIFO => Self::Fifo,
            libc::DT_SOCK => Self::Socket,
            libc::DT_CHR => Self::CharDevice,
            libc::DT_BLK => Self::BlockDevice,
            _ => Self::Unknown,
        }
    }
}

/// Status of a filesystem object, as filled by the `stat` family.
#[derive(Clone, Copy)]
pub struct Stat {
    raw: libc::stat,
}

impl Default for Stat {
    fn default() -> Self {
        Self::new()
    }
}

impl Stat {
    /// An all-zero record.
    pub fn new() -> Self {
        // SAFETY: `struct stat` is plain data; all-zero is a valid value.
        Self {
            raw: unsafe { mem::zeroed() },
        }
    }

    fn fill<F, R>(&mut self, outcome: Outcome<libc::c_int>, scratch: libc::stat, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        if outcome.value() == 0 {
            self.raw = scratch;
        }
        handler(outcome)
    }

    /// Raw `stat(2)`, following symlinks.
    pub fn scan_with<F, R>(&mut self, path: impl AsRef<Path>, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        let mut scratch = Self::new().raw;
        let outcome = with_c_path(path.as_ref(), -1, |c_path| unsafe {
            libc::stat(c_path.as_ptr(), &mut scratch)
        });
        self.fill(outcome, scratch, handler)
    }

    /// Describe `path`, following symlinks.
    pub fn scan(&mut self, path: impl AsRef<Path>) -> SysResult<()> {
        self.scan_with(path, |outcome| outcome.check_status(&SCAN))
    }

    /// The status of `path`, following symlinks.
    pub fn scan_init(path: impl AsRef<Path>) -> SysResult<Self> {
        let mut stat = Self::new();
        stat.scan(path)?;
        Ok(stat)
    }

    /// Raw `lstat(2)`.
    pub fn lscan_with<F, R>(&mut self, path: impl AsRef<Path>, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        let mut scratch = Self::new().raw;
        let outcome = with_c_path(path.as_ref(), -1, |c_path| unsafe {
            libc::lstat(c_path.as_ptr(), &mut scratch)
        });
        self.fill(outcome, scratch, handler)
    }

    /// Describe `path` itself when it is a symlink.
    pub fn lscan(&mut self, path: impl AsRef<Path>) -> SysResult<()> {
        self.lscan_with(path, |outcome| outcome.check_status(&SCAN))
    }

    /// The status of `path`, not following a trailing symlink.
    pub fn lscan_init(path: impl AsRef<Path>) -> SysResult<Self> {
        let mut stat = Self::new();
        stat.lscan(path)?;
        Ok(stat)
    }

    /// Raw `fstat(2)`.
    ///
    /// # Panics
    ///
    /// Panics if `target` holds no descriptor.
    pub fn fscan_with<D, F, R>(&mut self, target: &D, handler: F) -> R
    where
        D: Descriptor + ?Sized,
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        SCAN.require(target.valid(), "descriptor is not open");
        let fd = target.fd();
        let mut scratch = Self::new().raw;
        let outcome = Outcome::invoke(|| unsafe { libc::fstat(fd, &mut scratch) });
        self.fill(outcome, scratch, handler)
    }

    /// Describe an open descriptor.
    pub fn fscan<D: Descriptor + ?Sized>(&mut self, target: &D) -> SysResult<()> {
        self.fscan_with(target, |outcome| outcome.check_status(&SCAN))
    }

    /// The status of an open descriptor.
    pub fn fscan_init<D: Descriptor + ?Sized>(target: &D) -> SysResult<Self> {
        let mut stat = Self::new();
        stat.fscan(target)?;
        Ok(stat)
    }

    /// Raw `fstatat(2)`. A `dir` of `None` resolves `path` against the
    /// working directory.
    pub fn scan_at_with<F, R>(
        &mut self,
        dir: Option<FdView<'_>>,
        path: impl AsRef<Path>,
        flags: AtFlags,
        handler: F,
    ) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        let dirfd = dir.map_or(libc::AT_FDCWD, |view| view.raw());
        let mut scratch = Self::new().raw;
        let outcome = with_c_path(path.as_ref(), -1, |c_path| unsafe {
            libc::fstatat(dirfd, c_path.as_ptr(), &mut scratch, flags.bits())
        });
        self.fill(outcome, scratch, handler)
    }

    /// Describe `path` relative to `dir`.
    pub fn scan_at(
        &mut self,
        dir: Option<FdView<'_>>,
        path: impl AsRef<Path>,
        flags: AtFlags,
    ) -> SysResult<()> {
        self.scan_at_with(dir, path, flags, |outcome| outcome.check_status(&SCAN))
    }

    /// The status of `path` relative to `dir`.
    pub fn scan_at_init(
        dir: Option<FdView<'_>>,
        path: impl AsRef<Path>,
        flags: AtFlags,
    ) -> SysResult<Self> {
        let mut stat = Self::new();
        stat.scan_at(dir, path, flags)?;
        Ok(stat)
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.raw.st_size as u64
    }

    /// Full `st_mode`, type bits included.
    pub fn mode(&self) -> u32 {
        self.raw.st_mode
    }

    /// Permission bits only.
    pub fn permissions(&self) -> u32 {
        self.raw.st_mode & 0o7777
    }

    /// Object type.
    pub fn kind(&self) -> FileKind {
        FileKind::from_mode(self.raw.st_mode)
    }

    /// Whether this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind() == FileKind::Regular
    }

    /// Whether this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }

    /// Whether this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.kind() == FileKind::Symlink
    }

    /// Inode number.
    pub fn inode(&self) -> u64 {
        self.raw.st_ino as u64
    }

    /// Containing device.
    pub fn device(&self) -> u64 {
        self.raw.st_dev as u64
    }

    /// Hard link count.
    pub fn links(&self) -> u64 {
        self.raw.st_nlink as u64
    }

    /// Owner user id.
    pub fn uid(&self) -> u32 {
        self.raw.st_uid
    }

    /// Owner group id.
    pub fn gid(&self) -> u32 {
        self.raw.st_gid
    }

    /// Last modification time.
    pub fn modified(&self) -> SystemTime {
        let secs = self.raw.st_mtime;
        let nanos = self.raw.st_mtime_nsec as u32;
        if secs >= 0 {
            SystemTime::UNIX_EPOCH + Duration::new(secs as u64, nanos)
        } else {
            SystemTime::UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(u64::from(nanos))
        }
    }

    /// The native record.
    pub fn as_raw(&self) -> &libc::stat {
        &self.raw
    }
}

impl std::fmt::Debug for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stat")
            .field("kind", &self.kind())
            .field("size", &self.size())
            .field("mode", &format_args!("{:o}", self.permissions()))
            .field("inode", &self.inode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metasys_core::SystemError;

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        let stat = Stat::scan_init(dir.path()).unwrap();
        assert!(stat.is_dir());
        assert!(!stat.is_file());
    }

    #[test]
    fn test_scan_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sized");
        std::fs::write(&path, b"12345").unwrap();
        let stat = Stat::scan_init(&path).unwrap();
        assert!(stat.is_file());
        assert_eq!(stat.size(), 5);
        assert!(stat.links() >= 1);
        assert!(stat.modified() > SystemTime::UNIX_EPOCH);
    }

    #[test]
    fn test_lscan_sees_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("link");
        std::fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(Stat::lscan_init(&link).unwrap().is_symlink());
        assert!(Stat::scan_init(&link).unwrap().is_file());
        assert!(Stat::scan_at_init(None, &link, AtFlags::SYMLINK_NOFOLLOW)
            .unwrap()
            .is_symlink());
    }

    #[test]
    fn test_scan_missing_keeps_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut stat = Stat::scan_init(dir.path()).unwrap();
        let result = stat.scan(dir.path().join("missing"));
        assert_eq!(result, Err(SystemError::NotFound));
        assert!(stat.is_dir());
    }

    #[test]
    fn test_kind_decoding() {
        assert_eq!(FileKind::from_mode(libc::S_IFIFO | 0o600), FileKind::Fifo);
        assert_eq!(FileKind::from_dirent_type(libc::DT_DIR), FileKind::Directory);
        assert_eq!(FileKind::from_dirent_type(libc::DT_UNKNOWN), FileKind::Unknown);
    }
}
