//! Open flags and the per-composite tables of flags each file type accepts.

use bitflags::bitflags;

bitflags! {
    /// Optional `open(2)` flags. The access mode is fixed by the file type
    /// and is not part of this set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct OpenFlags: i32 {
        /// Append on each write.
        const APPEND = libc::O_APPEND;
        /// Signal-driven I/O.
        const ASYNC = libc::O_ASYNC;
        /// Close on exec.
        const CLOEXEC = libc::O_CLOEXEC;
        /// Bypass the page cache.
        const DIRECT = libc::O_DIRECT;
        /// Synchronized data writes.
        const DSYNC = libc::O_DSYNC;
        /// Fail if the file exists (create only).
        const EXCL = libc::O_EXCL;
        /// Do not update the access time.
        const NOATIME = libc::O_NOATIME;
        /// Do not become the controlling terminal.
        const NOCTTY = libc::O_NOCTTY;
        /// Fail on a trailing symlink.
        const NOFOLLOW = libc::O_NOFOLLOW;
        /// Non-blocking I/O.
        const NONBLOCK = libc::O_NONBLOCK;
        /// Synchronized writes.
        const SYNC = libc::O_SYNC;
        /// Truncate to zero length.
        const TRUNC = libc::O_TRUNC;
        /// Unnamed temporary file in the given directory.
        const TMPFILE = libc::O_TMPFILE;
    }
}

/// Which flags a file type accepts for each kind of acquisition.
#[derive(Debug, Clone, Copy)]
pub struct FlagTable {
    /// Access mode always added.
    pub access: i32,
    /// Flags accepted by `open`.
    pub open: OpenFlags,
    /// Flags accepted by `create`.
    pub create: OpenFlags,
    /// Flags accepted by `create` when `TMPFILE` is among them.
    pub tmpfile: OpenFlags,
}

impl FlagTable {
    /// Flags for a read-only file.
    pub const READ_ONLY: Self = Self {
        access: libc::O_RDONLY,
        open: OpenFlags::ASYNC
            .union(OpenFlags::CLOEXEC)
            .union(OpenFlags::DIRECT)
            .union(OpenFlags::NOATIME)
            .union(OpenFlags::NOCTTY)
            .union(OpenFlags::NOFOLLOW)
            .union(OpenFlags::NONBLOCK),
        create: OpenFlags::empty(),
        tmpfile: OpenFlags::empty(),
    };

    /// Flags for a write-only file.
    pub const WRITE_ONLY: Self = Self {
        access: libc::O_WRONLY,
        open: WRITE_OPEN,
        create: WRITE_OPEN.union(OpenFlags::EXCL),
        tmpfile: TMPFILE,
    };

    /// Flags for a read-write file.
    pub const READ_WRITE: Self = Self {
        access: libc::O_RDWR,
        open: WRITE_OPEN
            .union(OpenFlags::NOATIME)
            .union(OpenFlags::NOCTTY),
        create: WRITE_OPEN.union(OpenFlags::EXCL),
        tmpfile: TMPFILE,
    };

    /// Whether `flags` may be passed to `open`.
    pub fn allows_open(&self, flags: OpenFlags) -> bool {
        self.open.contains(flags)
    }

    /// Whether `flags` may be passed to `create`.
    pub fn allows_create(&self, flags: OpenFlags) -> bool {
        if flags.contains(OpenFlags::TMPFILE) {
            self.tmpfile.contains(flags)
        } else {
            self.create.contains(flags)
        }
    }

    /// Native flags for an `open`.
    pub fn open_bits(&self, flags: OpenFlags) -> i32 {
        self.access | flags.bits()
    }

    /// Native flags for a `create`: `O_CREAT` is added unless the file is
    /// an unnamed temporary.
    pub fn create_bits(&self, flags: OpenFlags) -> i32 {
        if flags.contains(OpenFlags::TMPFILE) {
            self.access | flags.bits()
        } else {
            self.access | libc::O_CREAT | flags.bits()
        }
    }
}

const WRITE_OPEN: OpenFlags = OpenFlags::APPEND
    .union(OpenFlags::ASYNC)
    .union(OpenFlags::CLOEXEC)
    .union(OpenFlags::DIRECT)
    .union(OpenFlags::DSYNC)
    .union(OpenFlags::NOFOLLOW)
    .union(OpenFlags::NONBLOCK)
    .union(OpenFlags::SYNC)
    .union(OpenFlags::TRUNC);

const TMPFILE: OpenFlags = OpenFlags::ASYNC
    .union(OpenFlags::CLOEXEC)
    .union(OpenFlags::DIRECT)
    .union(OpenFlags::DSYNC)
    .union(OpenFlags::NOFOLLOW)
    .union(OpenFlags::TMPFILE)
    .union(OpenFlags::SYNC);
