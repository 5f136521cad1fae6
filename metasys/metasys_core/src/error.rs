//! Error types for the Metasys handle library.
//!
//! Errors fall into two groups. Expected runtime failures reported by the
//! platform are surfaced as [`SystemError`] (one variant per errno value) or
//! [`ResolveError`] (one variant per address-resolution code). Contract
//! violations are not represented here at all: they panic at the call site
//! through [`crate::outcome::Contract`].
//!
//! The root error type, `Error`, wraps the subsystem errors so that callers
//! composing several handle kinds can use a single `Result`.

use std::ffi::CStr;
use thiserror::Error;

/// Root error type for the Metasys system.
#[derive(Debug, Error)]
pub enum Error {
    /// A system call failed with an expected error code
    #[error("System error: {0}")]
    System(#[from] SystemError),

    /// Address resolution failed
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// A lifecycle policy was rejected
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Configuration could not be loaded or validated
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from the standard library
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type using the root error.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by checked system call wrappers.
pub type SysResult<T> = std::result::Result<T, SystemError>;

macro_rules! errno_table {
    ($( $(#[$doc:meta])* $variant:ident = $code:ident, $message:literal; )+) => {
        /// An expected failure reported by the platform through `errno`.
        ///
        /// Every code maps to exactly one variant. Codes without a dedicated
        /// variant become [`SystemError::Unknown`], which callers should treat
        /// as fatal.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
        #[non_exhaustive]
        pub enum SystemError {
            $(
                $(#[$doc])*
                #[error($message)]
                $variant,
            )+

            /// Code with no dedicated variant
            #[error("unknown system error {0}")]
            Unknown(i32),
        }

        impl SystemError {
            /// Classify a raw errno value. Total over all inputs.
            pub fn from_errno(code: i32) -> Self {
                match code {
                    $( libc::$code => Self::$variant, )+
                    other => Self::Unknown(other),
                }
            }

            /// The errno value this error was built from.
            pub fn errno(&self) -> i32 {
                match self {
                    $( Self::$variant => libc::$code, )+
                    Self::Unknown(code) => *code,
                }
            }

            /// Symbolic name of the code, such as `"EEXIST"`.
            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($code), )+
                    Self::Unknown(_) => "UNKNOWN",
                }
            }
        }
    };
}

errno_table! {
    /// EACCES
    PermissionDenied = EACCES, "permission denied";
    /// EADDRINUSE
    AddrInUse = EADDRINUSE, "address already in use";
    /// EADDRNOTAVAIL
    AddrNotAvailable = EADDRNOTAVAIL, "address not available";
    /// EAGAIN, also reported as EWOULDBLOCK
    WouldBlock = EAGAIN, "operation would block";
    /// EBUSY
    Busy = EBUSY, "resource busy";
    /// ECHILD
    NoChild = ECHILD, "no child process";
    /// ECONNABORTED
    ConnectionAborted = ECONNABORTED, "connection aborted";
    /// ECONNREFUSED
    ConnectionRefused = ECONNREFUSED, "connection refused";
    /// ECONNRESET
    ConnectionReset = ECONNRESET, "connection reset by peer";
    /// EDEADLK
    Deadlock = EDEADLK, "resource deadlock would occur";
    /// EDESTADDRREQ
    DestinationRequired = EDESTADDRREQ, "destination address required";
    /// EDQUOT
    QuotaExceeded = EDQUOT, "disk quota exceeded";
    /// EEXIST
    AlreadyExists = EEXIST, "file exists";
    /// EFBIG
    FileTooLarge = EFBIG, "file too large";
    /// EHOSTUNREACH
    HostUnreachable = EHOSTUNREACH, "host unreachable";
    /// EINPROGRESS
    InProgress = EINPROGRESS, "operation in progress";
    /// EINTR
    Interrupted = EINTR, "interrupted system call";
    /// EINVAL
    InvalidArgument = EINVAL, "invalid argument";
    /// EIO
    Io = EIO, "input/output error";
    /// EISDIR
    IsADirectory = EISDIR, "is a directory";
    /// ELOOP
    TooManySymlinks = ELOOP, "too many levels of symbolic links";
    /// EMFILE
    TooManyOpenFiles = EMFILE, "too many open files";
    /// EMLINK
    TooManyLinks = EMLINK, "too many links";
    /// ENETUNREACH
    NetworkUnreachable = ENETUNREACH, "network unreachable";
    /// ENFILE
    FileTableOverflow = ENFILE, "too many open files in system";
    /// ENOBUFS
    NoBufferSpace = ENOBUFS, "no buffer space available";
    /// ENODEV
    NoDevice = ENODEV, "no such device";
    /// ENOENT
    NotFound = ENOENT, "no such file or directory";
    /// ENOMEM
    OutOfMemory = ENOMEM, "cannot allocate memory";
    /// ENOSPC
    StorageFull = ENOSPC, "no space left on device";
    /// ENOTCONN
    NotConnected = ENOTCONN, "socket is not connected";
    /// ENOTDIR
    NotADirectory = ENOTDIR, "not a directory";
    /// ENXIO
    NoDeviceOrAddress = ENXIO, "no such device or address";
    /// EOVERFLOW
    Overflow = EOVERFLOW, "value too large for defined data type";
    /// EPERM
    OperationNotPermitted = EPERM, "operation not permitted";
    /// EPIPE
    BrokenPipe = EPIPE, "broken pipe";
    /// EROFS
    ReadOnlyFilesystem = EROFS, "read-only file system";
    /// ESRCH
    NoSuchProcess = ESRCH, "no such process";
    /// ETIMEDOUT
    TimedOut = ETIMEDOUT, "connection timed out";
}

impl SystemError {
    /// The error left in `errno` by the last failed call on this thread.
    pub fn last() -> Self {
        Self::from_errno(crate::outcome::last_errno())
    }

    /// Whether this is the unmapped, fatal variant.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    /// Platform description of the code (`strerror`).
    pub fn message(&self) -> String {
        std::io::Error::from_raw_os_error(self.errno()).to_string()
    }
}

impl From<SystemError> for std::io::Error {
    fn from(error: SystemError) -> Self {
        std::io::Error::from_raw_os_error(error.errno())
    }
}

/// Errors reported by address resolution (`getaddrinfo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The host has no addresses in the requested family
    #[error("host has no address in the requested family")]
    AddressFamily,

    /// Temporary failure in name resolution
    #[error("temporary failure in name resolution")]
    Again,

    /// Non-recoverable failure in name resolution
    #[error("non-recoverable failure in name resolution")]
    Fail,

    /// Requested address family is not supported
    #[error("address family not supported")]
    Family,

    /// Out of memory
    #[error("memory allocation failure")]
    Memory,

    /// The host exists but has no addresses
    #[error("no address associated with hostname")]
    NoData,

    /// Node or service not known
    #[error("name or service not known")]
    NoName,

    /// Service not available for the socket type
    #[error("service not supported for socket type")]
    Service,

    /// System error carried in `errno`
    #[error("system error: {0}")]
    System(SystemError),

    /// Code with no dedicated variant
    #[error("unknown resolver error {0}")]
    Unknown(i32),
}

// glibc defines EAI_ADDRFAMILY (-9) as a GNU extension, but libc does not
// export it for linux-gnu.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
const EAI_ADDRFAMILY: libc::c_int = -9;
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
use libc::EAI_ADDRFAMILY;

impl ResolveError {
    /// Classify a `getaddrinfo` return code. `errno` is only consulted for
    /// `EAI_SYSTEM`.
    pub fn from_code(code: i32, errno: i32) -> Self {
        match code {
            EAI_ADDRFAMILY => Self::AddressFamily,
            libc::EAI_AGAIN => Self::Again,
            libc::EAI_FAIL => Self::Fail,
            libc::EAI_FAMILY => Self::Family,
            libc::EAI_MEMORY => Self::Memory,
            libc::EAI_NODATA => Self::NoData,
            libc::EAI_NONAME => Self::NoName,
            libc::EAI_SERVICE => Self::Service,
            libc::EAI_SYSTEM => Self::System(SystemError::from_errno(errno)),
            other => Self::Unknown(other),
        }
    }

    /// The `EAI_*` code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::AddressFamily => EAI_ADDRFAMILY,
            Self::Again => libc::EAI_AGAIN,
            Self::Fail => libc::EAI_FAIL,
            Self::Family => libc::EAI_FAMILY,
            Self::Memory => libc::EAI_MEMORY,
            Self::NoData => libc::EAI_NODATA,
            Self::NoName => libc::EAI_NONAME,
            Self::Service => libc::EAI_SERVICE,
            Self::System(_) => libc::EAI_SYSTEM,
            Self::Unknown(code) => *code,
        }
    }

    /// Platform description of the code (`gai_strerror`).
    pub fn message(&self) -> String {
        if let Self::System(error) = self {
            return error.message();
        }
        // gai_strerror returns a pointer to static storage.
        unsafe { CStr::from_ptr(libc::gai_strerror(self.code())) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Errors raised when building a lifecycle policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A pre-signal cannot precede the Terminate action
    #[error("a pre-signal cannot be combined with the Terminate action")]
    SignalBeforeTerminate,

    /// Kill needs a positive signal number
    #[error("invalid signal number {0}")]
    InvalidSignal(i32),

    /// Processes cannot be detached
    #[error("processes do not support the Detach action")]
    DetachedProcess,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping_is_total() {
        for code in -5..200 {
            let error = SystemError::from_errno(code);
            assert_eq!(error.errno(), code);
        }
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(SystemError::from_errno(libc::EEXIST), SystemError::AlreadyExists);
        assert_eq!(SystemError::from_errno(libc::EWOULDBLOCK), SystemError::WouldBlock);
        assert_eq!(SystemError::AlreadyExists.name(), "EEXIST");
        assert!(!SystemError::Interrupted.is_unknown());
    }

    #[test]
    fn test_unmapped_code_is_unknown() {
        let error = SystemError::from_errno(libc::EBADF);
        assert_eq!(error, SystemError::Unknown(libc::EBADF));
        assert!(error.is_unknown());
        assert_eq!(error.name(), "UNKNOWN");
    }

    #[test]
    fn test_message_lookup() {
        let message = SystemError::NotFound.message();
        assert!(message.contains("No such file"));
        assert_eq!(SystemError::NotFound.to_string(), "no such file or directory");
    }

    #[test]
    fn test_resolve_codes() {
        assert_eq!(ResolveError::from_code(libc::EAI_NONAME, 0), ResolveError::NoName);
        assert_eq!(
            ResolveError::from_code(libc::EAI_SYSTEM, libc::ENOMEM),
            ResolveError::System(SystemError::OutOfMemory)
        );
        assert_eq!(ResolveError::Service.code(), libc::EAI_SERVICE);
        assert!(!ResolveError::NoName.message().is_empty());
    }

    #[test]
    fn test_root_error_wraps() {
        let error: Error = SystemError::BrokenPipe.into();
        assert!(matches!(error, Error::System(SystemError::BrokenPipe)));
        assert_eq!(error.to_string(), "System error: broken pipe");
    }
}
