//! # Metasys Core
//!
//! `metasys_core` provides the framework shared by every Metasys handle
//! type: an ownership model for scarce operating-system identifiers, a set
//! of capability layers that give unrelated handle kinds the same
//! read/write/seek/close behavior, a uniform error-reporting protocol, and
//! end-of-life policies for threads and processes.
//!
//! ## Core Principles
//!
//! 1. **Sentinel handles**: a [`Handle`] owns one native identifier or holds
//!    its kind's sentinel. Ownership moves, it is never copied, and a valid
//!    identifier is released exactly once. A [`View`] aliases an identifier
//!    without owning it.
//!
//! 2. **Capability layers**: traits such as [`Readable`] and [`Writable`]
//!    carry only default methods over [`Descriptor`]. A composite is a
//!    struct holding a handle plus the layers it opts into.
//!
//! 3. **Three calling forms**: every operation has a raw form taking a
//!    handler of the native [`Outcome`], a checked form returning
//!    [`SysResult`], and, for acquisitions, an `*_init` factory form.
//!    Errno values that only a caller bug can produce are asserted against
//!    through each operation's [`Contract`].
//!
//! 4. **Lifecycle policies**: threads and child processes choose at the
//!    type level what happens when a bound handle is destroyed
//!    ([`lifecycle`]).
//!
//! ## Crate Structure
//!
//! - **error**: Error types for all Metasys components
//! - **outcome**: Raw outcomes and per-operation contracts
//! - **handle**: Sentinel handles and views
//! - **descriptor**: File descriptors as a handle kind
//! - **capability**: Read, write, seek and close layers
//! - **lifecycle**: Thread and process end-of-life policies
//! - **utils**: Byte order, C string and log level helpers
//! - **macros**: Convenience macros for logging and contracts

#![warn(missing_docs)]

pub mod capability;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod macros;
pub mod outcome;
pub mod utils;

pub use libc;

// Re-export key types and traits for convenience
pub use capability::{Closable, Readable, Seekable, Whence, Writable};
pub use descriptor::{Descriptor, Fd, FdHandle, FdView, OwnedDescriptor};
pub use error::{Error, PolicyError, ResolveError, Result, SysResult, SystemError};
pub use handle::{Handle, Resource, View};
pub use lifecycle::{finalize, Finalize, Lifecycle, Policy, PreSignal, TerminalAction};
pub use outcome::{Contract, Outcome};
pub use utils::{LogLevel, NetworkOrder};
