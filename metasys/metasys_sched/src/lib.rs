//! # Metasys Sched
//!
//! Native threads and processes whose end of life is chosen at the type
//! level, plus the primitives that go with them.
//!
//! ## Crate Structure
//!
//! - **thread**: `Pthread` with lifecycle policies and its presets
//! - **this_thread**: cancel state of the calling thread
//! - **mutex**: `PthreadMutex` and its guard
//! - **process**: forked children, wait statuses and their presets
//! - **signal**: `Sigaction` dispositions
//!
//! ## Example
//!
//! ```
//! use metasys_sched::{Jthread, ThisThread, ThreadExit};
//!
//! let mut worker = Jthread::<u32>::spawn_init(|| {
//!     ThisThread::test_cancel();
//!     42
//! })?;
//! assert_eq!(worker.join()?, ThreadExit::Returned(42));
//! # Ok::<(), metasys_core::SystemError>(())
//! ```

#![warn(missing_docs)]

mod ffi;
pub mod mutex;
pub mod process;
pub mod signal;
pub mod this_thread;
pub mod thread;

pub use mutex::{MutexGuard, PthreadMutex};
pub use process::{
    ChildProcess, OrphanProcess, Pid, Process, ProcessPolicy, Subprocess, WaitOptions, WaitStatus,
};
pub use signal::{InfoHandler, SigFlags, SignalHandler, Sigaction};
pub use this_thread::{CancelInhibitor, ThisThread};
pub use thread::{DetachedThread, Jthread, Pthread, PthreadId, Thread, ThreadExit, ThreadPolicy};
