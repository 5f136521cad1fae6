//! # Metasys FS
//!
//! Filesystem composites built on `metasys_core`:
//!
//! - **file**: [`ReadableFile`], [`WritableFile`] and [`ReadWriteFile`],
//!   each accepting only the open flags that make sense for its access mode
//! - **flags**: open flags and the per-type flag tables
//! - **directory**: directory streams and their entries
//! - **stat**: file status records
//!
//! ```no_run
//! use metasys_core::{Readable, Writable};
//! use metasys_fs::{OpenFlags, ReadWriteFile};
//!
//! # fn main() -> metasys_core::SysResult<()> {
//! let file = ReadWriteFile::create_init("/tmp/greeting", OpenFlags::TRUNC, 0o644)?;
//! file.write(b"Hello World!\n")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod directory;
pub mod file;
pub mod flags;
pub mod stat;

pub use directory::{DirEntry, DirStream, Directory, Entries};
pub use file::{ReadWriteFile, ReadableFile, WritableFile, DEFAULT_MODE};
pub use flags::{FlagTable, OpenFlags};
pub use stat::{AtFlags, FileKind, Stat};
