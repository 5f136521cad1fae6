//! Subcommand implementations.

pub mod fs;
pub mod net;
pub mod process;

use metasys_core::{SysResult, Writable};

/// Write all of `buf`, looping over short writes.
pub(crate) fn write_fully<W: Writable>(out: &W, mut buf: &[u8]) -> SysResult<()> {
    while !buf.is_empty() {
        let written = out.write(buf)?;
        buf = &buf[written..];
    }
    Ok(())
}
