//! The `run` command: execute a program in a forked child and report how
//! it ended.

use anyhow::{Context, Result};
use clap::Args;
use metasys_sched::{ChildProcess, WaitOptions, WaitStatus};
use std::ffi::CString;
use std::ptr;

/// Exit code of a child whose `execvp` failed, as in the shell.
const EXEC_FAILED: i32 = 127;

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Program and its arguments, looked up in PATH
    #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Exit code this tool should end with for a child that ended as `status`.
pub fn exit_code(status: WaitStatus) -> u8 {
    match status {
        WaitStatus::Exited(code) => code as u8,
        WaitStatus::Signaled(signal) => (128 + signal) as u8,
        _ => 1,
    }
}

/// Implementation of the run command
pub fn execute_run(args: &RunArgs) -> Result<WaitStatus> {
    // Everything the child touches is allocated before the fork.
    let argv = args
        .command
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("argument contains a NUL byte")?;
    let mut pointers: Vec<*const libc::c_char> = argv.iter().map(|arg| arg.as_ptr()).collect();
    pointers.push(ptr::null());

    let mut child = ChildProcess::spawn(|| {
        // SAFETY: `pointers` is a null-terminated array of C strings that
        // outlive the call; on success execvp does not return.
        unsafe { libc::execvp(pointers[0], pointers.as_ptr()) };
        EXEC_FAILED
    })
    .context("forking child")?;
    log::debug!("started {} as pid {}", args.command[0], child.pid());

    let status = child.wait(WaitOptions::empty()).context("waiting for child")?;
    println!("{}", status);
    if status == WaitStatus::Exited(EXEC_FAILED) {
        log::warn!("{} may not have been found", args.command[0]);
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code(WaitStatus::Exited(0)), 0);
        assert_eq!(exit_code(WaitStatus::Exited(3)), 3);
        assert_eq!(exit_code(WaitStatus::Signaled(libc::SIGKILL)), 137);
        assert_eq!(exit_code(WaitStatus::Running), 1);
    }
}
