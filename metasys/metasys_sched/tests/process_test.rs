//! Forked children: exit statuses, pipes across fork and drop policies.

use metasys_core::{Readable, Writable};
use metasys_io::{Pipe, PipeFlags};
use metasys_sched::{ChildProcess, OrphanProcess, Process, Subprocess, WaitOptions, WaitStatus};

#[test]
fn test_child_writes_through_pipe() {
    let mut pipe = Pipe::open_init(PipeFlags::CLOEXEC).unwrap();
    let reader = pipe.take_reader();
    let writer = pipe.take_writer();

    let mut child = ChildProcess::spawn(move || match writer.write(b"Hello World!\n") {
        Ok(13) => 0,
        _ => 1,
    })
    .unwrap();
    assert_eq!(child.wait(WaitOptions::empty()), Ok(WaitStatus::Exited(0)));

    let mut buf = [0u8; 32];
    assert_eq!(reader.read(&mut buf), Ok(13));
    assert_eq!(&buf[..13], b"Hello World!\n");
    // The parent's copy of the write end went with the closure.
    assert_eq!(reader.read(&mut buf), Ok(0));
}

#[test]
fn test_subprocess_terminated_on_drop() {
    let mut pipe = Pipe::open_init(PipeFlags::CLOEXEC).unwrap();
    let reader = pipe.take_reader();
    let writer = pipe.take_writer();

    let child = Subprocess::spawn(move || {
        let _writer = writer;
        loop {
            unsafe { libc::pause() };
        }
    })
    .unwrap();
    drop(child);

    // The child held the last write end; once it is gone reads see EOF.
    let mut buf = [0u8; 1];
    assert_eq!(reader.read(&mut buf), Ok(0));
}

#[test]
fn test_raw_fork_reports_pid() {
    let mut observed = -1;
    let mut child = OrphanProcess::fork_init_with(|outcome| observed = outcome.value());
    if observed == 0 {
        unsafe { libc::_exit(9) };
    }
    assert_eq!(observed, child.pid());
    assert_eq!(child.wait(WaitOptions::empty()).map(|s| s.exit_code()), Ok(Some(9)));
}

#[test]
fn test_explicit_fork() {
    let mut child = Process::<metasys_core::lifecycle::Join>::new();
    child.fork().unwrap();
    if !child.valid() {
        unsafe { libc::_exit(4) };
    }
    assert_eq!(child.wait(WaitOptions::empty()), Ok(WaitStatus::Exited(4)));
    assert!(!child.valid());
}
