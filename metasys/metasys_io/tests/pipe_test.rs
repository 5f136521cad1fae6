//! Integration tests for pipes and their views.

use metasys_core::{Closable, Descriptor, Readable, SystemError, Writable};
use metasys_io::{Pipe, PipeFlags};
use std::thread;

#[test]
fn test_read_after_writer_closed_returns_data_then_eof() {
    let mut pipe = Pipe::open_init(PipeFlags::CLOEXEC).unwrap();
    let mut writer = pipe.take_writer();

    assert_eq!(writer.write(b"ab"), Ok(2));
    writer.close().unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(pipe.read_end().read(&mut buf), Ok(2));
    assert_eq!(&buf[..2], b"ab");
    assert_eq!(pipe.read_end().read(&mut buf), Ok(0));
}

#[test]
fn test_write_end_view_and_reader_thread() {
    let mut pipe = Pipe::open_init(PipeFlags::CLOEXEC).unwrap();
    let reader = pipe.take_reader();

    let consumer = thread::spawn(move || {
        let mut collected = Vec::new();
        let mut buf = [0u8; 8];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => collected.extend_from_slice(&buf[..n]),
                Err(SystemError::Interrupted) => continue,
                Err(e) => panic!("read failed: {}", e),
            }
        }
        collected
    });

    let message = b"Hello World!\n";
    let mut written = 0;
    while written < message.len() {
        written += pipe.write_end().write(&message[written..]).unwrap();
    }
    drop(pipe);

    assert_eq!(consumer.join().unwrap(), message.to_vec());
}

#[test]
fn test_raw_form_does_not_raise() {
    let pipe = Pipe::open_init(PipeFlags::CLOEXEC | PipeFlags::NONBLOCK).unwrap();
    let mut buf = [0u8; 4];
    let (value, errno) = pipe
        .read_end()
        .read_with(&mut buf, |outcome| (outcome.value(), outcome.errno()));
    assert_eq!(value, -1);
    assert_eq!(errno, libc::EAGAIN);
}

#[test]
fn test_closed_halves_stay_closed() {
    let mut pipe = Pipe::open_init(PipeFlags::CLOEXEC).unwrap();
    let mut reader = pipe.take_reader();
    assert!(reader.valid());
    reader.close().unwrap();
    assert!(!reader.valid());
    assert!(!reader.is_open());
}
