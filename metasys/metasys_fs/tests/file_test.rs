//! Integration tests for file composites.

use metasys_core::{Closable, Readable, Seekable, SystemError, Whence, Writable};
use metasys_fs::{OpenFlags, ReadWriteFile, ReadableFile, Stat, WritableFile, DEFAULT_MODE};
use std::fs;

#[test]
fn test_write_hello_world() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.txt");

    let mut file = ReadWriteFile::create_init(&path, OpenFlags::CLOEXEC, DEFAULT_MODE).unwrap();
    assert!(file.valid());
    assert_eq!(file.write(b"Hello World!\n"), Ok(13));
    file.close().unwrap();
    assert!(!file.valid());

    assert_eq!(fs::read_to_string(&path).unwrap(), "Hello World!\n");
}

#[test]
fn test_exclusive_create_twice_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("once");

    let first = WritableFile::create_init(&path, OpenFlags::EXCL, DEFAULT_MODE);
    assert!(first.is_ok());

    let second = WritableFile::create_init(&path, OpenFlags::EXCL, DEFAULT_MODE);
    assert_eq!(second.err(), Some(SystemError::AlreadyExists));
}

#[test]
fn test_exclusive_create_raw_form() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raw");
    let _first = ReadWriteFile::create_init(&path, OpenFlags::EXCL, DEFAULT_MODE).unwrap();

    let mut errno = 0;
    let second = ReadWriteFile::create_init_with(&path, OpenFlags::EXCL, DEFAULT_MODE, |outcome| {
        assert_eq!(outcome.value(), -1);
        errno = outcome.errno();
    });
    assert!(!second.valid());
    assert_eq!(errno, libc::EEXIST);
}

#[test]
fn test_readable_file_reads_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input");
    fs::write(&path, b"abcdef").unwrap();

    let file = ReadableFile::open_init(&path, OpenFlags::CLOEXEC | OpenFlags::NOFOLLOW).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(file.read(&mut buf), Ok(4));
    assert_eq!(file.read(&mut buf), Ok(2));
    assert_eq!(&buf[..2], b"ef");
    assert_eq!(file.read(&mut buf), Ok(0));

    file.rewind().unwrap();
    assert_eq!(file.read(&mut buf), Ok(4));
    assert_eq!(&buf, b"abcd");
}

#[test]
fn test_append_and_truncate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log");
    fs::write(&path, b"one\n").unwrap();

    let file = WritableFile::open_init(&path, OpenFlags::APPEND).unwrap();
    file.write(b"two\n").unwrap();
    drop(file);
    assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");

    let file = WritableFile::open_init(&path, OpenFlags::TRUNC).unwrap();
    assert_eq!(file.seek(0, Whence::End), Ok(0));
    drop(file);
    assert_eq!(Stat::scan_init(&path).unwrap().size(), 0);
}

#[test]
fn test_fstat_on_open_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("measured");
    let file = ReadWriteFile::create_init(&path, OpenFlags::empty(), 0o600).unwrap();
    file.write(b"0123456789").unwrap();

    let stat = Stat::fscan_init(&file).unwrap();
    assert!(stat.is_file());
    assert_eq!(stat.size(), 10);
    assert_eq!(stat.permissions() & 0o600, 0o600);
}

#[test]
fn test_open_directory_for_writing_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = WritableFile::open_init(dir.path(), OpenFlags::empty());
    assert_eq!(result.err(), Some(SystemError::IsADirectory));
}

