//! Integration tests for directory streams and stat records.

use metasys_core::descriptor::FdHandle;
use metasys_fs::{AtFlags, Directory, FileKind, Stat};
use std::collections::BTreeSet;
use std::fs;
use std::os::unix::ffi::OsStrExt;

fn names(dir: &mut Directory) -> BTreeSet<String> {
    dir.entries()
        .map(Result::unwrap)
        .filter(|entry| !entry.is_dot())
        .map(|entry| entry.name.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_lists_created_entries() {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("a.txt"), b"a").unwrap();
    fs::write(root.path().join("b.txt"), b"b").unwrap();
    fs::create_dir(root.path().join("sub")).unwrap();

    let mut dir = Directory::open_init(root.path()).unwrap();
    let expected: BTreeSet<String> = ["a.txt", "b.txt", "sub"].iter().map(|s| s.to_string()).collect();
    assert_eq!(names(&mut dir), expected);
}

#[test]
fn test_entry_kinds_match_stat() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("child")).unwrap();

    let mut dir = Directory::open_init(root.path()).unwrap();
    let entry = dir
        .entries()
        .map(Result::unwrap)
        .find(|entry| entry.name.as_bytes() == b"child")
        .unwrap();
    if entry.kind != FileKind::Unknown {
        assert_eq!(entry.kind, FileKind::Directory);
    }

    let stat = Stat::scan_at_init(Some(dir.descriptor()), "child", AtFlags::empty()).unwrap();
    assert!(stat.is_dir());
    assert_eq!(stat.inode(), entry.inode);
}

#[test]
fn test_open_from_descriptor() {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("only"), b"").unwrap();

    let path = std::ffi::CString::new(root.path().as_os_str().as_bytes()).unwrap();
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC) };
    assert!(fd >= 0);

    let mut dir = Directory::open_fd_init(unsafe { FdHandle::from_raw(fd) }).unwrap();
    assert!(dir.valid());
    assert_eq!(names(&mut dir).len(), 1);
}

#[test]
fn test_fdopendir_on_file_closes_descriptor_and_fails() {
    let root = tempfile::tempdir().unwrap();
    let file = root.path().join("plain");
    fs::write(&file, b"").unwrap();

    let path = std::ffi::CString::new(file.as_os_str().as_bytes()).unwrap();
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
    assert!(fd >= 0);

    let mut errno = 0;
    let mut dir = Directory::new();
    dir.open_fd_with(unsafe { FdHandle::from_raw(fd) }, |outcome| errno = outcome.errno());
    assert!(!dir.valid());
    assert_eq!(errno, libc::ENOTDIR);
}
