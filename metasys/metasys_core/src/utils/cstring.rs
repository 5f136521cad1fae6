//! Passing Rust strings and paths to C.

use crate::outcome::Outcome;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Run `call` with `bytes` as a C string.
///
/// Bytes containing an interior NUL cannot reach the native call; the
/// outcome is then `failure` with `EINVAL`, as if the call had rejected the
/// argument.
pub fn with_c_str<T: Copy>(bytes: &[u8], failure: T, call: impl FnOnce(&CString) -> T) -> Outcome<T> {
    match CString::new(bytes) {
        Ok(c_string) => Outcome::invoke(|| call(&c_string)),
        Err(_) => Outcome::new(failure, libc::EINVAL),
    }
}

/// [`with_c_str`] for filesystem paths.
pub fn with_c_path<T: Copy>(path: &Path, failure: T, call: impl FnOnce(&CString) -> T) -> Outcome<T> {
    with_c_str(path.as_os_str().as_bytes(), failure, call)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interior_nul_is_einval() {
        let outcome = with_c_str(b"a\0b", -1, |_| 0);
        assert_eq!(outcome.value(), -1);
        assert_eq!(outcome.errno(), libc::EINVAL);
    }

    #[test]
    fn test_path_reaches_call() {
        let outcome = with_c_path(Path::new("/"), -1, |path| unsafe {
            libc::access(path.as_ptr(), libc::F_OK)
        });
        assert_eq!(outcome.value(), 0);
    }
}
