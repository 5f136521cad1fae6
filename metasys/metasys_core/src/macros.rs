//! Macros shared by the Metasys crates: module-tagged logging and
//! per-operation error contracts.

/// Log a message tagged with the calling module, optionally followed by
/// `key=value` pairs.
///
/// The level is a [`LogLevel`](crate::utils::LogLevel); the record goes
/// through the `log` facade, so the calling crate needs `log` as a
/// dependency.
///
/// ```
/// use metasys_core::log_event;
/// use metasys_core::utils::LogLevel;
///
/// log_event!(LogLevel::Info, "listener ready");
/// log_event!(LogLevel::Warning, "short write",
///     requested => 13,
///     written => 7,
/// );
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:expr, $message:expr) => {
        log::log!(
            $crate::utils::LogLevel::to_level($level),
            "[{}] {}",
            module_path!(),
            $message
        )
    };

    ($level:expr, $message:expr, $($key:ident => $value:expr),+ $(,)?) => {{
        let fields: Vec<String> = vec![$(format!("{}={}", stringify!($key), $value)),+];
        log::log!(
            $crate::utils::LogLevel::to_level($level),
            "[{}] {}: {}",
            module_path!(),
            $message,
            fields.join(" ")
        )
    }};
}

/// Declare the error contract of an operation.
///
/// The listed `errno` names are contract violations for that operation:
/// a checked call that fails with one of them panics instead of returning
/// an error.
///
/// # Examples
///
/// ```
/// use metasys_core::contract;
///
/// contract!(UNLINK: "unlink" => EFAULT, ENAMETOOLONG);
///
/// assert!(UNLINK.is_violation(metasys_core::libc::EFAULT));
/// assert!(!UNLINK.is_violation(metasys_core::libc::ENOENT));
/// ```
#[macro_export]
macro_rules! contract {
    ($vis:vis $name:ident : $operation:literal => $($code:ident),* $(,)?) => {
        $vis const $name: $crate::outcome::Contract =
            $crate::outcome::Contract::new($operation, &[$($crate::libc::$code),*]);
    };
}

#[cfg(test)]
mod tests {
    use crate::utils::LogLevel;

    contract!(SAMPLE: "sample" => EBADF, EINVAL);
    contract!(EMPTY: "empty" =>);

    #[test]
    fn test_contract_macro() {
        assert_eq!(SAMPLE.operation(), "sample");
        assert!(SAMPLE.is_violation(libc::EINVAL));
        assert!(!EMPTY.is_violation(libc::EINVAL));
    }

    #[test]
    fn test_log_event_macro() {
        log_event!(LogLevel::Debug, "plain");
        log_event!(LogLevel::Info, "with metadata", fd => 3, bytes => 13);
    }
}
