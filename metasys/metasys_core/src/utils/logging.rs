//! Log levels for configuration files.
//!
//! The library logs through the `log` facade and never installs a logger.
//! What it logs, by level:
//!
//! | Level | Events |
//! |---|---|
//! | trace | acquisition and release of every identifier |
//! | debug | errors raised by checked calls |
//! | warn  | destroy-time lifecycle actions that failed |
//! | error | a `Terminate` policy hit on a bound handle, just before abort |
//!
//! [`LogLevel`] is the serde-friendly spelling of those levels that
//! binaries put in their configuration and hand to their logger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity, from most verbose to least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every descriptor, thread and process handed over or released
    Trace,
    /// Errors returned by checked calls
    Debug,
    /// Progress messages from binaries
    Info,
    /// Failed cleanup
    #[serde(alias = "warn")]
    Warning,
    /// Fatal conditions
    Error,
}

const NAMES: [(LogLevel, &str); 5] = [
    (LogLevel::Trace, "TRACE"),
    (LogLevel::Debug, "DEBUG"),
    (LogLevel::Info, "INFO"),
    (LogLevel::Warning, "WARNING"),
    (LogLevel::Error, "ERROR"),
];

impl LogLevel {
    /// Upper-case name, as printed by `Display`.
    pub fn as_str(&self) -> &'static str {
        NAMES
            .iter()
            .find(|(level, _)| level == self)
            .map_or("ERROR", |(_, name)| *name)
    }

    /// Whether a record at this level passes a threshold of `level`.
    pub fn is_at_least(&self, level: LogLevel) -> bool {
        *self >= level
    }

    /// The matching `log` level.
    pub fn to_level(self) -> log::Level {
        match self {
            Self::Trace => log::Level::Trace,
            Self::Debug => log::Level::Debug,
            Self::Info => log::Level::Info,
            Self::Warning => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }

    /// The `log` filter that lets this level and everything more severe
    /// through.
    pub fn to_filter(self) -> log::LevelFilter {
        self.to_level().to_level_filter()
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Warning
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Self::Trace,
            log::Level::Debug => Self::Debug,
            log::Level::Info => Self::Info,
            log::Level::Warn => Self::Warning,
            log::Level::Error => Self::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    /// Case-insensitive; also accepts `warn` and `err`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let alias = match upper.as_str() {
            "WARN" => "WARNING",
            "ERR" => "ERROR",
            other => other,
        };
        NAMES
            .iter()
            .find(|(_, name)| *name == alias)
            .map(|(level, _)| *level)
            .ok_or_else(|| format!("unknown log level: {}", s))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!("TRACE".parse::<LogLevel>(), Ok(LogLevel::Trace));
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("Err".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert_eq!(
            "loud".parse::<LogLevel>(),
            Err("unknown log level: loud".to_string())
        );
    }

    #[test]
    fn test_display_round_trips() {
        for (level, name) in NAMES {
            assert_eq!(level.to_string(), name);
            assert_eq!(name.parse::<LogLevel>(), Ok(level));
        }
    }

    #[test]
    fn test_ordering_and_filter() {
        assert!(LogLevel::Error.is_at_least(LogLevel::Warning));
        assert!(!LogLevel::Debug.is_at_least(LogLevel::Info));
        assert_eq!(LogLevel::Warning.to_filter(), log::LevelFilter::Warn);
        assert_eq!(LogLevel::from(log::Level::Info), LogLevel::Info);
        assert_eq!(LogLevel::default(), LogLevel::Warning);
    }

    #[test]
    fn test_serde_names() {
        let level: LogLevel = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(level, LogLevel::Warning);
        assert_eq!(serde_json::to_string(&LogLevel::Debug).unwrap(), "\"debug\"");
    }
}
