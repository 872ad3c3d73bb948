//! Classification of script output lines into leveled log events.
//!
//! A script opts into structured logging by prefixing a line with a level
//! tag: `[ERROR]`, `[WARN]`, `[INFO]`, `[DEBUG]` or `[TRACE]`. Tags are
//! case-sensitive and must start the line. Lines without a tag are not
//! forwarded.

use regex::Regex;
use std::sync::LazyLock;

static LOG_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(ERROR|WARN|INFO|DEBUG|TRACE)\]\s*(.+)").unwrap());

/// Severity of a classified script line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ERROR" => Some(LogLevel::Error),
            "WARN" => Some(LogLevel::Warn),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            "TRACE" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sink for classified script output.
///
/// Passed explicitly into the executor so it can be swapped for a
/// recording implementation in tests.
pub trait ScriptLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards classified lines to `tracing` under the `script` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ScriptLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => tracing::error!(target: "script", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "script", "{}", message),
            LogLevel::Info => tracing::info!(target: "script", "{}", message),
            LogLevel::Debug => tracing::debug!(target: "script", "{}", message),
            LogLevel::Trace => tracing::trace!(target: "script", "{}", message),
        }
    }
}

/// Extract the level and message from a tagged line.
pub fn classify_line(line: &str) -> Option<(LogLevel, &str)> {
    let caps = LOG_LINE_REGEX.captures(line)?;
    let level = LogLevel::from_tag(caps.get(1)?.as_str())?;
    let message = caps.get(2)?.as_str();
    Some((level, message))
}

/// Classify a line and forward it to `logger` if it carries a tag.
/// Returns whether the line was forwarded.
pub fn forward_line(line: &str, logger: &dyn ScriptLogger) -> bool {
    match classify_line(line) {
        Some((level, message)) => {
            logger.log(level, message);
            true
        }
        None => false,
    }
}
