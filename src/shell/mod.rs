//! Process-level plumbing for running scripts.
//!
//! - `channel` - temp files the script reads paths of from its environment
//! - `command` - spawning the interpreter with a deadline and cancellation
//! - `logger` - turning `[LEVEL] message` lines into log events
//! - `output` - reading the JSON output and error detail files

pub mod channel;
pub mod command;
pub mod logger;
pub mod output;

pub use channel::{ChannelFile, ChannelKind};
pub use command::{DEFAULT_TIMEOUT, ShellCommand, run_command};
pub use logger::{LogLevel, ScriptLogger, TracingLogger, classify_line};
pub use output::{read_error_detail, read_output};
