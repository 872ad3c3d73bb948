//! Typed error hierarchy for script execution.
//!
//! One enum per engine, plus an aggregate for a whole invocation:
//! - `ExecutionError` - spawning, waiting on and terminating the child process
//! - `ChannelError` - allocating temp channel files
//! - `ReadError` - reading the JSON output channel
//! - `DecodeError` / `EncodeError` - the dynamic value codec
//! - `ScriptError` - everything a single script invocation can fail with

use crate::script::Lifecycle;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from running the interpreter process.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Interpreter must contain at least one element")]
    EmptyInterpreter,

    #[error("Failed to launch interpreter '{program}': {source}")]
    LaunchFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", non_zero_exit_message(.code))]
    NonZeroExit { code: Option<i32> },

    #[error("Command timed out after {}", format_duration(.timeout))]
    Timeout { timeout: Duration },

    #[error("Command was cancelled")]
    Cancelled,

    #[error("Failed while waiting on command: {0}")]
    Io(#[source] std::io::Error),
}

fn non_zero_exit_message(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("Command failed with exit code: {}", code),
        None => "Command was terminated by a signal".to_string(),
    }
}

fn format_duration(d: &Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Errors from allocating a temp channel file.
#[derive(Debug, Error)]
#[error("Failed to create {kind} channel file: {source}")]
pub struct ChannelError {
    pub kind: &'static str,
    #[source]
    pub source: std::io::Error,
}

/// Errors from reading the JSON output channel.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Output file {path} does not exist")]
    NotFound { path: PathBuf },

    #[error("Output file {path} is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read output file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from decoding untyped JSON into a dynamic value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unexpected type at {path}: unsupported value {value}")]
    UnsupportedType { path: String, value: String },
}

/// Errors from encoding a dynamic value back into JSON.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Underlying value is unknown")]
    UnknownValue,

    #[error("Failed to serialize encoded value: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Errors from a complete script invocation.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("Failed to marshal {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The script exited non-zero; `detail` is the error channel text verbatim.
    #[error("{}{}", non_zero_exit_message(.code), detail_suffix(.detail))]
    CommandFailed { code: Option<i32>, detail: String },

    #[error(transparent)]
    Execution(ExecutionError),

    #[error("Script exited successfully but did not write its output file")]
    OutputMissing,

    #[error("Failed to read output file: {0}")]
    InvalidOutput(#[source] ReadError),

    /// A create or update wrote `???` as its whole output, so there is no
    /// state to record.
    #[error("The {phase} script output is entirely unknown ('???')")]
    UnknownOutput { phase: Lifecycle },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Failed to encode the {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: EncodeError,
    },
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {}", detail)
    }
}

impl ScriptError {
    /// True when the script was stopped by its deadline or by cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            ScriptError::Execution(ExecutionError::Timeout { .. })
                | ScriptError::Execution(ExecutionError::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_launch_failure_is_matchable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "xxxxxx not found");
        let err = ExecutionError::LaunchFailure {
            program: "xxxxxx".to_string(),
            source: io_err,
        };
        match &err {
            ExecutionError::LaunchFailure { program, source } => {
                assert_eq!(program, "xxxxxx");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected LaunchFailure variant"),
        }
        assert!(err.to_string().contains("xxxxxx"));
    }

    #[test]
    fn execution_error_non_zero_exit_carries_code() {
        let err = ExecutionError::NonZeroExit { code: Some(3) };
        assert_eq!(err.to_string(), "Command failed with exit code: 3");

        let err = ExecutionError::NonZeroExit { code: None };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn execution_error_timeout_formats_duration() {
        let err = ExecutionError::Timeout {
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "Command timed out after 30s");

        let err = ExecutionError::Timeout {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Command timed out after 250ms");
    }

    #[test]
    fn script_error_command_failed_includes_detail() {
        let err = ScriptError::CommandFailed {
            code: Some(1),
            detail: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Command failed with exit code: 1: boom");

        let err = ScriptError::CommandFailed {
            code: Some(2),
            detail: String::new(),
        };
        assert_eq!(err.to_string(), "Command failed with exit code: 2");
    }

    #[test]
    fn script_error_is_interrupted() {
        assert!(ScriptError::Execution(ExecutionError::Cancelled).is_interrupted());
        assert!(
            ScriptError::Execution(ExecutionError::Timeout {
                timeout: Duration::from_secs(1)
            })
            .is_interrupted()
        );
        assert!(!ScriptError::OutputMissing.is_interrupted());
    }

    #[test]
    fn script_error_unknown_output_names_phase() {
        let err = ScriptError::UnknownOutput {
            phase: Lifecycle::Create,
        };
        assert_eq!(
            err.to_string(),
            "The create script output is entirely unknown ('???')"
        );
    }

    #[test]
    fn script_error_converts_from_decode_error() {
        let inner = DecodeError::UnsupportedType {
            path: "$.a".to_string(),
            value: "1e400".to_string(),
        };
        let err: ScriptError = inner.into();
        match &err {
            ScriptError::Decode(DecodeError::UnsupportedType { path, .. }) => {
                assert_eq!(path, "$.a");
            }
            _ => panic!("Expected ScriptError::Decode(UnsupportedType)"),
        }
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ExecutionError::Cancelled);
        assert_std_error(&EncodeError::UnknownValue);
        assert_std_error(&ScriptError::OutputMissing);
        assert_std_error(&ReadError::NotFound {
            path: PathBuf::from("/tmp/missing.json"),
        });
    }
}
