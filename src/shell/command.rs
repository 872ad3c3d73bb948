//! Process execution for scripts.
//!
//! A [`ShellCommand`] is an interpreter plus fixed arguments with the script
//! body appended as the final argument (e.g. `/bin/bash -c <script>`). The
//! child inherits the current environment with the command's variables
//! layered on top.
//!
//! When a logger is supplied, stdout and stderr share one pipe, so lines
//! from both streams are forwarded in the order the script wrote them.
//! Without a logger both streams go to the null device.

use super::logger::{ScriptLogger, forward_line};
use crate::errors::ExecutionError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default deadline for a single script run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// A fully described script run.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    /// Program and fixed arguments; must not be empty.
    pub interpreter: Vec<String>,
    /// Variables layered over the inherited environment.
    pub environment: HashMap<String, String>,
    /// Working directory; the current directory when `None`.
    pub working_dir: Option<PathBuf>,
    /// Script body, passed as the last argument.
    pub script: String,
    pub timeout: Duration,
}

impl ShellCommand {
    pub fn new(interpreter: Vec<String>, script: impl Into<String>) -> Self {
        Self {
            interpreter,
            environment: HashMap::new(),
            working_dir: None,
            script: script.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Run `command` to completion.
///
/// Returns once the child has exited and, when logging, the combined output
/// has reached end-of-stream. On deadline expiry or cancellation the child
/// is killed and reaped before the error is returned.
pub async fn run_command(
    command: &ShellCommand,
    logger: Option<&dyn ScriptLogger>,
    cancel: &CancellationToken,
) -> Result<(), ExecutionError> {
    let (program, args) = command
        .interpreter
        .split_first()
        .ok_or(ExecutionError::EmptyInterpreter)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .arg(&command.script)
        .envs(&command.environment)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    if let Some(dir) = command.working_dir.as_ref().filter(|d| !d.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }

    // Own process group so a timeout can take down anything the script forked.
    #[cfg(unix)]
    cmd.process_group(0);

    let combined = match logger {
        Some(_) => {
            let (reader, writer) = std::io::pipe().map_err(ExecutionError::Io)?;
            cmd.stderr(writer.try_clone().map_err(ExecutionError::Io)?)
                .stdout(writer);
            Some(reader)
        }
        None => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
            None
        }
    };

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| ExecutionError::LaunchFailure {
        program: program.clone(),
        source,
    })?;
    // The command still holds our copies of the pipe's write end.
    drop(cmd);
    let pid = child.id();
    tracing::debug!(program = %program, pid = ?pid, timeout = ?command.timeout, "spawned script");

    let output = match combined {
        Some(reader) => Some(async_reader(reader).map_err(ExecutionError::Io)?),
        None => None,
    };

    let outcome = tokio::select! {
        status = wait_for_exit(&mut child, output, logger) => Outcome::Exited(status),
        _ = tokio::time::sleep(command.timeout) => Outcome::TimedOut,
        _ = cancel.cancelled() => Outcome::Cancelled,
    };

    match outcome {
        Outcome::Exited(Ok(status)) => {
            tracing::debug!(
                pid = ?pid,
                exit_code = ?status.code(),
                elapsed = ?start.elapsed(),
                "script exited"
            );
            if status.success() {
                Ok(())
            } else {
                Err(ExecutionError::NonZeroExit {
                    code: status.code(),
                })
            }
        }
        Outcome::Exited(Err(e)) => {
            terminate(&mut child).await;
            Err(ExecutionError::Io(e))
        }
        Outcome::TimedOut => {
            tracing::warn!(pid = ?pid, timeout = ?command.timeout, "script timed out, killing");
            terminate(&mut child).await;
            Err(ExecutionError::Timeout {
                timeout: command.timeout,
            })
        }
        Outcome::Cancelled => {
            tracing::warn!(pid = ?pid, "script cancelled, killing");
            terminate(&mut child).await;
            Err(ExecutionError::Cancelled)
        }
    }
}

/// Drain the combined output (when logging), then wait for the exit status.
async fn wait_for_exit<R: AsyncRead + Unpin>(
    child: &mut Child,
    output: Option<R>,
    logger: Option<&dyn ScriptLogger>,
) -> std::io::Result<ExitStatus> {
    if let (Some(output), Some(logger)) = (output, logger) {
        let mut lines = BufReader::new(output).split(b'\n');
        while let Some(line) = lines.next_segment().await? {
            log_segment(&line, logger);
        }
    }

    child.wait().await
}

#[cfg(unix)]
fn async_reader(reader: std::io::PipeReader) -> std::io::Result<tokio::net::unix::pipe::Receiver> {
    tokio::net::unix::pipe::Receiver::from_owned_fd(reader.into())
}

#[cfg(not(unix))]
fn async_reader(reader: std::io::PipeReader) -> std::io::Result<tokio::fs::File> {
    let handle = std::os::windows::io::OwnedHandle::from(reader);
    Ok(tokio::fs::File::from_std(std::fs::File::from(handle)))
}

fn log_segment(segment: &[u8], logger: &dyn ScriptLogger) {
    let line = String::from_utf8_lossy(segment);
    let line: &str = &line;
    forward_line(line.strip_suffix('\r').unwrap_or(line), logger);
}

/// Kill the child's process group and reap the child.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: signalling a process group we created; no memory is shared.
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
            }
        }
    }

    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "failed to kill script process");
    }
}
