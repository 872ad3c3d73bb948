//! One script run for one lifecycle phase.
//!
//! Allocates the output and error channels, publishes the environment
//! contract, runs the command and turns the channel contents into a
//! [`ScriptResult`] or a [`ScriptError`]. Channel files are removed when the
//! invocation returns, whichever way it returns.

use super::lifecycle::{ERROR_ENV, INPUTS_ENV, LIFECYCLE_ENV, Lifecycle, OUTPUT_ENV, STATE_ENV};
use super::result::{ScriptResult, extract_metadata};
use crate::dynamic::{DynamicValue, encode_to_string};
use crate::errors::{ExecutionError, ReadError, ScriptError};
use crate::shell::{
    ChannelFile, ChannelKind, DEFAULT_TIMEOUT, ScriptLogger, ShellCommand, read_error_detail,
    read_output, run_command,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything needed to run one script for one phase.
#[derive(Clone)]
pub struct ScriptInvocation {
    interpreter: Vec<String>,
    environment: HashMap<String, String>,
    working_dir: Option<PathBuf>,
    command: String,
    lifecycle: Lifecycle,
    inputs: Option<Value>,
    state: Option<DynamicValue>,
    read_json: bool,
    timeout: Duration,
    logger: Option<Arc<dyn ScriptLogger>>,
}

impl std::fmt::Debug for ScriptInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptInvocation")
            .field("interpreter", &self.interpreter)
            .field("lifecycle", &self.lifecycle)
            .field("working_dir", &self.working_dir)
            .field("read_json", &self.read_json)
            .field("timeout", &self.timeout)
            .field("logging", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

impl ScriptInvocation {
    /// New invocation; reads JSON output unless the phase is `delete`.
    pub fn new(interpreter: Vec<String>, command: impl Into<String>, lifecycle: Lifecycle) -> Self {
        Self {
            interpreter,
            environment: HashMap::new(),
            working_dir: None,
            command: command.into(),
            lifecycle,
            inputs: None,
            state: None,
            read_json: lifecycle.reads_output(),
            timeout: DEFAULT_TIMEOUT,
            logger: None,
        }
    }

    pub fn environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn inputs(mut self, inputs: Option<Value>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Prior output, sent as `SCRIPT_STATE_OUTPUT` when it encodes to something.
    pub fn state(mut self, state: Option<DynamicValue>) -> Self {
        self.state = state;
        self
    }

    pub fn read_json(mut self, read_json: bool) -> Self {
        self.read_json = read_json;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn logger(mut self, logger: Option<Arc<dyn ScriptLogger>>) -> Self {
        self.logger = logger;
        self
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Run the script.
    ///
    /// Returns `Ok(None)` when JSON output is not wanted. A script that exits
    /// zero without writing its output channel yields
    /// [`ScriptError::OutputMissing`]; a non-zero exit yields
    /// [`ScriptError::CommandFailed`] carrying the error channel text.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<ScriptResult>, ScriptError> {
        let output = ChannelFile::allocate(ChannelKind::Output)?;
        let error = ChannelFile::allocate(ChannelKind::Error)?;

        let command = self.build_command(output.path(), error.path())?;
        tracing::debug!(
            lifecycle = %self.lifecycle,
            output = %output.path().display(),
            "invoking script"
        );

        match run_command(&command, self.logger.as_deref(), cancel).await {
            Ok(()) => {}
            Err(ExecutionError::NonZeroExit { code }) => {
                let detail = read_error_detail(error.path()).unwrap_or_default();
                return Err(ScriptError::CommandFailed { code, detail });
            }
            Err(e) => return Err(ScriptError::Execution(e)),
        }

        if !self.read_json {
            return Ok(None);
        }
        read_result(output.path()).map(Some)
    }

    fn build_command(&self, output: &Path, error: &Path) -> Result<ShellCommand, ScriptError> {
        let mut environment = self.environment.clone();
        environment.insert(LIFECYCLE_ENV.to_string(), self.lifecycle.to_string());

        if let Some(inputs) = &self.inputs {
            let text = serde_json::to_string(inputs).map_err(|source| ScriptError::Serialize {
                what: "inputs",
                source,
            })?;
            environment.insert(INPUTS_ENV.to_string(), text);
        }

        if let Some(state) = &self.state {
            let encoded = encode_to_string(state).map_err(|source| ScriptError::Encode {
                what: "prior state",
                source,
            })?;
            if let Some(text) = encoded {
                environment.insert(STATE_ENV.to_string(), text);
            }
        }

        environment.insert(OUTPUT_ENV.to_string(), output.to_string_lossy().into_owned());
        environment.insert(ERROR_ENV.to_string(), error.to_string_lossy().into_owned());

        Ok(ShellCommand {
            interpreter: self.interpreter.clone(),
            environment,
            working_dir: self.working_dir.clone(),
            script: self.command.clone(),
            timeout: self.timeout,
        })
    }
}

// The channel is created empty before launch, so zero length means the
// script never wrote it.
fn read_result(path: &Path) -> Result<ScriptResult, ScriptError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => return Err(ScriptError::OutputMissing),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScriptError::OutputMissing);
        }
        _ => {}
    }

    let value = read_output(path).map_err(|e| match e {
        ReadError::NotFound { .. } => ScriptError::OutputMissing,
        other => ScriptError::InvalidOutput(other),
    })?;
    Ok(extract_metadata(value))
}
