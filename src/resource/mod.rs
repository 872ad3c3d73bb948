//! Scripted resource lifecycle and data source.
//!
//! [`ScriptResource`] runs the configured command for each phase and decodes
//! what it writes. Prior state is the decoded output of the previous phase;
//! it is sent back to the script encoded as JSON.

mod data_source;

pub use data_source::ScriptDataSource;

use crate::config::{ResolvedCommand, ResolvedScript};
use crate::dynamic::{DynamicValue, decode};
use crate::errors::ScriptError;
use crate::script::{Lifecycle, ResultMetadata, ScriptInvocation};
use crate::shell::{ScriptLogger, TracingLogger};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of planning a change.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedState {
    /// Expected output after apply; may contain unknowns
    pub planned: DynamicValue,
    /// Planned output differs from prior state
    pub requires_change: bool,
}

/// Result of refreshing state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub output: DynamicValue,
    /// The resource no longer matches its prior state
    pub drift_detected: bool,
}

/// A resource whose lifecycle is implemented by scripts.
#[derive(Clone)]
pub struct ScriptResource {
    config: ResolvedScript,
    logger: Option<Arc<dyn ScriptLogger>>,
}

impl std::fmt::Debug for ScriptResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptResource")
            .field("config", &self.config)
            .field("logging", &self.logger.is_some())
            .finish()
    }
}

/// Logger implied by the `log_output` setting.
pub(crate) fn default_logger(config: &ResolvedScript) -> Option<Arc<dyn ScriptLogger>> {
    if config.log_output {
        Some(Arc::new(TracingLogger))
    } else {
        None
    }
}

/// Build the invocation shared by every phase.
pub(crate) fn invocation_for(
    config: &ResolvedScript,
    logger: &Option<Arc<dyn ScriptLogger>>,
    phase: Lifecycle,
    command: &ResolvedCommand,
) -> ScriptInvocation {
    ScriptInvocation::new(command.interpreter.clone(), command.command.clone(), phase)
        .environment(config.environment.clone())
        .working_dir(config.working_dir.clone())
        .inputs(config.inputs.clone())
        .timeout(config.timeouts.for_phase(phase))
        .logger(logger.clone())
}

fn known_output(phase: Lifecycle, output: DynamicValue) -> Result<DynamicValue, ScriptError> {
    if output.is_unknown() {
        tracing::error!(phase = %phase, "script output is entirely unknown");
        return Err(ScriptError::UnknownOutput { phase });
    }
    Ok(output)
}

impl ScriptResource {
    pub fn new(config: ResolvedScript) -> Self {
        let logger = default_logger(&config);
        Self { config, logger }
    }

    /// Replace the logger chosen from `log_output`.
    pub fn with_logger(mut self, logger: Option<Arc<dyn ScriptLogger>>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &ResolvedScript {
        &self.config
    }

    fn invocation(&self, phase: Lifecycle, command: &ResolvedCommand) -> ScriptInvocation {
        invocation_for(&self.config, &self.logger, phase, command)
    }

    async fn run_decoded(
        &self,
        phase: Lifecycle,
        command: &ResolvedCommand,
        prior: Option<&DynamicValue>,
        cancel: &CancellationToken,
    ) -> Result<(DynamicValue, ResultMetadata), ScriptError> {
        let result = self
            .invocation(phase, command)
            .state(prior.cloned())
            .run(cancel)
            .await?
            .ok_or(ScriptError::OutputMissing)?;
        let value = decode(&result.output)?;
        Ok((value, result.meta))
    }

    /// Compute the expected output of the next apply.
    ///
    /// With a `plan` command its output is the plan, and any `???` in it marks
    /// a value only known after apply. Without one the prior output is kept,
    /// or everything is unknown when there is no prior output.
    pub async fn plan(
        &self,
        prior: Option<&DynamicValue>,
        cancel: &CancellationToken,
    ) -> Result<PlannedState, ScriptError> {
        let planned = match &self.config.commands.plan {
            Some(command) => {
                self.run_decoded(Lifecycle::Plan, command, prior, cancel)
                    .await?
                    .0
            }
            None => prior.cloned().unwrap_or_else(DynamicValue::unknown),
        };
        let requires_change = prior != Some(&planned);
        tracing::debug!(requires_change, fully_known = planned.is_fully_known(), "planned");
        Ok(PlannedState {
            planned,
            requires_change,
        })
    }

    /// Run the create command. A wholly unknown output is rejected since it
    /// cannot be recorded as state.
    pub async fn create(&self, cancel: &CancellationToken) -> Result<DynamicValue, ScriptError> {
        let (output, _) = self
            .run_decoded(Lifecycle::Create, &self.config.commands.create, None, cancel)
            .await?;
        known_output(Lifecycle::Create, output)
    }

    /// Refresh state and report drift.
    ///
    /// Drift is reported when the script says so through `__meta`, or when
    /// `output_drift` is enabled and the new output differs from `prior`.
    pub async fn read(
        &self,
        prior: &DynamicValue,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome, ScriptError> {
        let (output, meta) = self
            .run_decoded(Lifecycle::Read, &self.config.commands.read, Some(prior), cancel)
            .await?;
        let drift_detected =
            meta.output_drift_detected || (self.config.output_drift && output != *prior);
        if drift_detected {
            tracing::warn!("Output drift detected");
        }
        Ok(ReadOutcome {
            output,
            drift_detected,
        })
    }

    pub async fn update(
        &self,
        prior: &DynamicValue,
        cancel: &CancellationToken,
    ) -> Result<DynamicValue, ScriptError> {
        let (output, _) = self
            .run_decoded(Lifecycle::Update, &self.config.commands.update, Some(prior), cancel)
            .await?;
        known_output(Lifecycle::Update, output)
    }

    /// Run the delete command. No output is read; an empty command is skipped.
    pub async fn delete(
        &self,
        prior: &DynamicValue,
        cancel: &CancellationToken,
    ) -> Result<(), ScriptError> {
        let command = &self.config.commands.delete;
        if command.command.trim().is_empty() {
            tracing::debug!("Delete command is empty, skipping");
            return Ok(());
        }
        self.invocation(Lifecycle::Delete, command)
            .state(Some(prior.clone()))
            .read_json(false)
            .run(cancel)
            .await?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ScriptToml;
    use crate::errors::DecodeError;
    use crate::shell::LogLevel;
    use crate::shell::logger::test_support::RecordingLogger;
    use serde_json::json;
    use tempfile::tempdir;

    fn resource(commands: &str, extra: &str) -> ScriptResource {
        let content = format!(
            r#"
[provider]
interpreter = ["/bin/sh", "-c"]

{}

[script.os_commands.default]
{}
"#,
            extra, commands
        );
        let toml = ScriptToml::parse(&content).unwrap();
        ScriptResource::new(toml.resolve().unwrap())
    }

    fn value(json: serde_json::Value) -> DynamicValue {
        decode(&json).unwrap()
    }

    const ECHO_COMMANDS: &str = r#"
create = { command = "printf '{\"id\":\"abc\",\"phase\":\"%s\"}' \"$SCRIPT_LIFECYCLE\" > \"$SCRIPT_OUTPUT\"" }
read = { command = "printf '%s' \"$SCRIPT_STATE_OUTPUT\" > \"$SCRIPT_OUTPUT\"" }
update = { command = "printf '{\"id\":\"abc\",\"phase\":\"%s\"}' \"$SCRIPT_LIFECYCLE\" > \"$SCRIPT_OUTPUT\"" }
delete = { command = "exit 0" }
"#;

    #[tokio::test]
    async fn test_create_returns_decoded_output() {
        let resource = resource(ECHO_COMMANDS, "");
        let output = resource.create(&CancellationToken::new()).await.unwrap();
        assert_eq!(output, value(json!({"id": "abc", "phase": "create"})));
    }

    #[tokio::test]
    async fn test_read_sends_prior_state() {
        let resource = resource(ECHO_COMMANDS, "");
        let prior = value(json!({"id": "abc", "size": 3}));
        let outcome = resource.read(&prior, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.output, prior);
        assert!(!outcome.drift_detected);
    }

    #[tokio::test]
    async fn test_update_uses_update_phase() {
        let resource = resource(ECHO_COMMANDS, "");
        let prior = value(json!({"id": "abc", "phase": "create"}));
        let output = resource.update(&prior, &CancellationToken::new()).await.unwrap();
        assert_eq!(output.get("phase").and_then(DynamicValue::as_str), Some("update"));
    }

    #[tokio::test]
    async fn test_read_drift_from_metadata() {
        let commands = r#"
create = { command = "true" }
read = { command = "printf '{\"v\":1,\"__meta\":{\"output_drift_detected\":true}}' > \"$SCRIPT_OUTPUT\"" }
update = { command = "true" }
delete = { command = "true" }
"#;
        let resource = resource(commands, "");
        let prior = value(json!({"v": 1}));
        let outcome = resource.read(&prior, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.output, prior);
        assert!(outcome.drift_detected);
    }

    #[tokio::test]
    async fn test_read_drift_from_comparison() {
        let commands = r#"
create = { command = "true" }
read = { command = "printf '{\"v\":2}' > \"$SCRIPT_OUTPUT\"" }
update = { command = "true" }
delete = { command = "true" }
"#;
        let prior = value(json!({"v": 1}));

        let without = resource(commands, "");
        let outcome = without.read(&prior, &CancellationToken::new()).await.unwrap();
        assert!(!outcome.drift_detected);

        let with = resource(commands, "[script]\noutput_drift = true");
        let outcome = with.read(&prior, &CancellationToken::new()).await.unwrap();
        assert!(outcome.drift_detected);
        assert_eq!(outcome.output, value(json!({"v": 2})));
    }

    #[tokio::test]
    async fn test_plan_without_command() {
        let resource = resource(ECHO_COMMANDS, "");
        let cancel = CancellationToken::new();

        let fresh = resource.plan(None, &cancel).await.unwrap();
        assert!(fresh.planned.is_unknown());
        assert!(fresh.requires_change);

        let prior = value(json!({"id": "abc"}));
        let unchanged = resource.plan(Some(&prior), &cancel).await.unwrap();
        assert_eq!(unchanged.planned, prior);
        assert!(!unchanged.requires_change);
    }

    #[tokio::test]
    async fn test_plan_command_with_unknowns() {
        let commands = format!(
            "{}\n{}",
            r#"plan = { command = "printf '{\"id\":\"???\",\"name\":\"demo\"}' > \"$SCRIPT_OUTPUT\"" }"#,
            ECHO_COMMANDS
        );
        let resource = resource(&commands, "");
        let prior = value(json!({"id": "abc", "name": "old"}));
        let planned = resource.plan(Some(&prior), &CancellationToken::new()).await.unwrap();
        assert!(planned.requires_change);
        assert!(planned.planned.get("id").unwrap().is_unknown());
        assert_eq!(
            planned.planned.get("name").and_then(DynamicValue::as_str),
            Some("demo")
        );
    }

    #[tokio::test]
    async fn test_delete_receives_state_and_skips_output() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("deleted");
        let commands = format!(
            r#"
create = {{ command = "true" }}
read = {{ command = "true" }}
update = {{ command = "true" }}
delete = {{ command = "printf '%s' \"$SCRIPT_STATE_OUTPUT\" > '{}'" }}
"#,
            marker.display()
        );
        let resource = resource(&commands, "");
        let prior = value(json!({"id": "abc"}));
        resource.delete(&prior, &CancellationToken::new()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), r#"{"id":"abc"}"#);
    }

    #[tokio::test]
    async fn test_empty_delete_is_skipped() {
        let commands = r#"
create = { command = "true" }
read = { command = "true" }
update = { command = "true" }
delete = { command = "  " }
"#;
        let resource = resource(commands, "");
        resource
            .delete(&value(json!({})), &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_inputs_sent_on_every_phase() {
        let commands = r#"
plan = { command = "printf '%s' \"$SCRIPT_INPUTS\" > \"$SCRIPT_OUTPUT\"" }
create = { command = "printf '%s' \"$SCRIPT_INPUTS\" > \"$SCRIPT_OUTPUT\"" }
read = { command = "printf '%s' \"$SCRIPT_INPUTS\" > \"$SCRIPT_OUTPUT\"" }
update = { command = "printf '%s' \"$SCRIPT_INPUTS\" > \"$SCRIPT_OUTPUT\"" }
delete = { command = "test -n \"$SCRIPT_INPUTS\"" }
"#;
        let resource = resource(commands, "[script]\ninputs = { name = \"demo\" }");
        let cancel = CancellationToken::new();
        let expected = value(json!({"name": "demo"}));

        assert_eq!(resource.create(&cancel).await.unwrap(), expected);
        assert_eq!(resource.plan(Some(&expected), &cancel).await.unwrap().planned, expected);
        assert_eq!(resource.read(&expected, &cancel).await.unwrap().output, expected);
        assert_eq!(resource.update(&expected, &cancel).await.unwrap(), expected);
        resource.delete(&expected, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_environment_layering() {
        let commands = r#"
create = { command = "printf '{\"a\":\"%s\",\"b\":\"%s\"}' \"$A\" \"$B\" > \"$SCRIPT_OUTPUT\"" }
read = { command = "true" }
update = { command = "true" }
delete = { command = "true" }
"#;
        let content = format!(
            r#"
[provider]
interpreter = ["/bin/sh", "-c"]
environment = {{ A = "provider", B = "provider" }}

[script]
environment = {{ B = "resource" }}

[script.os_commands.default]
{}
"#,
            commands
        );
        let resource = ScriptResource::new(ScriptToml::parse(&content).unwrap().resolve().unwrap());
        let output = resource.create(&CancellationToken::new()).await.unwrap();
        assert_eq!(output, value(json!({"a": "provider", "b": "resource"})));
    }

    #[tokio::test]
    async fn test_failure_detail_propagates() {
        let commands = r#"
create = { command = "printf 'boom' > \"$SCRIPT_ERROR\"; exit 1" }
read = { command = "true" }
update = { command = "true" }
delete = { command = "exit 2" }
"#;
        let resource = resource(commands, "");
        let err = resource.create(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Command failed with exit code: 1: boom");

        let err = resource
            .delete(&value(json!({})), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::CommandFailed { code: Some(2), .. }));
    }

    #[tokio::test]
    async fn test_undecodable_output() {
        let commands = r#"
create = { command = "printf '{\"size\":1e400}' > \"$SCRIPT_OUTPUT\"" }
read = { command = "true" }
update = { command = "true" }
delete = { command = "true" }
"#;
        let resource = resource(commands, "");
        match resource.create(&CancellationToken::new()).await.unwrap_err() {
            ScriptError::Decode(DecodeError::UnsupportedType { path, .. }) => {
                assert_eq!(path, "$.size");
            }
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wholly_unknown_output_is_rejected() {
        let commands = r#"
create = { command = "printf '\"???\"' > \"$SCRIPT_OUTPUT\"" }
read = { command = "true" }
update = { command = "printf '\"???\"' > \"$SCRIPT_OUTPUT\"" }
delete = { command = "true" }
"#;
        let resource = resource(commands, "");
        let cancel = CancellationToken::new();

        let err = resource.create(&cancel).await.unwrap_err();
        assert!(matches!(
            err,
            ScriptError::UnknownOutput {
                phase: Lifecycle::Create
            }
        ));

        let err = resource
            .update(&value(json!({"id": "abc"})), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScriptError::UnknownOutput {
                phase: Lifecycle::Update
            }
        ));
    }

    #[tokio::test]
    async fn test_partially_unknown_output_is_kept() {
        let commands = r#"
create = { command = "printf '{\"id\":\"???\"}' > \"$SCRIPT_OUTPUT\"" }
read = { command = "true" }
update = { command = "true" }
delete = { command = "true" }
"#;
        let resource = resource(commands, "");
        let output = resource.create(&CancellationToken::new()).await.unwrap();
        assert!(output.get("id").unwrap().is_unknown());
    }

    #[tokio::test]
    async fn test_phase_timeout_applies() {
        let commands = r#"
create = { command = "sleep 5" }
read = { command = "true" }
update = { command = "true" }
delete = { command = "true" }
"#;
        let resource = resource(commands, "[script.timeouts]\ncreate = \"200ms\"");
        let err = resource.create(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_interrupted());
    }

    #[tokio::test]
    async fn test_logger_receives_script_lines() {
        let commands = r#"
create = { command = "echo '[WARN] careful'; printf '{}' > \"$SCRIPT_OUTPUT\"" }
read = { command = "true" }
update = { command = "true" }
delete = { command = "true" }
"#;
        let logger = Arc::new(RecordingLogger::default());
        let resource = resource(commands, "").with_logger(Some(logger.clone()));
        resource.create(&CancellationToken::new()).await.unwrap();
        assert_eq!(logger.messages(LogLevel::Warn), vec!["careful".to_string()]);
    }

    #[test]
    fn test_log_output_selects_tracing_logger() {
        let quiet = resource(ECHO_COMMANDS, "");
        assert!(quiet.logger.is_none());
        let loud = resource(ECHO_COMMANDS, "").config().clone();
        let loud = ScriptResource::new(ResolvedScript {
            log_output: true,
            ..loud
        });
        assert!(loud.logger.is_some());
    }
}
