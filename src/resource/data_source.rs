use super::{default_logger, invocation_for};
use crate::config::ResolvedScript;
use crate::dynamic::{DynamicValue, decode};
use crate::errors::ScriptError;
use crate::script::Lifecycle;
use crate::shell::ScriptLogger;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Read-only script: receives inputs, returns decoded output. Uses the
/// configured `read` command and never sees prior state.
#[derive(Clone)]
pub struct ScriptDataSource {
    config: ResolvedScript,
    logger: Option<Arc<dyn ScriptLogger>>,
}

impl ScriptDataSource {
    pub fn new(config: ResolvedScript) -> Self {
        let logger = default_logger(&config);
        Self { config, logger }
    }

    pub fn with_logger(mut self, logger: Option<Arc<dyn ScriptLogger>>) -> Self {
        self.logger = logger;
        self
    }

    pub async fn read(&self, cancel: &CancellationToken) -> Result<DynamicValue, ScriptError> {
        let result = invocation_for(
            &self.config,
            &self.logger,
            Lifecycle::Read,
            &self.config.commands.read,
        )
        .run(cancel)
        .await?
        .ok_or(ScriptError::OutputMissing)?;
        Ok(decode(&result.output)?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ScriptToml;
    use serde_json::json;

    fn data_source(read: &str, extra: &str) -> ScriptDataSource {
        let content = format!(
            r#"
[provider]
interpreter = ["/bin/sh", "-c"]

{}

[script.os_commands.default]
create = {{ command = "true" }}
read = {{ command = '{}' }}
update = {{ command = "true" }}
delete = {{ command = "true" }}
"#,
            extra, read
        );
        ScriptDataSource::new(ScriptToml::parse(&content).unwrap().resolve().unwrap())
    }

    #[tokio::test]
    async fn test_read_with_inputs() {
        let source = data_source(
            r#"printf "%s" "$SCRIPT_INPUTS" > "$SCRIPT_OUTPUT""#,
            "[script]\ninputs = { query = \"hosts\" }",
        );
        let output = source.read(&CancellationToken::new()).await.unwrap();
        assert_eq!(output, decode(&json!({"query": "hosts"})).unwrap());
    }

    #[tokio::test]
    async fn test_read_never_sees_state() {
        let source = data_source(
            r#"if [ -n "${SCRIPT_STATE_OUTPUT+x}" ]; then exit 3; fi; printf "[1,2]" > "$SCRIPT_OUTPUT""#,
            "",
        );
        let output = source.read(&CancellationToken::new()).await.unwrap();
        assert_eq!(output, decode(&json!([1, 2])).unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_output() {
        let source = data_source("true", "");
        let err = source.read(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ScriptError::OutputMissing));
    }
}
