//! The JSON state file: last known output of the resource.

use anyhow::{Context, Result};
use script_bridge::dynamic::{DynamicValue, UNKNOWN_SENTINEL, decode, encode};
use script_bridge::errors::EncodeError;
use serde_json::Value;
use std::path::Path;

/// Load prior state. A missing or blank file means there is none.
pub fn load_state(path: &Path) -> Result<Option<DynamicValue>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let json: Value = serde_json::from_str(&content)
        .with_context(|| format!("State file is not valid JSON: {}", path.display()))?;
    let value = decode(&json)
        .with_context(|| format!("Failed to decode state file: {}", path.display()))?;
    Ok(Some(value))
}

/// Prior state, or an error telling the user to create the resource first.
pub fn require_state(state: Option<DynamicValue>, path: &Path) -> Result<DynamicValue> {
    state.with_context(|| {
        format!(
            "No state found at {}. Run 'script-bridge create' first.",
            path.display()
        )
    })
}

pub fn save_state(path: &Path, value: &DynamicValue) -> Result<()> {
    let json = encode(value)
        .context("Failed to encode state")?
        .unwrap_or(Value::Null);
    let content = serde_json::to_string_pretty(&json).context("Failed to serialize state")?;
    std::fs::write(path, content + "\n")
        .with_context(|| format!("Failed to write state file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "state saved");
    Ok(())
}

pub fn remove_state(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove state file: {}", path.display())),
    }
}

/// JSON for display. Unlike state, a wholly unknown value is shown as `???`.
pub fn display_json(value: &DynamicValue) -> Result<Value> {
    match encode(value) {
        Ok(json) => Ok(json.unwrap_or(Value::Null)),
        Err(EncodeError::UnknownValue) => Ok(Value::String(UNKNOWN_SENTINEL.to_string())),
        Err(e) => Err(e).context("Failed to encode value"),
    }
}

pub fn print_json(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}
