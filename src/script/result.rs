//! Script result envelope and the reserved metadata key.

use serde::Serialize;
use serde_json::Value;

/// Top-level key scripts use to report metadata alongside their output.
pub const META_KEY: &str = "__meta";

const DRIFT_FIELD: &str = "output_drift_detected";
const DRIFT_ALIAS: &str = "driftDetected";

/// Metadata a script may attach under `__meta`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultMetadata {
    /// The script observed that the real resource no longer matches its state.
    pub output_drift_detected: bool,
}

/// Parsed output of one script run with metadata separated out.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptResult {
    pub output: Value,
    pub meta: ResultMetadata,
}

/// Split the `__meta` entry off a script's output.
///
/// Never fails: a missing, malformed or non-object `__meta` yields default
/// metadata, and only the top level is inspected.
pub fn extract_metadata(mut value: Value) -> ScriptResult {
    let meta = match &mut value {
        Value::Object(map) => map
            .remove(META_KEY)
            .map(|raw| read_metadata(&raw))
            .unwrap_or_default(),
        _ => ResultMetadata::default(),
    };
    ScriptResult {
        output: value,
        meta,
    }
}

fn read_metadata(raw: &Value) -> ResultMetadata {
    let Value::Object(fields) = raw else {
        return ResultMetadata::default();
    };
    let output_drift_detected = fields
        .get(DRIFT_FIELD)
        .or_else(|| fields.get(DRIFT_ALIAS))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    ResultMetadata {
        output_drift_detected,
    }
}
