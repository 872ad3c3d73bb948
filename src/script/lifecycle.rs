use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle phase name passed to the script.
pub const LIFECYCLE_ENV: &str = "SCRIPT_LIFECYCLE";
/// JSON inputs, set only when inputs are configured.
pub const INPUTS_ENV: &str = "SCRIPT_INPUTS";
/// JSON prior output, set only when prior state exists.
pub const STATE_ENV: &str = "SCRIPT_STATE_OUTPUT";
/// Path the script writes its JSON result to.
pub const OUTPUT_ENV: &str = "SCRIPT_OUTPUT";
/// Path the script writes failure detail to.
pub const ERROR_ENV: &str = "SCRIPT_ERROR";

/// Resource lifecycle phase a script is invoked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Plan,
    Create,
    Read,
    Update,
    Delete,
}

impl Lifecycle {
    pub const ALL: [Lifecycle; 5] = [
        Lifecycle::Plan,
        Lifecycle::Create,
        Lifecycle::Read,
        Lifecycle::Update,
        Lifecycle::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Plan => "plan",
            Lifecycle::Create => "create",
            Lifecycle::Read => "read",
            Lifecycle::Update => "update",
            Lifecycle::Delete => "delete",
        }
    }

    /// Whether the script is expected to write JSON to the output channel.
    pub fn reads_output(self) -> bool {
        !matches!(self, Lifecycle::Delete)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown lifecycle phase '{0}' (expected plan, create, read, update or delete)")]
pub struct UnknownLifecycle(pub String);

impl FromStr for Lifecycle {
    type Err = UnknownLifecycle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lifecycle::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| UnknownLifecycle(s.to_string()))
    }
}
